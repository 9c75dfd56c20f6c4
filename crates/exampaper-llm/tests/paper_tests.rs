use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use exampaper_core::config::PromptSettings;
use exampaper_core::traits::TextGenerator;
use exampaper_core::types::PaperRequest;
use exampaper_core::{Error, LlmError};
use exampaper_llm::PaperGenerator;
use tempfile::TempDir;

/// Records prompts and temperatures; optionally fails every call.
#[derive(Default)]
struct Recorder {
    calls: Mutex<Vec<(String, f32)>>,
    fail: bool,
}

#[async_trait]
impl TextGenerator for Recorder {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, LlmError> {
        self.calls.lock().unwrap().push((prompt.to_string(), temperature));
        if self.fail {
            return Err(LlmError::RequestFailed { provider: "fake".into(), reason: "connection reset".into() });
        }
        Ok(format!("GENERATED<{}>", prompt.len()))
    }
}

const PAPER_TEMPLATE: &str = "Std={Standard}|Sub={Subject_Name}|Diff={difficulty}|M={countOfMCQs}|S={countOfShort}|L={countOfLong}|Notes={User_defined_notes}|C=[{content}]";
const KEY_TEMPLATE: &str = "Answer this:\n{question_paper}\nDone {{ok}}";

fn write_templates(dir: &Path) -> PromptSettings {
    std::fs::create_dir_all(dir.join("prompts")).unwrap();
    std::fs::write(dir.join("prompts/questionPaper.txt"), PAPER_TEMPLATE).unwrap();
    std::fs::write(dir.join("prompts/answerKey.txt"), KEY_TEMPLATE).unwrap();
    PromptSettings::default()
}

fn request(notes: Option<&str>) -> PaperRequest {
    PaperRequest {
        standard: "Class 10".into(),
        subject_name: "Science".into(),
        difficulty: "medium".into(),
        count_of_mcqs: 5,
        count_of_short: 3,
        count_of_long: 0,
        user_defined_notes: notes.map(str::to_string),
    }
}

#[tokio::test]
async fn question_paper_substitutes_every_field_at_low_temperature() {
    let tmp = TempDir::new().unwrap();
    let prompts = write_templates(tmp.path());
    let model = Arc::new(Recorder::default());
    let generator = PaperGenerator::from_settings(model.clone(), &prompts, tmp.path()).unwrap();

    let out = generator.question_paper(&request(Some("Focus on diagrams")), "Light reflects.").await.unwrap();
    assert!(out.starts_with("GENERATED<"));

    let calls = model.calls.lock().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(
        calls[0].0,
        "Std=Class 10|Sub=Science|Diff=medium|M=5|S=3|L=0|Notes=Focus on diagrams|C=[Light reflects.]"
    );
    assert!((calls[0].1 - 0.2).abs() < f32::EPSILON);
}

#[tokio::test]
async fn absent_notes_and_content_are_substituted_as_none_and_empty() {
    let tmp = TempDir::new().unwrap();
    let prompts = write_templates(tmp.path());
    let generator = PaperGenerator::from_settings(Arc::new(Recorder::default()), &prompts, tmp.path()).unwrap();
    let prompt = generator.question_paper_prompt(&request(None), "").unwrap();
    assert!(prompt.ends_with("|Notes=None|C=[]"));
}

#[tokio::test]
async fn answer_key_uses_only_the_paper_text() {
    let tmp = TempDir::new().unwrap();
    let prompts = write_templates(tmp.path());
    let model = Arc::new(Recorder::default());
    let generator = PaperGenerator::from_settings(model.clone(), &prompts, tmp.path()).unwrap();

    let key = generator.answer_key("Q1. What is {refraction}?").await.unwrap();
    assert!(!key.is_empty());
    let calls = model.calls.lock().unwrap();
    assert_eq!(calls[0].0, "Answer this:\nQ1. What is {refraction}?\nDone {ok}");
}

#[tokio::test]
async fn missing_template_fails_before_any_generation_call() {
    let tmp = TempDir::new().unwrap();
    let model = Arc::new(Recorder::default());
    let err = PaperGenerator::from_settings(model.clone(), &PromptSettings::default(), tmp.path()).err().unwrap();
    assert!(matches!(err, Error::TemplateMissing { ref path, .. } if path.ends_with("questionPaper.txt")));
    assert!(model.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn generation_failure_is_propagated() {
    let tmp = TempDir::new().unwrap();
    let prompts = write_templates(tmp.path());
    let model = Arc::new(Recorder { fail: true, ..Recorder::default() });
    let generator = PaperGenerator::from_settings(model, &prompts, tmp.path()).unwrap();
    let err = generator.answer_key("paper").await.unwrap_err();
    assert!(matches!(err, Error::Generation(ref m) if m.contains("connection reset")));
    assert!(!err.is_client_error());
}
