use std::path::Path;
use std::sync::Arc;

use exampaper_core::config::{resolve_with_base, PromptSettings};
use exampaper_core::traits::TextGenerator;
use exampaper_core::types::PaperRequest;
use exampaper_core::Result;

use crate::prompt::PromptTemplate;

pub const GENERATION_TEMPERATURE: f32 = 0.2;

/// Fills the question-paper and answer-key templates and runs them through a
/// [`TextGenerator`]. Model output is returned as-is.
pub struct PaperGenerator {
    model: Arc<dyn TextGenerator>,
    question_paper: PromptTemplate,
    answer_key: PromptTemplate,
    temperature: f32,
}

impl PaperGenerator {
    pub fn new(model: Arc<dyn TextGenerator>, question_paper: PromptTemplate, answer_key: PromptTemplate) -> Self {
        Self { model, question_paper, answer_key, temperature: GENERATION_TEMPERATURE }
    }

    /// Load both templates relative to `base`. Missing files fail here, before
    /// any generation call can be made.
    pub fn from_settings(model: Arc<dyn TextGenerator>, prompts: &PromptSettings, base: &Path) -> Result<Self> {
        let question_paper = PromptTemplate::load(&resolve_with_base(base, &prompts.question_paper))?;
        let answer_key = PromptTemplate::load(&resolve_with_base(base, &prompts.answer_key))?;
        Ok(Self::new(model, question_paper, answer_key))
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn question_paper_prompt(&self, request: &PaperRequest, content: &str) -> Result<String> {
        let mcqs = request.count_of_mcqs.to_string();
        let short = request.count_of_short.to_string();
        let long = request.count_of_long.to_string();
        self.question_paper.fill(&[
            ("Standard", request.standard.as_str()),
            ("Subject_Name", request.subject_name.as_str()),
            ("difficulty", request.difficulty.as_str()),
            ("countOfMCQs", mcqs.as_str()),
            ("countOfShort", short.as_str()),
            ("countOfLong", long.as_str()),
            ("User_defined_notes", request.notes_or_none()),
            ("content", content),
        ])
    }

    pub async fn question_paper(&self, request: &PaperRequest, content: &str) -> Result<String> {
        let prompt = self.question_paper_prompt(request, content)?;
        tracing::info!(prompt_chars = prompt.chars().count(), content_chars = content.chars().count(), "generating question paper");
        let paper = self.model.generate(&prompt, self.temperature).await?;
        tracing::info!(chars = paper.chars().count(), "question paper ready");
        Ok(paper)
    }

    pub async fn answer_key(&self, question_paper: &str) -> Result<String> {
        let prompt = self.answer_key.fill(&[("question_paper", question_paper)])?;
        tracing::info!(prompt_chars = prompt.chars().count(), "generating answer key");
        let key = self.model.generate(&prompt, self.temperature).await?;
        tracing::info!(chars = key.chars().count(), "answer key ready");
        Ok(key)
    }
}
