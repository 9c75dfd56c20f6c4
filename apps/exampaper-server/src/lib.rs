//! HTTP surface for the exam paper pipeline.
//!
//! `POST /generate-question-paper` (multipart), `POST /generate-answer-key`
//! (multipart or urlencoded), `GET /health`. Every route also answers with a
//! trailing slash.
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, FromRequest, Multipart, Request, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use exampaper_core::types::PaperRequest;
use exampaper_core::Error;
use exampaper_pipeline::ExamPipeline;

pub type SharedPipeline = Arc<ExamPipeline>;

pub fn router(pipeline: SharedPipeline, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/generate-question-paper", post(question_paper_handler))
        .route("/generate-question-paper/", post(question_paper_handler))
        .route("/generate-answer-key", post(answer_key_handler))
        .route("/generate-answer-key/", post(answer_key_handler))
        .route("/health", get(health_handler))
        .route("/health/", get(health_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(pipeline)
}

/// A request failure rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self { Self(err) }
}

impl ApiError {
    fn bad_request(msg: impl Into<String>) -> Self { Self(Error::InvalidRequest(msg.into())) }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if self.0.is_client_error() { StatusCode::BAD_REQUEST } else { StatusCode::INTERNAL_SERVER_ERROR };
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        } else {
            tracing::warn!(error = %self.0, "request rejected");
        }
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

async fn health_handler() -> Json<Value> {
    Json(json!({ "status": "alive" }))
}

async fn question_paper_handler(State(pipeline): State<SharedPipeline>, request: Request) -> Result<Json<Value>, ApiError> {
    let multipart = Multipart::from_request(request, &()).await.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let mut form = read_multipart(multipart).await?;
    let request = form.paper_request()?;
    tracing::info!(
        standard = %request.standard,
        subject = %request.subject_name,
        mcqs = request.count_of_mcqs,
        short = request.count_of_short,
        long = request.count_of_long,
        pdf_bytes = form.pdf.as_ref().map_or(0, Vec::len),
        "question paper requested"
    );
    let paper = pipeline.question_paper(&request, form.pdf.as_deref()).await?;
    Ok(Json(json!({ "question_paper": paper })))
}

#[derive(Debug, Deserialize)]
struct AnswerKeyForm {
    question_paper: String,
}

async fn answer_key_handler(State(pipeline): State<SharedPipeline>, request: Request) -> Result<Json<Value>, ApiError> {
    let paper = if is_multipart(request.headers()) {
        let multipart = Multipart::from_request(request, &()).await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(multipart).await?.required("question_paper")?
    } else {
        let Form(form) = Form::<AnswerKeyForm>::from_request(request, &()).await.map_err(|e| ApiError::bad_request(e.body_text()))?;
        form.question_paper
    };
    tracing::info!(chars = paper.chars().count(), "answer key requested");
    let key = pipeline.answer_key(&paper).await?;
    Ok(Json(json!({ "answer_key": key })))
}

fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"))
}

/// Text fields plus the optional `pdf` file part.
#[derive(Debug, Default)]
struct FormFields {
    text: HashMap<String, String>,
    pdf: Option<Vec<u8>>,
}

async fn read_multipart(mut multipart: Multipart) -> Result<FormFields, ApiError> {
    let mut form = FormFields::default();
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::bad_request(e.body_text()))? {
        let Some(name) = field.name().map(str::to_string) else { continue };
        if name == "pdf" {
            let bytes = field.bytes().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            // browsers send an empty part when no file was chosen
            if !bytes.is_empty() {
                form.pdf = Some(bytes.to_vec());
            }
        } else {
            let value = field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))?;
            form.text.insert(name, value);
        }
    }
    Ok(form)
}

impl FormFields {
    fn required(&mut self, name: &str) -> Result<String, ApiError> {
        self.text.remove(name).ok_or_else(|| ApiError::bad_request(format!("missing form field '{name}'")))
    }

    fn count(&mut self, name: &str) -> Result<u32, ApiError> {
        let raw = self.required(name)?;
        raw.trim().parse().map_err(|_| ApiError::bad_request(format!("'{name}' must be a non-negative integer, got '{raw}'")))
    }

    fn paper_request(&mut self) -> Result<PaperRequest, ApiError> {
        let request = PaperRequest {
            standard: self.required("Standard")?,
            subject_name: self.required("Subject_Name")?,
            difficulty: self.required("difficulty")?,
            count_of_mcqs: self.count("countOfMCQs")?,
            count_of_short: self.count("countOfShort")?,
            count_of_long: self.count("countOfLong")?,
            user_defined_notes: self.text.remove("User_defined_notes"),
        };
        request.validate()?;
        Ok(request)
    }
}
