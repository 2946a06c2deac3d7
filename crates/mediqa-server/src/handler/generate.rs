//! Question answering endpoint.

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use mediqa_rig::rag::GeneratedAnswer;
use serde::{Deserialize, Serialize};

use crate::TRACING_TARGET;
use crate::handler::{ErrorKind, Result};
use crate::service::QaService;

/// Query string of `GET /generate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateQuery {
    /// The question to answer.
    pub question: Option<String>,
}

/// Answers `question` from the knowledge index.
///
/// The body is a one-question batch holding one answer:
/// `[[{"generated_text": "..."}]]`.
pub async fn generate(
    State(qa_service): State<QaService>,
    query: Result<Query<GenerateQuery>, QueryRejection>,
) -> Result<Json<Vec<Vec<GeneratedAnswer>>>> {
    let Query(query) = query.map_err(|rejection| {
        tracing::warn!(
            target: TRACING_TARGET,
            error = %rejection.body_text(),
            "Malformed query string"
        );
        ErrorKind::BadRequest.with_context(rejection.body_text())
    })?;

    let Some(question) = query.question else {
        tracing::warn!(target: TRACING_TARGET, "Request without question");
        return Err(ErrorKind::BadRequest.with_context("missing `question` parameter"));
    };

    tracing::info!(
        target: TRACING_TARGET,
        question_len = question.len(),
        "Answering question"
    );

    let answer = qa_service.answer(&question).await?;
    Ok(Json(vec![vec![answer]]))
}
