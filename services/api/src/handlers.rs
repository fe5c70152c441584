//! Axum Handlers for the REST API
//!
//! This module contains the logic for the streaming chat endpoint and the
//! health probe. It uses `utoipa` doc comments to generate OpenAPI documentation.

use axum::{
    body::Body,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
};
use futures_util::StreamExt;
use std::sync::Arc;
use tracing::{error, info};
use xylor_core::llm_client::LLMStreamEvent;

use crate::{
    models::{ChatRequest, ErrorResponse},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse::new(message))).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let body = ErrorResponse::new("Failed to process chat request")
                    .with_details(err.to_string());
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// Stream a chat answer grounded in the user's project context.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Streamed plain-text answer", content_type = "text/plain", body = String),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<ChatRequest>,
) -> Result<Response, ApiError> {
    if payload.messages.is_empty() {
        return Err(ApiError::BadRequest(
            "messages must contain at least one message".to_string(),
        ));
    }

    let context = payload.context();
    info!(
        messages = payload.messages.len(),
        tagged = context.tagged_context.len(),
        has_data = context.structured_data.is_some(),
        "Handling chat request"
    );

    let stream = state
        .llm_client
        .stream_chat(context.chat_system_prompt(), payload.messages)
        .await?;

    // Headers are already sent once streaming starts, so mid-stream errors just end the body.
    let body = stream.filter_map(|event| async move {
        match event {
            Ok(LLMStreamEvent::TextChunk(text)) => Some(Ok::<_, std::io::Error>(text)),
            Err(e) => {
                error!(error = %e, "Chat stream failed mid-response");
                None
            }
        }
    });

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(body),
    )
        .into_response())
}

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = String))
)]
pub async fn health() -> &'static str {
    "ok"
}
