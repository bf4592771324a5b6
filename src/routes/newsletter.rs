//! Newsletter job HTTP endpoints.
//!
//! - GET  /api/v1/newsletter/status: state of the scheduled job
//! - POST /api/v1/newsletter/run: run the job now and return its report

use axum::extract::State;
use axum::Json;

use crate::errors::{AppError, ErrorResponse};
use crate::routes::AppState;
use crate::services::newsletter_job::{run_newsletter, NewsletterReport, NewsletterState};

/// Get the current newsletter job status.
#[utoipa::path(
    get,
    path = "/api/v1/newsletter/status",
    tag = "Newsletter",
    responses(
        (status = 200, description = "Current newsletter job status", body = NewsletterState),
    )
)]
pub async fn get_newsletter_status(State(state): State<AppState>) -> Json<NewsletterState> {
    let s = state.newsletter_state.read().await;
    Json(s.clone())
}

/// Send the newsletter to all active subscribers now.
///
/// Per-subscriber failures are counted in the report rather than failing the
/// request. Rejected with 400 while a run is already in progress.
#[utoipa::path(
    post,
    path = "/api/v1/newsletter/run",
    tag = "Newsletter",
    responses(
        (status = 200, description = "Run completed", body = NewsletterReport),
        (status = 400, description = "A run is already in progress", body = ErrorResponse),
        (status = 500, description = "Subscribers could not be loaded", body = ErrorResponse),
    )
)]
pub async fn run_newsletter_now(
    State(state): State<AppState>,
) -> Result<Json<NewsletterReport>, AppError> {
    let report = run_newsletter(
        &state.pool,
        &state.cache,
        state.mailer.as_ref(),
        &state.settings,
        &state.newsletter_state,
    )
    .await?;
    Ok(Json(report))
}
