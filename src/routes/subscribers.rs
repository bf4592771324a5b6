//! Subscriber HTTP endpoints.
//!
//! - POST /api/v1/subscribe
//! - GET  /api/v1/subscribers/:token
//! - POST /api/v1/subscribers/:token/optout
//! - GET  /api/v1/subscribers/:token/email?format=html|text

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::db::{models, queries};
use crate::errors::{AppError, ErrorResponse};
use crate::helpers::{is_valid_email_address, new_subscriber_token};
use crate::routes::locations::LocationResponse;
use crate::routes::AppState;
use crate::services::newsletter::{opt_out_url, render_newsletter, EmailFormat, NewsletterContext};

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubscribeRequest {
    /// Email address to send the newsletter to
    pub email: String,
    /// Location to get weather for (see GET /api/v1/locations)
    pub location_id: i64,
}

#[derive(Debug, Deserialize, IntoParams)]
pub struct EmailPreviewQuery {
    /// "html" (default), "text" or "txt"
    pub format: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SubscriberResponse {
    pub email_address: String,
    /// Opaque subscriber token used in links
    pub token: String,
    pub is_subscribed: bool,
    /// When the subscription started (ISO 8601)
    pub subscribed_at: String,
    /// When the subscriber opted out (ISO 8601), if they did
    pub unsubscribed_at: Option<String>,
    pub location: Option<LocationResponse>,
    /// Link that opts this subscriber out
    pub opt_out_url: String,
}

impl SubscriberResponse {
    fn new(
        sub: models::Subscriber,
        location: Option<models::SubscriberLocation>,
        public_base_url: &str,
    ) -> Self {
        Self {
            opt_out_url: opt_out_url(public_base_url, &sub.token),
            email_address: sub.email_address,
            token: sub.token,
            is_subscribed: sub.is_subscribed,
            subscribed_at: sub.subscribed_at.to_rfc3339(),
            unsubscribed_at: sub.unsubscribed_at.map(|dt| dt.to_rfc3339()),
            location: location.map(LocationResponse::from),
        }
    }
}

/// Column width of `newsletter_subscribers.email_address`.
const MAX_EMAIL_LENGTH: usize = 200;

/// Check the submitted email address before touching the database.
fn validate_email(email: &str) -> Result<(), AppError> {
    if email.is_empty() {
        return Err(AppError::BadRequest(
            "Please enter an email address".to_string(),
        ));
    }
    if email.chars().count() > MAX_EMAIL_LENGTH {
        return Err(AppError::BadRequest(format!(
            "Email address must be at most {} characters",
            MAX_EMAIL_LENGTH
        )));
    }
    if !is_valid_email_address(email) {
        return Err(AppError::BadRequest(
            "Please enter a valid email address".to_string(),
        ));
    }
    Ok(())
}

async fn load_location(
    pool: &sqlx::PgPool,
    location_id: Option<i64>,
) -> Result<Option<models::SubscriberLocation>, AppError> {
    match location_id {
        Some(id) => Ok(queries::get_location(pool, id).await?),
        None => Ok(None),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Subscribe an email address to the newsletter for a location.
///
/// A previously opted-out address is subscribed again, to the new location.
#[utoipa::path(
    post,
    path = "/api/v1/subscribe",
    tag = "Subscribers",
    request_body = SubscribeRequest,
    responses(
        (status = 201, description = "Subscribed", body = SubscriberResponse),
        (status = 200, description = "Previously opted-out subscriber re-subscribed", body = SubscriberResponse),
        (status = 400, description = "Invalid email, unknown location or already subscribed", body = ErrorResponse),
    )
)]
pub async fn subscribe(
    State(state): State<AppState>,
    Json(req): Json<SubscribeRequest>,
) -> Result<(StatusCode, Json<SubscriberResponse>), AppError> {
    let email = req.email.trim();
    validate_email(email)?;

    let location = queries::get_location(&state.pool, req.location_id)
        .await?
        .ok_or_else(|| AppError::BadRequest("Please select a location".to_string()))?;

    if let Some(existing) = queries::get_subscriber_by_email(&state.pool, email).await? {
        if existing.is_subscribed {
            let current = load_location(&state.pool, existing.location_id).await?;
            let message = match current {
                Some(loc) => format!("{} is already subscribed for {}", existing.email_address, loc),
                None => format!("{} is already subscribed", existing.email_address),
            };
            return Err(AppError::BadRequest(message));
        }

        let sub = queries::resubscribe(&state.pool, existing.id, location.id).await?;
        tracing::info!("Re-subscribed {} for {}", sub.email_address, location);
        return Ok((
            StatusCode::OK,
            Json(SubscriberResponse::new(
                sub,
                Some(location),
                &state.settings.public_base_url,
            )),
        ));
    }

    let token = new_subscriber_token();
    let sub = queries::insert_subscriber(&state.pool, email, location.id, &token).await?;
    tracing::info!("Subscribed {} for {}", sub.email_address, location);

    Ok((
        StatusCode::CREATED,
        Json(SubscriberResponse::new(
            sub,
            Some(location),
            &state.settings.public_base_url,
        )),
    ))
}

/// Get a subscriber by token.
#[utoipa::path(
    get,
    path = "/api/v1/subscribers/{token}",
    tag = "Subscribers",
    params(
        ("token" = String, Path, description = "Subscriber token"),
    ),
    responses(
        (status = 200, description = "Subscriber details", body = SubscriberResponse),
        (status = 404, description = "Subscriber not found", body = ErrorResponse),
    )
)]
pub async fn get_subscriber(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SubscriberResponse>, AppError> {
    let sub = queries::get_subscriber_by_token(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".to_string()))?;
    let location = load_location(&state.pool, sub.location_id).await?;

    Ok(Json(SubscriberResponse::new(
        sub,
        location,
        &state.settings.public_base_url,
    )))
}

/// Opt a subscriber out of the newsletter.
#[utoipa::path(
    post,
    path = "/api/v1/subscribers/{token}/optout",
    tag = "Subscribers",
    params(
        ("token" = String, Path, description = "Subscriber token"),
    ),
    responses(
        (status = 200, description = "Subscriber opted out", body = SubscriberResponse),
        (status = 404, description = "Subscriber not found", body = ErrorResponse),
    )
)]
pub async fn opt_out(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<SubscriberResponse>, AppError> {
    let sub = queries::opt_out(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".to_string()))?;
    tracing::info!("Opted out {}", sub.email_address);
    let location = load_location(&state.pool, sub.location_id).await?;

    Ok(Json(SubscriberResponse::new(
        sub,
        location,
        &state.settings.public_base_url,
    )))
}

/// Preview the newsletter a subscriber would receive right now.
///
/// Weather comes from the shared cache, so previews and the scheduled job
/// share provider calls.
#[utoipa::path(
    get,
    path = "/api/v1/subscribers/{token}/email",
    tag = "Subscribers",
    params(
        ("token" = String, Path, description = "Subscriber token"),
        EmailPreviewQuery,
    ),
    responses(
        (status = 200, description = "Rendered newsletter body", body = String, content_type = "text/html"),
        (status = 404, description = "Subscriber or format not found", body = ErrorResponse),
        (status = 502, description = "Weather provider unavailable", body = ErrorResponse),
    )
)]
pub async fn preview_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
    Query(params): Query<EmailPreviewQuery>,
) -> Result<Response, AppError> {
    let format = EmailFormat::parse(params.format.as_deref())
        .ok_or_else(|| AppError::NotFound("Unknown email format".to_string()))?;

    let sub = queries::get_subscriber_with_location(&state.pool, &token)
        .await?
        .ok_or_else(|| AppError::NotFound("Subscriber not found".to_string()))?;

    let weather = state
        .cache
        .get_cached_or_fetch(sub.location_id, &sub.city, &sub.state_abv)
        .await?;

    let location = format!("{}, {}", sub.city, sub.state_abv);
    let opt_out = opt_out_url(&state.settings.public_base_url, &sub.token);
    let rendered = render_newsletter(&NewsletterContext {
        email_address: &sub.email_address,
        location: &location,
        weather: &weather,
        opt_out_url: &opt_out,
    });

    Ok((
        [(header::CONTENT_TYPE, format.content_type())],
        rendered.body(format).to_string(),
    )
        .into_response())
}
