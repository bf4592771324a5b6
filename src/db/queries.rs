use chrono::Utc;
use sqlx::PgPool;

use super::models::{Subscriber, SubscriberLocation, SubscriberWithLocation};

const SUBSCRIBER_COLUMNS: &str = "id, email_address, location_id, is_subscribed, token,
     subscribed_at, unsubscribed_at, created_at, updated_at";

const LOCATION_COLUMNS: &str =
    "id, city, state_abv, country, population, population_estimate, created_at, updated_at";

/// Largest locations by estimated population.
pub async fn list_top_locations(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<SubscriberLocation>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberLocation>(&format!(
        "SELECT {LOCATION_COLUMNS}
         FROM newsletter_subscriber_locations
         ORDER BY population_estimate DESC NULLS LAST
         LIMIT $1"
    ))
    .bind(limit)
    .fetch_all(pool)
    .await
}

/// Get a single location by ID.
pub async fn get_location(
    pool: &PgPool,
    id: i64,
) -> Result<Option<SubscriberLocation>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberLocation>(&format!(
        "SELECT {LOCATION_COLUMNS} FROM newsletter_subscriber_locations WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await
}

pub async fn get_subscriber_by_token(
    pool: &PgPool,
    token: &str,
) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE token = $1"
    ))
    .bind(token)
    .fetch_optional(pool)
    .await
}

pub async fn get_subscriber_by_email(
    pool: &PgPool,
    email_address: &str,
) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "SELECT {SUBSCRIBER_COLUMNS} FROM newsletter_subscribers WHERE email_address = $1"
    ))
    .bind(email_address)
    .fetch_optional(pool)
    .await
}

/// Insert a new, subscribed subscriber.
pub async fn insert_subscriber(
    pool: &PgPool,
    email_address: &str,
    location_id: i64,
    token: &str,
) -> Result<Subscriber, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "INSERT INTO newsletter_subscribers (
            email_address, location_id, is_subscribed, token,
            subscribed_at, created_at, updated_at
        ) VALUES ($1, $2, TRUE, $3, NOW(), NOW(), NOW())
        RETURNING {SUBSCRIBER_COLUMNS}"
    ))
    .bind(email_address)
    .bind(location_id)
    .bind(token)
    .fetch_one(pool)
    .await
}

/// Re-subscribe an opted-out subscriber, possibly to a new location.
pub async fn resubscribe(
    pool: &PgPool,
    id: i64,
    location_id: i64,
) -> Result<Subscriber, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "UPDATE newsletter_subscribers
         SET is_subscribed = TRUE, location_id = $2, subscribed_at = NOW(),
             unsubscribed_at = NULL, updated_at = NOW()
         WHERE id = $1
         RETURNING {SUBSCRIBER_COLUMNS}"
    ))
    .bind(id)
    .bind(location_id)
    .fetch_one(pool)
    .await
}

/// Mark a subscriber as opted out. Returns `None` for an unknown token.
pub async fn opt_out(pool: &PgPool, token: &str) -> Result<Option<Subscriber>, sqlx::Error> {
    sqlx::query_as::<_, Subscriber>(&format!(
        "UPDATE newsletter_subscribers
         SET is_subscribed = FALSE,
             unsubscribed_at = COALESCE(unsubscribed_at, $2),
             updated_at = NOW()
         WHERE token = $1
         RETURNING {SUBSCRIBER_COLUMNS}"
    ))
    .bind(token)
    .bind(Utc::now())
    .fetch_optional(pool)
    .await
}

/// All subscribed subscribers that have a location, in signup order.
pub async fn list_active_subscribers(
    pool: &PgPool,
) -> Result<Vec<SubscriberWithLocation>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberWithLocation>(
        "SELECT s.id, s.email_address, s.token, s.is_subscribed,
                l.id AS location_id, l.city, l.state_abv
         FROM newsletter_subscribers s
         JOIN newsletter_subscriber_locations l ON l.id = s.location_id
         WHERE s.is_subscribed
         ORDER BY s.id",
    )
    .fetch_all(pool)
    .await
}

/// One subscriber with location, looked up by token (any subscription state).
pub async fn get_subscriber_with_location(
    pool: &PgPool,
    token: &str,
) -> Result<Option<SubscriberWithLocation>, sqlx::Error> {
    sqlx::query_as::<_, SubscriberWithLocation>(
        "SELECT s.id, s.email_address, s.token, s.is_subscribed,
                l.id AS location_id, l.city, l.state_abv
         FROM newsletter_subscribers s
         JOIN newsletter_subscriber_locations l ON l.id = s.location_id
         WHERE s.token = $1",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
}
