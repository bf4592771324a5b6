use axum::extract::State;
use axum::Json;
use serde::Serialize;
use utoipa::ToSchema;

use crate::db::{models, queries};
use crate::errors::AppError;
use crate::routes::AppState;

/// How many of the largest locations are offered for signup.
const LOCATION_LIST_LIMIT: i64 = 100;

/// A city subscribers can sign up for.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationResponse {
    /// Location identifier (used as `location_id` when subscribing)
    pub id: i64,
    /// City name (e.g. "San Francisco")
    pub city: String,
    /// Two-letter state abbreviation
    pub state_abv: String,
    /// Display name, "City, ST"
    pub display_name: String,
}

impl From<models::SubscriberLocation> for LocationResponse {
    fn from(l: models::SubscriberLocation) -> Self {
        Self {
            display_name: l.city_state(),
            id: l.id,
            city: l.city,
            state_abv: l.state_abv,
        }
    }
}

/// Locations under one state.
#[derive(Debug, Serialize, ToSchema)]
pub struct LocationGroup {
    /// Full state name (empty for unknown abbreviations)
    pub state: String,
    pub locations: Vec<LocationResponse>,
}

/// List the largest locations, grouped by state.
#[utoipa::path(
    get,
    path = "/api/v1/locations",
    tag = "Locations",
    responses(
        (status = 200, description = "Locations grouped by state", body = Vec<LocationGroup>),
    )
)]
pub async fn list_locations(
    State(state): State<AppState>,
) -> Result<Json<Vec<LocationGroup>>, AppError> {
    let locations = queries::list_top_locations(&state.pool, LOCATION_LIST_LIMIT).await?;
    let groups = models::group_locations_by_state(locations)
        .into_iter()
        .map(|(state, members)| LocationGroup {
            state,
            locations: members.into_iter().map(LocationResponse::from).collect(),
        })
        .collect();
    Ok(Json(groups))
}
