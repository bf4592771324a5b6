pub mod health;
pub mod locations;
pub mod newsletter;
pub mod subscribers;

use std::sync::Arc;

use crate::services::newsletter::Mailer;
use crate::services::newsletter_job::{NewsletterSettings, SharedNewsletterState};
use crate::services::weather_cache::SharedWeatherCache;

/// Shared application state for all endpoints.
#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) pool: sqlx::PgPool,
    pub(crate) cache: SharedWeatherCache,
    pub(crate) mailer: Arc<dyn Mailer>,
    pub(crate) settings: NewsletterSettings,
    pub(crate) newsletter_state: SharedNewsletterState,
}
