pub mod disposition;
pub mod newsletter;
pub mod newsletter_job;
pub mod weather_cache;
pub mod wunderground;
