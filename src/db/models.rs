use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// A city subscribers can sign up for.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some accessed only via route serialization
pub struct SubscriberLocation {
    pub id: i64,
    pub city: String,
    pub state_abv: String,
    pub country: String,
    /// Last known population
    pub population: Option<i32>,
    /// Estimated population, used to rank locations
    pub population_estimate: Option<i32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriberLocation {
    /// "City, ST"
    pub fn city_state(&self) -> String {
        format!("{}, {}", self.city, self.state_abv)
    }

    /// Full state name, empty when the abbreviation is unknown.
    pub fn state(&self) -> &'static str {
        state_name(&self.state_abv)
    }
}

impl std::fmt::Display for SubscriberLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.city_state())
    }
}

/// A newsletter subscriber.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // All fields populated by FromRow; some accessed only via route serialization
pub struct Subscriber {
    pub id: i64,
    pub email_address: String,
    pub location_id: Option<i64>,
    pub is_subscribed: bool,
    /// Opaque id used in subscriber-facing links
    pub token: String,
    pub subscribed_at: DateTime<Utc>,
    pub unsubscribed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Subscriber joined with the location fields the newsletter needs.
#[derive(Debug, Clone, FromRow)]
#[allow(dead_code)] // id and is_subscribed come with the row; the job only needs the rest
pub struct SubscriberWithLocation {
    pub id: i64,
    pub email_address: String,
    pub token: String,
    pub is_subscribed: bool,
    pub location_id: i64,
    pub city: String,
    pub state_abv: String,
}

/// Two-letter US state/territory code to full name (case-insensitive).
pub fn state_name(state_abv: &str) -> &'static str {
    match state_abv.trim().to_uppercase().as_str() {
        "AK" => "Alaska",
        "AL" => "Alabama",
        "AR" => "Arkansas",
        "AS" => "American Samoa",
        "AZ" => "Arizona",
        "CA" => "California",
        "CO" => "Colorado",
        "CT" => "Connecticut",
        "DC" => "District of Columbia",
        "DE" => "Delaware",
        "FL" => "Florida",
        "GA" => "Georgia",
        "GU" => "Guam",
        "HI" => "Hawaii",
        "IA" => "Iowa",
        "ID" => "Idaho",
        "IL" => "Illinois",
        "IN" => "Indiana",
        "KS" => "Kansas",
        "KY" => "Kentucky",
        "LA" => "Louisiana",
        "MA" => "Massachusetts",
        "MD" => "Maryland",
        "ME" => "Maine",
        "MI" => "Michigan",
        "MN" => "Minnesota",
        "MO" => "Missouri",
        "MP" => "Northern Mariana Islands",
        "MS" => "Mississippi",
        "MT" => "Montana",
        "NA" => "National",
        "NC" => "North Carolina",
        "ND" => "North Dakota",
        "NE" => "Nebraska",
        "NH" => "New Hampshire",
        "NJ" => "New Jersey",
        "NM" => "New Mexico",
        "NV" => "Nevada",
        "NY" => "New York",
        "OH" => "Ohio",
        "OK" => "Oklahoma",
        "OR" => "Oregon",
        "PA" => "Pennsylvania",
        "PR" => "Puerto Rico",
        "RI" => "Rhode Island",
        "SC" => "South Carolina",
        "SD" => "South Dakota",
        "TN" => "Tennessee",
        "TX" => "Texas",
        "UT" => "Utah",
        "VA" => "Virginia",
        "VI" => "Virgin Islands",
        "VT" => "Vermont",
        "WA" => "Washington",
        "WI" => "Wisconsin",
        "WV" => "West Virginia",
        "WY" => "Wyoming",
        _ => "",
    }
}

/// Sort locations by state then city and group them under the full state name.
///
/// Groups keep the sorted order, so states appear alphabetically by
/// abbreviation.
pub fn group_locations_by_state(
    mut locations: Vec<SubscriberLocation>,
) -> Vec<(String, Vec<SubscriberLocation>)> {
    locations.sort_by(|a, b| {
        (a.state_abv.as_str(), a.city.as_str()).cmp(&(b.state_abv.as_str(), b.city.as_str()))
    });

    let mut groups: Vec<(String, Vec<SubscriberLocation>)> = Vec::new();
    for location in locations {
        let state = location.state().to_string();
        match groups.iter_mut().find(|(name, _)| *name == state) {
            Some((_, members)) => members.push(location),
            None => groups.push((state, vec![location])),
        }
    }
    groups
}
