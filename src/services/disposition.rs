//! Weather disposition classifier.
//!
//! Maps a weather snapshot to a mood (`good`, `average`, `bad`) that picks the
//! newsletter subject line. Pure and synchronous: missing inputs never fail,
//! they just don't match a rule.

use serde::Serialize;
use utoipa::ToSchema;

/// Degrees Fahrenheit above/below the historical normal high that sway the mood.
pub const DISPOSITION_TEMP_VARIANCE_F: f64 = 5.0;

/// Icon codes that count as precipitation.
pub const PRECIPITATING_ICONS: [&str; 4] = ["sleet", "rain", "snow", "tstorms"];

/// Icon code that always yields a good mood.
const SUNNY_ICON: &str = "sunny";

/// Three-way mood derived from current weather.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Disposition {
    Good,
    Average,
    Bad,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Good => "good",
            Disposition::Average => "average",
            Disposition::Bad => "bad",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One subject line per disposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubjectLines {
    pub good: &'static str,
    pub average: &'static str,
    pub bad: &'static str,
}

impl Default for SubjectLines {
    fn default() -> Self {
        Self {
            good: "It's nice out! Enjoy a discount on us.",
            average: "Enjoy a discount on us.",
            bad: "Not so nice out? That's okay, enjoy a discount on us.",
        }
    }
}

impl SubjectLines {
    pub fn for_disposition(&self, disposition: Disposition) -> &'static str {
        match disposition {
            Disposition::Good => self.good,
            Disposition::Average => self.average,
            Disposition::Bad => self.bad,
        }
    }
}

/// Classifier inputs. Every field is optional; an absent field simply
/// doesn't match any rule that needs it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WeatherInputs {
    /// Free-text sky label. Accepted but not used by any rule.
    pub sky: Option<String>,
    pub icon: Option<String>,
    pub current_temp_f: Option<f64>,
    pub average_high_temp_f: Option<f64>,
}

/// Disposition rules with their thresholds and subject table.
#[derive(Debug, Clone)]
pub struct Classifier {
    variance_f: f64,
    precipitating_icons: Vec<&'static str>,
    subjects: SubjectLines,
}

impl Default for Classifier {
    fn default() -> Self {
        Self {
            variance_f: DISPOSITION_TEMP_VARIANCE_F,
            precipitating_icons: PRECIPITATING_ICONS.to_vec(),
            subjects: SubjectLines::default(),
        }
    }
}

impl Classifier {
    pub fn new(variance_f: f64, subjects: SubjectLines) -> Self {
        Self {
            variance_f,
            subjects,
            ..Self::default()
        }
    }

    /// Classify a snapshot. Rules are checked in order, first match wins:
    ///
    /// 1. sunny icon → good
    /// 2. both temperatures known and at least `variance_f` above (below)
    ///    the normal high → good (bad)
    /// 3. precipitating icon → bad
    /// 4. anything else → average
    pub fn classify(&self, inputs: &WeatherInputs) -> Disposition {
        let icon = inputs.icon.as_deref();

        if icon == Some(SUNNY_ICON) {
            return Disposition::Good;
        }

        if let (Some(current), Some(average)) = (inputs.current_temp_f, inputs.average_high_temp_f)
        {
            // NaN compares false on both sides and falls through.
            let diff = current - average;
            if diff >= self.variance_f {
                return Disposition::Good;
            }
            if diff <= -self.variance_f {
                return Disposition::Bad;
            }
        }

        if let Some(icon) = icon {
            if self.precipitating_icons.contains(&icon) {
                return Disposition::Bad;
            }
        }

        Disposition::Average
    }

    pub fn subject_line(&self, disposition: Disposition) -> &'static str {
        self.subjects.for_disposition(disposition)
    }
}
