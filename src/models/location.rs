use chrono::{DateTime, NaiveDate, Utc};

/// A pharmacy as listed in a provider's location directory.
#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub address: String,
    pub external_id: String,
    pub city: String,
}

/// Free slots found for one bookable day.
#[derive(Debug, Clone, PartialEq)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<DateTime<Utc>>,
}

/// What one Costco location looked like on this run.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationAvailability {
    pub location: Location,
    pub next_available_date: Option<NaiveDate>,
    /// Nothing bookable inside the lookahead window, so no slots were fetched.
    pub beyond_horizon: bool,
    pub bookable_days: Vec<NaiveDate>,
    pub checked_days: Vec<DayAvailability>,
    pub skipped_days: Vec<NaiveDate>,
}

/// One day a Safeway pharmacy reports as available. `times` is only filled in
/// when per-day slot lookups are enabled.
#[derive(Debug, Clone, PartialEq)]
pub struct AvailableDay {
    pub date: NaiveDate,
    pub times: Option<Vec<DateTime<Utc>>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SiteAvailability {
    pub location: Location,
    pub days: Vec<AvailableDay>,
}
