use std::env;

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;
use dotenv::dotenv;

use crate::scraping::constants::*;

/// Everything a single poll run needs. Built once in `main` and passed down.
#[derive(Debug, Clone)]
pub struct Config {
    pub city: String,
    pub timezone: Tz,
    /// Fetch per-day slot times from the Safeway booking API as well.
    pub verbose_slots: bool,
    /// Costco only looks up slots for this many bookable days.
    pub max_days: usize,
    pub lookahead_months: u32,
    pub slot_minutes: i64,
    /// Keep going with the next provider after one fails.
    pub isolate_providers: bool,
    pub costco: CostcoEndpoints,
    pub london_drugs: LondonDrugsEndpoints,
    pub safeway: SafewayEndpoints,
}

#[derive(Debug, Clone)]
pub struct CostcoEndpoints {
    pub directory_url: String,
    pub graphql_base: String,
    pub service_id: i64,
}

#[derive(Debug, Clone)]
pub struct LondonDrugsEndpoints {
    pub base_url: String,
    pub service_category: String,
}

#[derive(Debug, Clone)]
pub struct SafewayEndpoints {
    pub api_base: String,
    pub site_url: String,
    pub province: String,
    pub latitude: f64,
    pub longitude: f64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            city: DEFAULT_CITY.to_string(),
            timezone: chrono_tz::America::Edmonton,
            verbose_slots: false,
            max_days: 5,
            lookahead_months: 1,
            slot_minutes: 5,
            isolate_providers: true,
            costco: CostcoEndpoints {
                directory_url: COSTCO_DIRECTORY_URL.to_string(),
                graphql_base: COSTCO_GRAPHQL_BASE.to_string(),
                service_id: COSTCO_SERVICE_ID,
            },
            london_drugs: LondonDrugsEndpoints {
                base_url: LONDON_DRUGS_BASE_URL.to_string(),
                service_category: COVID_CATEGORY_TEXT.to_string(),
            },
            safeway: SafewayEndpoints {
                api_base: SAFEWAY_API_BASE.to_string(),
                site_url: SAFEWAY_SITE_URL.to_string(),
                province: SAFEWAY_PROVINCE.to_string(),
                latitude: EDMONTON_LAT,
                longitude: EDMONTON_LNG,
            },
        }
    }
}

impl Config {
    /// Defaults, overridden by `POLLER_*` variables from the environment or `.env`.
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Config::default();

        if let Some(city) = lookup("POLLER_CITY") {
            config.city = city;
        }
        if let Some(tz) = lookup("POLLER_TIMEZONE") {
            config.timezone = tz
                .parse::<Tz>()
                .map_err(|e| anyhow!("POLLER_TIMEZONE: {e}"))?;
        }
        if let Some(verbose) = lookup("POLLER_VERBOSE") {
            config.verbose_slots = parse_flag(&verbose).context("POLLER_VERBOSE")?;
        }
        if let Some(days) = lookup("POLLER_MAX_DAYS") {
            config.max_days = days.parse().context("POLLER_MAX_DAYS")?;
        }
        if let Some(isolate) = lookup("POLLER_ISOLATE_PROVIDERS") {
            config.isolate_providers = parse_flag(&isolate).context("POLLER_ISOLATE_PROVIDERS")?;
        }

        Ok(config)
    }
}

fn parse_flag(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(anyhow!("expected a boolean, got `{other}`")),
    }
}
