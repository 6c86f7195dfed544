use chrono::{DateTime, Months, NaiveDate, Utc};
use chrono_tz::Tz;
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::config::{Config, SafewayEndpoints};
use crate::error::Result;
use crate::models::location::{AvailableDay, Location, SiteAvailability};
use crate::models::slots::{parse_calendar_date, parse_local_start};
use crate::models::strict::StrictMap;
use crate::scraping::client::HttpClient;
use crate::scraping::constants::*;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EligibilityRequest<'a> {
    eligibility_question_response: Vec<QuestionAnswer<'a>>,
    url: String,
}

#[derive(Serialize)]
struct QuestionAnswer<'a> {
    id: &'a str,
    value: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct Coordinate {
    lat: f64,
    lng: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LocationQuery<'a> {
    include_pools: Vec<&'a str>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchRequest<'a> {
    location: Coordinate,
    from_date: String,
    vaccine_data: &'a Value,
    location_query: LocationQuery<'a>,
    dose_number: u8,
    url: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AvailabilityRequest<'a> {
    dose_number: u8,
    start_date: String,
    end_date: String,
    url: String,
    vaccine_data: &'a Value,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SlotsRequest<'a> {
    url: String,
    vaccine_data: &'a Value,
}

/// Safeway and Sobeys pharmacies on the pharmacyappointments.ca booking API.
pub struct SafewayScraper {
    client: HttpClient,
    endpoints: SafewayEndpoints,
    lookahead_months: u32,
    verbose_slots: bool,
    timezone: Tz,
}

impl SafewayScraper {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        SafewayScraper {
            client,
            endpoints: config.safeway.clone(),
            lookahead_months: config.lookahead_months,
            verbose_slots: config.verbose_slots,
            timezone: config.timezone,
        }
    }

    /// `on_site` sees each location as soon as it is done, so a later failure
    /// does not hide what was already found.
    pub async fn run(
        &self,
        today: NaiveDate,
        mut on_site: impl FnMut(&SiteAvailability),
    ) -> Result<Vec<SiteAvailability>> {
        let token = self.get_vaccine_token().await?;
        let locations = self.search_locations(&token, today).await?;

        let mut results = Vec::with_capacity(locations.len());
        for location in locations {
            info!("checking Safeway {}", location.name);
            let mut days = Vec::new();
            for date in self.get_available_dates(&token, &location, today).await? {
                let times = if self.verbose_slots {
                    Some(self.get_times(&token, &location, date).await?)
                } else {
                    None
                };
                days.push(AvailableDay { date, times });
            }
            let site = SiteAvailability { location, days };
            on_site(&site);
            results.push(site);
        }
        Ok(results)
    }

    /// Answers the screening questionnaire. The returned token is opaque and
    /// is sent back unchanged on every later call.
    pub async fn get_vaccine_token(&self) -> Result<Value> {
        let request = EligibilityRequest {
            eligibility_question_response: vec![
                QuestionAnswer {
                    id: "q.screening.province",
                    value: &self.endpoints.province,
                    kind: "single-select",
                },
                QuestionAnswer {
                    id: "q.screening.alberta.province",
                    value: "Yes",
                    kind: "single-select",
                },
            ],
            url: self.site_page("screening"),
        };

        let body = self.client.post_json(&self.api("eligibility"), &request).await?;
        Ok(StrictMap::new(&body).get("vaccineData")?.value().clone())
    }

    pub async fn search_locations(&self, token: &Value, today: NaiveDate) -> Result<Vec<Location>> {
        let request = SearchRequest {
            location: Coordinate {
                lat: self.endpoints.latitude,
                lng: self.endpoints.longitude,
            },
            from_date: today.format("%Y-%m-%d").to_string(),
            vaccine_data: token,
            location_query: LocationQuery {
                include_pools: vec![SAFEWAY_POOL],
            },
            dose_number: SAFEWAY_DOSE_NUMBER,
            url: self.site_page("location-select"),
        };

        let body = self
            .client
            .post_json(&self.api("locations/search"), &request)
            .await?;
        parse_locations(&body)
    }

    pub async fn get_available_dates(
        &self,
        token: &Value,
        location: &Location,
        today: NaiveDate,
    ) -> Result<Vec<NaiveDate>> {
        let end = today
            .checked_add_months(Months::new(self.lookahead_months))
            .unwrap_or(NaiveDate::MAX);
        let request = AvailabilityRequest {
            dose_number: SAFEWAY_DOSE_NUMBER,
            start_date: today.format("%Y-%m-%d").to_string(),
            end_date: end.format("%Y-%m-%d").to_string(),
            url: self.site_page("location-select"),
            vaccine_data: token,
        };

        let url = self.api(&format!("locations/{}/availability", location.external_id));
        let body = self.client.post_json(&url, &request).await?;
        parse_available_dates(&body)
    }

    pub async fn get_times(
        &self,
        token: &Value,
        location: &Location,
        date: NaiveDate,
    ) -> Result<Vec<DateTime<Utc>>> {
        let request = SlotsRequest {
            url: self.site_page("location-select"),
            vaccine_data: token,
        };

        let url = self.api(&format!(
            "locations/{}/date/{}/slots",
            location.external_id,
            date.format("%Y-%m-%d")
        ));
        let body = self.client.post_json(&url, &request).await?;

        let mut times = Vec::new();
        for slot in StrictMap::new(&body).get("slotsWithAvailability")?.items()? {
            let start = slot.get("localStartTime")?.as_str()?;
            times.push(parse_local_start(start, date, self.timezone)?);
        }
        Ok(times)
    }

    fn api(&self, path: &str) -> String {
        format!("{}/{}", self.endpoints.api_base.trim_end_matches('/'), path)
    }

    fn site_page(&self, page: &str) -> String {
        format!("{}/{}", self.endpoints.site_url.trim_end_matches('/'), page)
    }
}

fn parse_locations(body: &Value) -> Result<Vec<Location>> {
    StrictMap::new(body)
        .get("locations")?
        .items()?
        .iter()
        .map(|location| -> Result<Location> {
            let address = location
                .optional("address")
                .and_then(|a| a.as_str().ok())
                .unwrap_or_default()
                .to_string();
            Ok(Location {
                name: location.get("name")?.as_str()?.to_string(),
                address,
                external_id: location.get("extId")?.as_id()?,
                city: String::new(),
            })
        })
        .collect()
}

fn parse_available_dates(body: &Value) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    for entry in StrictMap::new(body).get("availability")?.items()? {
        if entry.get("available")?.as_bool()? {
            dates.push(parse_calendar_date(entry.get("date")?.as_str()?)?);
        }
    }
    Ok(dates)
}
