use chrono::{DateTime, Datelike, Days, Months, NaiveDate, NaiveTime, Utc};
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::config::{Config, CostcoEndpoints};
use crate::error::{Result, ScrapeError};
use crate::models::location::{DayAvailability, Location, LocationAvailability};
use crate::models::slots::{
    free_slots, generate_slots, is_on_grid, parse_calendar_date, parse_js_date, parse_time_of_day,
};
use crate::models::strict::StrictMap;
use crate::scraping::client::HttpClient;

const RETAILER_QUERY: &str = r#"query ($hippo_id: String!) {
  cRetailerWithSetting(data:{slug:$hippo_id}) {
    data {
      retailer {
        id,name,city,slug,timezone,startTime,endTime
      }
    },
  }
}"#;

const BOOKABLE_DAYS_QUERY: &str = r#"query(
    $api_id: Int!,
    $startDate: String!,
    $endDate: String!,
    $serviceId: Int!,
) {
    searchBookableWorkTimes (data:{
        retailerId:$api_id,
        startDate:$startDate,
        endDate:$endDate,
        serviceId:$serviceId
    }) {
        bookableDays,
        nextAvailableDate,
    }
}"#;

const DAY_SLOTS_QUERY: &str = r#"query(
    $api_id: Int!,
    $day_of_week: Int!,
    $startDate: String!,
    $endDate: String!,
    $serviceId: Int!,
) {
    searchBookableWorkTimes (data:{
        retailerId:$api_id,
        startDate:$startDate,
        endDate:$endDate,
        day:$day_of_week,
        serviceId:$serviceId
    }) {
        workTimes {
            startTimes,
            startDate,
            endTimes,
            endDate,
        },
        events {
            id,
            startTime,
            endTime,
        },
    }
}"#;

const WINDOW_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Costco pharmacies booked through the TeleHippo GraphQL API.
pub struct CostcoScraper {
    client: HttpClient,
    endpoints: CostcoEndpoints,
    city: String,
    max_days: usize,
    lookahead_months: u32,
    slot_minutes: i64,
}

impl CostcoScraper {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        CostcoScraper {
            client,
            endpoints: config.costco.clone(),
            city: config.city.clone(),
            max_days: config.max_days,
            lookahead_months: config.lookahead_months,
            slot_minutes: config.slot_minutes,
        }
    }

    /// `on_location` sees each location as soon as it is done, so a later
    /// failure does not hide what was already found.
    pub async fn run(
        &self,
        today: NaiveDate,
        mut on_location: impl FnMut(&LocationAvailability),
    ) -> Result<Vec<LocationAvailability>> {
        let mut results = Vec::new();
        for location in self.get_locations_in_city().await? {
            info!("Checking Costco {}", location.name);
            let availability = self.check_location(location, today).await?;
            on_location(&availability);
            results.push(availability);
        }
        if results.is_empty() {
            info!("no Costco pharmacies offer vaccinations in {}", self.city);
        }
        Ok(results)
    }

    pub async fn get_locations_in_city(&self) -> Result<Vec<Location>> {
        let directory = self.client.get_json(&self.endpoints.directory_url).await?;
        Ok(in_city(parse_directory(&directory)?, &self.city))
    }

    async fn check_location(
        &self,
        location: Location,
        today: NaiveDate,
    ) -> Result<LocationAvailability> {
        let api_id = self.resolve_api_id(&location.external_id).await?;
        let (next_available_date, bookable_days) = self.get_available_days(api_id, today).await?;

        let mut availability = LocationAvailability {
            location,
            next_available_date,
            beyond_horizon: false,
            bookable_days: bookable_days.clone(),
            checked_days: Vec::new(),
            skipped_days: Vec::new(),
        };

        let horizon = add_months(today, self.lookahead_months);
        match next_available_date {
            Some(next) if next <= horizon => {}
            _ => {
                info!(
                    "nothing bookable at {} before {}",
                    availability.location.name, horizon
                );
                availability.beyond_horizon = true;
                return Ok(availability);
            }
        }

        let (checked, skipped) = split_days(bookable_days, self.max_days);
        availability.skipped_days = skipped;
        for day in checked {
            let slots = self.get_times(api_id, day).await?;
            availability.checked_days.push(DayAvailability { date: day, slots });
        }

        Ok(availability)
    }

    /// The directory lists a public slug; every other query wants the numeric id.
    pub async fn resolve_api_id(&self, external_id: &str) -> Result<i64> {
        let body = self
            .client
            .graphql(
                &self.graphql_url(external_id),
                RETAILER_QUERY,
                json!({ "hippo_id": external_id }),
            )
            .await?;

        let id = StrictMap::new(&body)
            .at("data.cRetailerWithSetting.data.retailer.id")?
            .as_i64()?;
        Ok(id)
    }

    pub async fn get_available_days(
        &self,
        api_id: i64,
        today: NaiveDate,
    ) -> Result<(Option<NaiveDate>, Vec<NaiveDate>)> {
        let variables = json!({
            "api_id": api_id,
            "startDate": today.format("%Y-%m-%d").to_string(),
            "endDate": add_months(today, self.lookahead_months).format("%Y-%m-%d").to_string(),
            "serviceId": self.endpoints.service_id,
        });
        let body = self
            .client
            .graphql(
                &self.graphql_url(&api_id.to_string()),
                BOOKABLE_DAYS_QUERY,
                variables,
            )
            .await?;
        parse_bookable_days(&body)
    }

    pub async fn get_times(&self, api_id: i64, day: NaiveDate) -> Result<Vec<DateTime<Utc>>> {
        let next_day = day.checked_add_days(Days::new(1)).unwrap_or(day);
        let variables = json!({
            "api_id": api_id,
            "day_of_week": day.weekday().num_days_from_sunday(),
            "startDate": day.and_time(at(6, 0, 0)).format(WINDOW_FORMAT).to_string(),
            "endDate": next_day.and_time(at(5, 59, 59)).format(WINDOW_FORMAT).to_string(),
            "serviceId": self.endpoints.service_id,
        });
        let body = self
            .client
            .graphql(
                &self.graphql_url(&api_id.to_string()),
                DAY_SLOTS_QUERY,
                variables,
            )
            .await?;
        parse_day_slots(&body, day, self.slot_minutes)
    }

    fn graphql_url(&self, id: &str) -> String {
        format!(
            "{}/{}/graphql",
            self.endpoints.graphql_base.trim_end_matches('/'),
            id
        )
    }
}

/// Entries offering COVID-19 vaccinations, in directory order.
pub fn parse_directory(directory: &Value) -> Result<Vec<Location>> {
    let mut locations = Vec::new();
    for entry in StrictMap::new(directory).items()? {
        if !entry.get("isCoVid")?.as_bool()? {
            continue;
        }
        locations.push(Location {
            name: entry.get("name")?.as_str()?.to_string(),
            address: entry.get("address")?.as_str()?.to_string(),
            external_id: entry.get("teleHippoId")?.as_id()?,
            city: entry.get("city")?.as_str()?.to_string(),
        });
    }
    Ok(locations)
}

pub fn in_city(locations: Vec<Location>, city: &str) -> Vec<Location> {
    locations.into_iter().filter(|l| l.city == city).collect()
}

/// First `max` days get a slot lookup, the rest are reported as skipped.
pub fn split_days(mut days: Vec<NaiveDate>, max: usize) -> (Vec<NaiveDate>, Vec<NaiveDate>) {
    let skipped = days.split_off(max.min(days.len()));
    (days, skipped)
}

fn parse_bookable_days(body: &Value) -> Result<(Option<NaiveDate>, Vec<NaiveDate>)> {
    let search = StrictMap::new(body).at("data.searchBookableWorkTimes")?;

    let next = search.get("nextAvailableDate")?;
    let next = if next.is_null() {
        None
    } else {
        Some(parse_calendar_date(next.as_str()?)?)
    };

    let days = search
        .get("bookableDays")?
        .items()?
        .iter()
        .map(|day| -> Result<NaiveDate> { parse_calendar_date(day.as_str()?) })
        .collect::<Result<Vec<_>>>()?;

    Ok((next, days))
}

fn parse_day_slots(body: &Value, day: NaiveDate, slot_minutes: i64) -> Result<Vec<DateTime<Utc>>> {
    let search = StrictMap::new(body).at("data.searchBookableWorkTimes")?;

    let work_times = search.get("workTimes")?.items()?;
    let hours = work_times
        .first()
        .ok_or_else(|| ScrapeError::MissingField("data.searchBookableWorkTimes.workTimes[0]".into()))?;
    let open = parse_time_of_day(hours.get("startTimes")?.as_str()?)?;
    let close = parse_time_of_day(hours.get("endTimes")?.as_str()?)?;

    let mut booked = Vec::new();
    for event in search.get("events")?.items()? {
        let start = parse_js_date(event.get("startTime")?.as_str()?)?;
        if !is_on_grid(&start, slot_minutes) {
            // Only exact grid matches are subtracted, so this slot stays listed as free.
            warn!("booked event at {} is not on the {}-minute grid", start, slot_minutes);
        }
        booked.push(start);
    }

    Ok(free_slots(generate_slots(day, open, close, slot_minutes), &booked))
}

fn add_months(date: NaiveDate, months: u32) -> NaiveDate {
    date.checked_add_months(Months::new(months)).unwrap_or(NaiveDate::MAX)
}

fn at(hour: u32, minute: u32, second: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, second).unwrap_or(NaiveTime::MIN)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use wiremock::matchers::{body_string_contains, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn directory() -> Value {
        json!([
            {"name": "Edmonton North", "address": "1 North St", "teleHippoId": "costco-edm-north", "city": "Edmonton", "isCoVid": true},
            {"name": "Edmonton South", "address": "2 South St", "teleHippoId": "costco-edm-south", "city": "Edmonton", "isCoVid": false},
            {"name": "Calgary", "address": "3 Bow Rd", "teleHippoId": "costco-cgy", "city": "Calgary", "isCoVid": true},
            {"name": "Edmonton West", "address": "4 West Ave", "teleHippoId": 77, "city": "Edmonton", "isCoVid": true}
        ])
    }

    fn scraper(server: &MockServer) -> CostcoScraper {
        let mut config = Config::default();
        config.costco.directory_url = format!("{}/assets/json/app.clinics.json", server.uri());
        config.costco.graphql_base = format!("{}/api/c", server.uri());
        CostcoScraper::new(HttpClient::new(), &config)
    }

    #[test]
    fn directory_filter_keeps_covid_sites_in_city_in_order() {
        let locations = in_city(parse_directory(&directory()).unwrap(), "Edmonton");

        let names: Vec<_> = locations.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["Edmonton North", "Edmonton West"]);
        assert_eq!(locations[1].external_id, "77");
    }

    #[test]
    fn directory_entry_without_flag_is_a_shape_error() {
        let broken = json!([{"name": "x", "address": "y", "teleHippoId": "z", "city": "Edmonton"}]);

        assert!(matches!(
            parse_directory(&broken),
            Err(ScrapeError::MissingField(p)) if p == "[0].isCoVid"
        ));
    }

    #[test]
    fn only_first_five_days_are_checked() {
        let days: Vec<_> = (1..=8).map(|d| date(2021, 4, d)).collect();

        let (checked, skipped) = split_days(days.clone(), 5);

        assert_eq!(checked, days[..5].to_vec());
        assert_eq!(skipped, days[5..].to_vec());
    }

    #[test]
    fn fewer_days_than_cap_are_all_checked() {
        let days = vec![date(2021, 4, 1), date(2021, 4, 2)];

        let (checked, skipped) = split_days(days.clone(), 5);

        assert_eq!(checked, days);
        assert!(skipped.is_empty());
    }

    #[test]
    fn booked_events_are_removed_from_open_hours() {
        let body = json!({"data": {"searchBookableWorkTimes": {
            "workTimes": [{"startTimes": "2021-04-16T15:00:00.000Z", "endTimes": "2021-04-16T15:30:00.000Z",
                           "startDate": "2021-04-16", "endDate": "2021-04-16"}],
            "events": [
                {"id": 1, "startTime": "Fri Apr 16 2021 15:05:00 GMT+0000 (UTC)", "endTime": "Fri Apr 16 2021 15:10:00 GMT+0000 (UTC)"},
                {"id": 2, "startTime": "Fri Apr 16 2021 15:20:00 GMT+0000 (UTC)", "endTime": "Fri Apr 16 2021 15:25:00 GMT+0000 (UTC)"}
            ]
        }}});

        let slots = parse_day_slots(&body, date(2021, 4, 16), 5).unwrap();

        let minutes: Vec<_> = slots.iter().map(|s| s.format("%H:%M").to_string()).collect();
        assert_eq!(minutes, vec!["15:00", "15:10", "15:15", "15:25"]);
    }

    #[test]
    fn null_next_available_date_means_nothing_bookable() {
        let body = json!({"data": {"searchBookableWorkTimes": {"bookableDays": [], "nextAvailableDate": null}}});

        assert_eq!(parse_bookable_days(&body).unwrap(), (None, vec![]));
    }

    #[tokio::test]
    async fn finds_free_slots_for_edmonton_location() {
        let server = MockServer::start().await;
        let today = date(2021, 4, 16);
        let first = date(2021, 4, 19);
        let second = date(2021, 4, 26);

        Mock::given(method("GET"))
            .and(path("/assets/json/app.clinics.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "Edmonton North", "address": "1 North St", "teleHippoId": "costco-edm", "city": "Edmonton", "isCoVid": true}
            ])))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/c/costco-edm/graphql"))
            .and(body_string_contains("cRetailerWithSetting"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"cRetailerWithSetting": {"data": {"retailer": {"id": 42}}}}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("nextAvailableDate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "nextAvailableDate": "2021-04-19",
                    "bookableDays": ["2021-04-19", "2021-04-26"]
                }}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("startTimes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "workTimes": [{"startTimes": "09:00", "endTimes": "10:00", "startDate": "", "endDate": ""}],
                    "events": []
                }}
            })))
            .mount(&server)
            .await;

        let results = scraper(&server).run(today, |_| {}).await.unwrap();

        assert_eq!(results.len(), 1);
        let edmonton = &results[0];
        assert_eq!(edmonton.next_available_date, Some(first));
        assert_eq!(edmonton.bookable_days, vec![first, second]);
        assert!(edmonton.skipped_days.is_empty());
        assert!(!edmonton.beyond_horizon);

        let day = &edmonton.checked_days[0];
        assert_eq!(day.date, first);
        assert_eq!(day.slots.len(), 12);
        assert_eq!(day.slots[0], first.and_time(at(9, 0, 0)).and_utc());
        assert_eq!(day.slots[11], first.and_time(at(9, 55, 0)).and_utc());
    }

    async fn mount_open_hours(server: &MockServer, api_id: &str) {
        Mock::given(method("POST"))
            .and(path(format!("/api/c/{api_id}/graphql")))
            .and(body_string_contains("startTimes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "workTimes": [{"startTimes": "09:00", "endTimes": "10:00", "startDate": "", "endDate": ""}],
                    "events": []
                }}
            })))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn locations_done_before_a_failure_are_still_reported() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/assets/json/app.clinics.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"name": "North", "address": "1 North St", "teleHippoId": "a", "city": "Edmonton", "isCoVid": true},
                {"name": "South", "address": "2 South St", "teleHippoId": "b", "city": "Edmonton", "isCoVid": true}
            ])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/a/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"cRetailerWithSetting": {"data": {"retailer": {"id": 1}}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/b/graphql"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/1/graphql"))
            .and(body_string_contains("nextAvailableDate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "nextAvailableDate": "2021-04-19",
                    "bookableDays": ["2021-04-19"]
                }}
            })))
            .mount(&server)
            .await;
        mount_open_hours(&server, "1").await;

        let mut seen = Vec::new();
        let result = scraper(&server)
            .run(date(2021, 4, 16), |location| seen.push(location.clone()))
            .await;

        assert!(matches!(
            result,
            Err(ScrapeError::Status { status, .. }) if status.as_u16() == 500
        ));
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].location.name, "North");
        assert_eq!(seen[0].checked_days[0].slots.len(), 12);
    }

    #[tokio::test]
    async fn slot_lookups_stop_after_five_days() {
        let server = MockServer::start().await;
        let days: Vec<String> = (19..=26).map(|d| format!("2021-04-{d}")).collect();

        Mock::given(method("POST"))
            .and(path("/api/c/slug/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"cRetailerWithSetting": {"data": {"retailer": {"id": 42}}}}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("nextAvailableDate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "nextAvailableDate": "2021-04-19",
                    "bookableDays": days
                }}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("startTimes"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "workTimes": [{"startTimes": "09:00", "endTimes": "10:00", "startDate": "", "endDate": ""}],
                    "events": []
                }}
            })))
            .expect(5)
            .mount(&server)
            .await;

        let location = Location {
            name: "Edmonton North".into(),
            address: "1 North St".into(),
            external_id: "slug".into(),
            city: "Edmonton".into(),
        };
        let result = scraper(&server)
            .check_location(location, date(2021, 4, 16))
            .await
            .unwrap();

        let checked: Vec<_> = result.checked_days.iter().map(|d| d.date).collect();
        assert_eq!(checked, (19..=23).map(|d| date(2021, 4, d)).collect::<Vec<_>>());
        assert_eq!(
            result.skipped_days,
            (24..=26).map(|d| date(2021, 4, d)).collect::<Vec<_>>()
        );
    }

    #[tokio::test]
    async fn next_date_beyond_a_month_skips_slot_lookup() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("nextAvailableDate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"searchBookableWorkTimes": {
                    "nextAvailableDate": "2021-06-01",
                    "bookableDays": ["2021-06-01"]
                }}
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/42/graphql"))
            .and(body_string_contains("startTimes"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/c/slug/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"cRetailerWithSetting": {"data": {"retailer": {"id": 42}}}}
            })))
            .mount(&server)
            .await;

        let location = Location {
            name: "Edmonton North".into(),
            address: "1 North St".into(),
            external_id: "slug".into(),
            city: "Edmonton".into(),
        };
        let result = scraper(&server)
            .check_location(location, date(2021, 4, 16))
            .await
            .unwrap();

        assert!(result.beyond_horizon);
        assert!(result.checked_days.is_empty());
        assert_eq!(result.next_available_date, Some(date(2021, 6, 1)));
    }

    #[tokio::test]
    async fn error_status_aborts_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/json/app.clinics.json"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let result = scraper(&server).run(date(2021, 4, 16), |_| {}).await;

        assert!(matches!(
            result,
            Err(ScrapeError::Status { status, .. }) if status.as_u16() == 503
        ));
    }
}
