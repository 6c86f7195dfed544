use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{Html, Selector};
use tracing::info;
use url::Url;

use crate::config::{Config, LondonDrugsEndpoints};
use crate::error::{Result, ScrapeError};
use crate::models::slots::parse_calendar_timestamp;
use crate::scraping::client::HttpClient;
use crate::scraping::constants::*;

static POSTBACK_TARGET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"__doPostBack\('([^']+)").expect("postback pattern"));
static SESSION_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"App=([^&]+)").expect("session pattern"));

/**
London Drugs books through an ASP.NET site that only hands out a session after
you "click" the service category, which is a javascript postback rather than a
plain link. We replay that form post and then read the session's calendar.

Each parse step below is a pure function of the page text.
*/
pub struct LondonDrugsScraper {
    client: HttpClient,
    endpoints: LondonDrugsEndpoints,
}

impl LondonDrugsScraper {
    pub fn new(client: HttpClient, config: &Config) -> Self {
        LondonDrugsScraper {
            client,
            endpoints: config.london_drugs.clone(),
        }
    }

    /// Open slots in page order. An empty list just means no openings.
    pub async fn run(&self) -> Result<Vec<DateTime<Utc>>> {
        let session = self.get_session_id().await?;
        info!("got London Drugs session {}", session);

        let calendar = self.client.get_text(self.calendar_url(&session)?.as_str()).await?;
        parse_timeslots(&calendar)
    }

    pub async fn get_session_id(&self) -> Result<String> {
        let landing_url = self.page_url(LANDING_PAGE)?;
        let landing = self.client.get_text(landing_url.as_str()).await?;

        let mut form = hidden_fields(&landing)?;
        let target = postback_target(&landing, &self.endpoints.service_category)?;
        set_field(&mut form, EVENT_TARGET_FIELD, target);

        let response = self.client.post_form(landing_url.as_str(), &form).await?;
        session_id(&response)
    }

    fn page_url(&self, page: &str) -> Result<Url> {
        Ok(Url::parse(&self.endpoints.base_url)?.join(page)?)
    }

    fn calendar_url(&self, session: &str) -> Result<Url> {
        let mut url = self.page_url(CALENDAR_PAGE)?;
        // Already url-safe as it was cut out of the form action.
        url.set_query(Some(&format!("App={session}")));
        Ok(url)
    }
}

/// Name/value pairs of every hidden input, in page order.
pub fn hidden_fields(html: &str) -> Result<Vec<(String, String)>> {
    let document = Html::parse_document(html);
    let inputs = selector(HIDDEN_INPUT_SELECTOR)?;

    Ok(document
        .select(&inputs)
        .filter_map(|input| {
            let name = input.value().attr("name")?;
            let value = input.value().attr("value").unwrap_or_default();
            Some((name.to_string(), value.to_string()))
        })
        .collect())
}

/// Control id embedded in the `javascript:__doPostBack('...')` of the category link.
pub fn postback_target(html: &str, link_text: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let links = selector(SERVICE_CATEGORY_LINK_SELECTOR)?;

    let link = document
        .select(&links)
        .find(|a| a.text().collect::<String>() == link_text)
        .ok_or_else(|| ScrapeError::Pattern(format!("a `{link_text}` service link")))?;
    let href = link
        .value()
        .attr("href")
        .ok_or_else(|| ScrapeError::Pattern(format!("an href on the `{link_text}` link")))?;

    capture(&POSTBACK_TARGET, href, "a __doPostBack target")
}

/// Session id from the `App=` parameter of the main form's action.
pub fn session_id(html: &str) -> Result<String> {
    let document = Html::parse_document(html);
    let form = selector(ASPNET_FORM_SELECTOR)?;

    let action = document
        .select(&form)
        .next()
        .and_then(|f| f.value().attr("action"))
        .ok_or_else(|| ScrapeError::Pattern("the #aspnetForm action".to_string()))?;

    capture(&SESSION_ID, action, "an App= session id")
}

pub fn parse_timeslots(html: &str) -> Result<Vec<DateTime<Utc>>> {
    let document = Html::parse_document(html);
    let slots = selector(TIMESLOT_SELECTOR)?;

    let times = document
        .select(&slots)
        .map(|slot| {
            let stamp = slot
                .value()
                .attr(TIMESLOT_ATTR)
                .ok_or_else(|| ScrapeError::Pattern(format!("a {TIMESLOT_ATTR} attribute")))?;
            parse_calendar_timestamp(stamp)
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(times)
}

fn set_field(form: &mut Vec<(String, String)>, name: &str, value: String) {
    match form.iter_mut().find(|(n, _)| n == name) {
        Some(field) => field.1 = value,
        None => form.push((name.to_string(), value)),
    }
}

fn capture(pattern: &Regex, haystack: &str, what: &str) -> Result<String> {
    pattern
        .captures(haystack)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .ok_or_else(|| ScrapeError::Pattern(what.to_string()))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| ScrapeError::Pattern(format!("valid selector `{css}`: {e:?}")))
}
