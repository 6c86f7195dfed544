use std::fmt;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use tracing::{error, info};

use crate::config::Config;
use crate::error::ScrapeError;
use crate::handlers::report::{
    NO_SAFEWAY_SITES, SAFEWAY_HEADER, costco_lines, london_drugs_lines, print_lines, safeway_lines,
};
use crate::scraping::client::HttpClient;
use crate::scraping::costco::CostcoScraper;
use crate::scraping::london_drugs::LondonDrugsScraper;
use crate::scraping::safeway::SafewayScraper;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    LondonDrugs,
    Costco,
    Safeway,
}

impl Provider {
    /// Order the providers are polled in.
    pub const ALL: [Provider; 3] = [Provider::LondonDrugs, Provider::Costco, Provider::Safeway];
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::LondonDrugs => "London Drugs",
            Provider::Costco => "Costco",
            Provider::Safeway => "Safeway",
        };
        f.write_str(name)
    }
}

/// Polls each provider in turn and prints what it found. Costco and Safeway
/// print each location as it completes.
///
/// With `isolate_providers` a failing provider is logged and the rest still
/// run; the overall result is an error if any of them failed.
pub async fn poll_all(config: &Config, today: NaiveDate) -> Result<()> {
    let client = HttpClient::new();
    let mut failed = Vec::new();

    for provider in Provider::ALL {
        info!("polling {}", provider);
        match poll(provider, &client, config, today).await {
            Ok(()) => {}
            Err(e) if config.isolate_providers => {
                error!("{} failed: {}", provider, e);
                failed.push(provider);
            }
            Err(e) => return Err(anyhow::Error::new(e).context(format!("{provider} failed"))),
        }
    }

    if !failed.is_empty() {
        let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
        bail!("providers failed: {}", names.join(", "));
    }
    Ok(())
}

async fn poll(
    provider: Provider,
    client: &HttpClient,
    config: &Config,
    today: NaiveDate,
) -> Result<(), ScrapeError> {
    let tz = config.timezone;
    match provider {
        Provider::LondonDrugs => {
            let slots = LondonDrugsScraper::new(client.clone(), config).run().await?;
            print_lines(&london_drugs_lines(&slots, tz));
        }
        Provider::Costco => {
            CostcoScraper::new(client.clone(), config)
                .run(today, |location| print_lines(&costco_lines(location, tz)))
                .await?;
        }
        Provider::Safeway => {
            println!("{SAFEWAY_HEADER}");
            let sites = SafewayScraper::new(client.clone(), config)
                .run(today, |site| print_lines(&safeway_lines(site, tz)))
                .await?;
            if sites.is_empty() {
                println!("{NO_SAFEWAY_SITES}");
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer, isolate: bool) -> Config {
        let mut config = Config::default();
        config.isolate_providers = isolate;
        config.london_drugs.base_url = format!("{}/057/Public/Appointments/", server.uri());
        config.costco.directory_url = format!("{}/assets/json/app.clinics.json", server.uri());
        config.costco.graphql_base = format!("{}/api/c", server.uri());
        config.safeway.api_base = format!("{}/public", server.uri());
        config
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2021, 4, 16).unwrap()
    }

    #[tokio::test]
    async fn isolated_failure_still_polls_later_providers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/json/app.clinics.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/public/eligibility"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"vaccineData": "t"})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/public/locations/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"locations": []})))
            .mount(&server)
            .await;

        let result = poll_all(&config(&server, true), today()).await;

        let message = result.unwrap_err().to_string();
        assert_eq!(message, "providers failed: London Drugs");
    }

    #[tokio::test]
    async fn without_isolation_first_failure_stops_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/json/app.clinics.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(0)
            .mount(&server)
            .await;

        let result = poll_all(&config(&server, false), today()).await;

        assert!(result.unwrap_err().to_string().contains("London Drugs failed"));
    }
}
