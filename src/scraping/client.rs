use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use crate::error::{Result, ScrapeError};

/// Thin wrapper around `reqwest` that turns every non-2xx into an error.
#[derive(Debug, Clone, Default)]
pub struct HttpClient {
    inner: Client,
}

impl HttpClient {
    pub fn new() -> Self {
        HttpClient {
            inner: Client::new(),
        }
    }

    pub async fn get_text(&self, url: &str) -> Result<String> {
        debug!("GET {}", url);
        let response = self.inner.get(url).send().await?;
        Ok(check(response)?.text().await?)
    }

    pub async fn get_json(&self, url: &str) -> Result<Value> {
        debug!("GET {}", url);
        let response = self.inner.get(url).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn post_form<T: Serialize + ?Sized>(&self, url: &str, form: &T) -> Result<String> {
        debug!("POST form {}", url);
        let response = self.inner.post(url).form(form).send().await?;
        Ok(check(response)?.text().await?)
    }

    pub async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> Result<Value> {
        debug!("POST {}", url);
        let response = self.inner.post(url).json(body).send().await?;
        Ok(check(response)?.json().await?)
    }

    pub async fn graphql(&self, url: &str, query: &str, variables: Value) -> Result<Value> {
        self.post_json(url, &json!({ "query": query, "variables": variables }))
            .await
    }
}

fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ScrapeError::Status {
            url: response.url().to_string(),
            status,
        })
    }
}
