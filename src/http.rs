use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::domain::PageUrl;
use crate::error::SyncError;
use crate::transfer::{ContentSource, FetchedObject};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub trait PageSource {
    fn fetch_page(&self, url: &PageUrl) -> Result<String, SyncError>;
}

pub fn default_user_agent() -> String {
    format!("bank-sync/{}", env!("CARGO_PKG_VERSION"))
}

#[derive(Clone)]
pub struct HttpSource {
    client: Client,
}

impl HttpSource {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self, SyncError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|err| SyncError::Runtime(err.to_string()))?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| SyncError::Runtime(err.to_string()))?;
        Ok(Self { client })
    }

    fn status_message(response: Response) -> (u16, String) {
        let status = response.status().as_u16();
        let message = response
            .text()
            .ok()
            .filter(|body| !body.trim().is_empty())
            .unwrap_or_else(|| "request failed".to_string());
        (status, truncate(message))
    }
}

impl PageSource for HttpSource {
    fn fetch_page(&self, url: &PageUrl) -> Result<String, SyncError> {
        let response = self
            .client
            .get(url.as_url().clone())
            .send()
            .map_err(|err| SyncError::PageHttp(err.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = Self::status_message(response);
            return Err(SyncError::PageStatus { status, message });
        }
        let text = response
            .text()
            .map_err(|err| SyncError::PageHttp(err.to_string()))?;
        debug!(url = %url, bytes = text.len(), "listing page fetched");
        Ok(text)
    }
}

impl ContentSource for HttpSource {
    fn fetch(&self, url: &str) -> Result<FetchedObject, SyncError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|err| SyncError::Network(err.to_string()))?;
        if !response.status().is_success() {
            let (status, message) = Self::status_message(response);
            return Err(SyncError::HttpStatus { status, message });
        }
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(|value| value.to_string());
        let content_length = response.content_length();
        Ok(FetchedObject {
            body: Box::new(response),
            content_type,
            content_length,
        })
    }
}

// Error pages can be large HTML documents; keep failure details readable.
fn truncate(mut message: String) -> String {
    const MAX_CHARS: usize = 200;
    if let Some((index, _)) = message.char_indices().nth(MAX_CHARS) {
        message.truncate(index);
        message.push_str("...");
    }
    message
}
