//! HTTP client for the findings API
//!
//! Maps transport failures and HTTP statuses onto classified
//! [`FetchError`]s:
//!
//! | Condition | Error |
//! |---|---|
//! | 429 | `Throttled` |
//! | 401, 403 | `Unauthorized` |
//! | other 4xx | `Client` |
//! | 5xx | `Server` |
//! | request timeout | `Timeout` |
//! | connect/transport failure | `Connection` |
//! | undecodable body | `InvalidResponse` |

use crate::adapters::fetch::traits::{FindingsPage, FindingsSource};
use crate::adapters::securityhub::models::{FindingFilter, GetFindingsRequest, GetFindingsResponse};
use crate::config::{SecretString, SourceConfig};
use crate::domain::{Cursor, ExportError, FetchError, Result};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, ClientBuilder, StatusCode};
use secrecy::ExposeSecret;
use std::time::Duration;

/// Findings API client
pub struct SecurityHubClient {
    client: Client,
    findings_url: String,
    region: String,
    api_token: Option<SecretString>,
    filter: FindingFilter,
}

impl SecurityHubClient {
    /// Creates a client from the `[source]` section
    ///
    /// The finding filter is computed once, at construction.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the HTTP client cannot be built.
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = ClientBuilder::new()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| ExportError::Configuration(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            findings_url: format!("{}/findings", config.endpoint.trim_end_matches('/')),
            region: config.region.clone(),
            api_token: config.api_token.clone(),
            filter: FindingFilter::from_config(config, Utc::now()),
        })
    }

    /// Replaces the finding filter
    pub fn with_filter(mut self, filter: FindingFilter) -> Self {
        self.filter = filter;
        self
    }

    /// Filter sent with every request
    pub fn filter(&self) -> &FindingFilter {
        &self.filter
    }

    /// Verifies the API answers with a single one-item page
    ///
    /// # Errors
    ///
    /// Returns the classified error of the probe request.
    pub async fn test_connection(&self) -> std::result::Result<(), FetchError> {
        self.get_findings(None, 1).await.map(|_| ())
    }
}

/// Maps a non-success status to a classified error
pub fn classify_status(status: StatusCode, body: String) -> FetchError {
    match status {
        StatusCode::TOO_MANY_REQUESTS => FetchError::Throttled(body),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            FetchError::Unauthorized(format!("{status}: {body}"))
        }
        s if s.is_server_error() => FetchError::Server {
            status: s.as_u16(),
            message: body,
        },
        s => FetchError::Client {
            status: s.as_u16(),
            message: body,
        },
    }
}

fn classify_transport(err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(err.to_string())
    } else {
        FetchError::Connection(err.to_string())
    }
}

#[async_trait]
impl FindingsSource for SecurityHubClient {
    async fn get_findings(
        &self,
        cursor: Option<&Cursor>,
        max_results: u32,
    ) -> std::result::Result<FindingsPage, FetchError> {
        let body = GetFindingsRequest {
            filters: &self.filter,
            next_token: cursor.map(Cursor::as_str),
            max_results,
        };

        let mut request = self.client.post(&self.findings_url).json(&body);
        if let Some(token) = &self.api_token {
            let token: &str = token.expose_secret().as_ref();
            request = request.bearer_auth(token);
        }

        tracing::debug!(
            url = %self.findings_url,
            region = %self.region,
            has_cursor = cursor.is_some(),
            max_results,
            "Requesting findings page"
        );

        let response = request.send().await.map_err(classify_transport)?;
        let status = response.status();
        let text = response.text().await.map_err(classify_transport)?;

        if !status.is_success() {
            return Err(classify_status(status, text));
        }

        let parsed: GetFindingsResponse = serde_json::from_str(&text)
            .map_err(|e| FetchError::InvalidResponse(format!("Failed to decode findings page: {e}")))?;

        Ok(FindingsPage {
            findings: parsed.findings,
            next_token: Cursor::from_token(parsed.next_token),
        })
    }
}
