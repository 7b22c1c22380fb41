//! Commerce7 REST API client using tenant + basic auth headers

use std::sync::Arc;

use chrono::NaiveDate;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error};

use super::types::{ClubPage, OrderPage};
use crate::config::Config;
use crate::util::rate_limit::{create_limiter, Limiter};
use crate::util::time::format_date;

/// Cursor value that requests the first page
pub const FIRST_CURSOR: &str = "start";

/// Commerce7 client for pulling orders and club memberships
#[derive(Clone)]
pub struct Commerce7Client {
    client: Client,
    base_url: String,
    tenant: Option<String>,
    auth_token: Option<String>,
    limiter: Arc<Limiter>,
}

impl Commerce7Client {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            base_url: config.c7_api_url.clone(),
            tenant: config.c7_tenant.clone(),
            auth_token: config.c7_auth_token.clone(),
            limiter: create_limiter(config.c7_requests_per_second),
        }
    }

    /// Whether both tenant and token are configured
    pub fn has_credentials(&self) -> bool {
        self.tenant.is_some() && self.auth_token.is_some()
    }

    /// Make an authenticated GET request against `{base}/{path_and_query}`
    async fn get<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, Commerce7Error> {
        let (Some(tenant), Some(token)) = (&self.tenant, &self.auth_token) else {
            return Err(Commerce7Error::MissingCredentials);
        };

        self.limiter.until_ready().await;

        let url = format!("{}/{}", self.base_url, path_and_query);
        debug!(url = %url, "Commerce7 request");

        let response = self
            .client
            .get(&url)
            .header("tenant", tenant)
            .header("Authorization", format!("Basic {}", token))
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(Commerce7Error::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if status == StatusCode::UNAUTHORIZED {
                error!("Authentication failed - check C7_TENANT and C7_AUTH_TOKEN");
            }
            return Err(Commerce7Error::Api { status: status.as_u16(), body });
        }

        response.json().await.map_err(Commerce7Error::Parse)
    }

    /// One page of point-of-sale orders paid within `[start, end]`
    pub async fn order_page(
        &self,
        cursor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<OrderPage, Commerce7Error> {
        let query = format!(
            "order?cursor={}&channel=POS&orderPaidDate=btw:{}|{}",
            cursor,
            format_date(start),
            format_date(end)
        );
        self.get(&query).await
    }

    /// One page of club memberships signed up within `[start, end]`
    pub async fn club_page(
        &self,
        cursor: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<ClubPage, Commerce7Error> {
        let query = format!(
            "club-membership?cursor={}&signupDate=btw:{}|{}",
            cursor,
            format_date(start),
            format_date(end)
        );
        self.get(&query).await
    }
}

/// Commerce7 errors
#[derive(Debug, thiserror::Error)]
pub enum Commerce7Error {
    #[error("Missing Commerce7 credentials (C7_TENANT / C7_AUTH_TOKEN)")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    Request(reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),
}
