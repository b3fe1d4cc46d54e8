// src/store/postgrest.rs

use async_trait::async_trait;
use log::debug;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use super::{DistanceStore, StoreError};
use crate::config::PipelineConfig;
use crate::models::{CityRow, DistancePairRow, DistanceRecord};

const CITIES_TABLE: &str = "rest/v1/cities";
const DISTANCES_TABLE: &str = "rest/v1/city_distances";

/// PostgREST endpoint of a hosted database (Supabase style auth headers).
pub struct PostgrestStore {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl PostgrestStore {
    pub fn new(config: &PipelineConfig) -> Self {
        Self::with_client(Client::new(), config.store_url.clone(), &config.store_key)
    }

    pub fn with_client(client: Client, base_url: Url, api_key: &str) -> Self {
        Self {
            client,
            base_url,
            api_key: api_key.to_string(),
        }
    }

    pub(crate) fn cities_url(&self) -> Result<Url, StoreError> {
        let mut url = self.base_url.join(CITIES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "id,city_name,lat,lon")
            .append_pair("lat", "not.is.null")
            .append_pair("lon", "not.is.null");
        Ok(url)
    }

    pub(crate) fn existing_pairs_url(&self, limit: usize) -> Result<Url, StoreError> {
        let mut url = self.base_url.join(DISTANCES_TABLE)?;
        url.query_pairs_mut()
            .append_pair("select", "city_a_id,city_b_id")
            .append_pair("limit", &limit.to_string());
        Ok(url)
    }

    pub(crate) fn insert_url(&self) -> Result<Url, StoreError> {
        Ok(self.base_url.join(DISTANCES_TABLE)?)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, StoreError> {
        debug!("GET {}", url.path());
        let response = self
            .authorized(self.client.get(url))
            .header("Accept", "application/json")
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Maps a non-success response to the matching `StoreError`.
async fn ensure_success(response: Response) -> Result<Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    if status == StatusCode::CONFLICT {
        return Err(StoreError::Conflict { message });
    }
    Err(StoreError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl DistanceStore for PostgrestStore {
    async fn fetch_cities(&self) -> Result<Vec<CityRow>, StoreError> {
        self.get_json(self.cities_url()?).await
    }

    async fn fetch_existing_pairs(&self, limit: usize) -> Result<Vec<DistancePairRow>, StoreError> {
        self.get_json(self.existing_pairs_url(limit)?).await
    }

    async fn insert_distances(&self, records: &[DistanceRecord]) -> Result<usize, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        let url = self.insert_url()?;
        debug!("POST {} ({} rows)", url.path(), records.len());

        let response = self
            .authorized(self.client.post(url))
            .header("Prefer", "return=representation")
            .json(records)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        Ok(created_count(&body))
    }
}

/// Number of rows echoed back by `return=representation`. Anything that is
/// not a JSON array counts as zero.
fn created_count(body: &str) -> usize {
    match serde_json::from_str::<Value>(body) {
        Ok(Value::Array(rows)) => rows.len(),
        _ => 0,
    }
}
