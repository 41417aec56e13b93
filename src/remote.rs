// HTTP implementation of the catalog and solve sources.
//
// Only decodes the declared wire shapes; everything else about the upstream
// API (pagination, auth renewal, endpoint zoo) stays behind this module.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::TrackerError;
use crate::source::{parse_solve_date, CatalogSource, RawChallenge, RawSolve, SolveSource};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// One solve as it appears on the wire, timestamp still unparsed.
#[derive(Debug, Deserialize)]
struct WireSolve {
    challenge_id: i64,
    solved_at: String,
    #[serde(default)]
    title: String,
}

/// Remote wargame platform client. Implements both source contracts.
pub struct RemotePlatform {
    base_url: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl RemotePlatform {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent("solvetrack-backend/0.1")
            .build()
            .unwrap_or_default();

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T, TrackerError> {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(key) = &self.api_key {
            request = request.header("Cookie", format!("api_key={key}"));
        }
        let response = request.send().await?.error_for_status()?;
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl CatalogSource for RemotePlatform {
    async fn fetch_catalog(&self) -> Result<Vec<RawChallenge>, TrackerError> {
        self.get_json("/challenges").await
    }
}

#[async_trait]
impl SolveSource for RemotePlatform {
    async fn fetch_solves(&self, user_id: i64) -> Result<Vec<RawSolve>, TrackerError> {
        let wire: Vec<WireSolve> = self.get_json(&format!("/users/{user_id}/solves")).await?;
        wire.into_iter()
            .map(|s| {
                Ok(RawSolve {
                    challenge_id: s.challenge_id,
                    solved_at: parse_solve_date(&s.solved_at)?,
                    title: s.title,
                })
            })
            .collect()
    }
}
