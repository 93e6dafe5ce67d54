//! Mock backend client
//!
//! The mock server stands in for the real data backend; it serves whatever
//! readings were last posted to it.

use async_trait::async_trait;
use tracing::debug;

use crate::error::E2eResult;
use watchshot_common::SensorPoint;

/// Path the mock server accepts readings on
pub const SET_DATA_PATH: &str = "/set-sgv";

/// Destination for seeded sensor data
#[async_trait]
pub trait DataSink: Send + Sync {
    async fn set_data(&self, points: &[SensorPoint]) -> E2eResult<()>;
}

/// HTTP client of the mock server
pub struct MockServerClient {
    base_url: String,
    client: reqwest::Client,
}

impl MockServerClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl DataSink for MockServerClient {
    async fn set_data(&self, points: &[SensorPoint]) -> E2eResult<()> {
        let url = format!("{}{}", self.base_url, SET_DATA_PATH);
        debug!("Seeding {} point(s) to {}", points.len(), url);

        // The response is not inspected; only transport errors matter.
        self.client
            .post(&url)
            .body(serde_json::to_string(points)?)
            .send()
            .await?;
        Ok(())
    }
}
