//! Public FIPE-by-plate JSON provider.
//!
//! Plain GET against `{base}/placa/{plate}`. The endpoint sits behind bot
//! filtering, so requests carry a browser-like user-agent. A body without a
//! `valor` field is a miss, not an error.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{classify_status, json_field, transport_error, Provider, ProviderOutcome};
use crate::models::plate::Plate;
use crate::models::vehicle::RecordDraft;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct PlacaFipeProvider {
    http: Client,
    base_url: String,
}

impl PlacaFipeProvider {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(super::BROWSER_USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_response(body: &str, plate: &str) -> ProviderOutcome {
        let data: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return ProviderOutcome::Fatal(format!("unparseable response body: {e}")),
        };

        let mut draft = RecordDraft::new();
        draft.fipe_value = json_field(&data, "valor");
        if !draft.has_price() {
            return ProviderOutcome::NotFound;
        }

        draft.make = json_field(&data, "marca");
        draft.model = json_field(&data, "modelo");
        draft.model_year = json_field(&data, "ano_modelo");
        draft.fuel_type = json_field(&data, "combustivel");
        draft.fipe_code = json_field(&data, "fipe_codigo");
        draft.reference_month = json_field(&data, "referencia");

        ProviderOutcome::Found(draft.finish(plate))
    }
}

#[async_trait]
impl Provider for PlacaFipeProvider {
    fn name(&self) -> &'static str {
        "placafipe"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn lookup(&self, plate: &Plate) -> ProviderOutcome {
        let url = format!("{}/placa/{}", self.base_url, plate.normalized);

        let response = match self.http.get(&url).send().await {
            Ok(r) => r,
            Err(e) => return transport_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            return classify_status(status);
        }

        match response.text().await {
            Ok(text) => Self::parse_response(&text, &plate.normalized),
            Err(e) => transport_error(e),
        }
    }
}
