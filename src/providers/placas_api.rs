//! Bearer-token JSON plate API provider.
//!
//! GET `{base}/{plate}` with `Authorization: Bearer`. Response uses English
//! field names (`brand`, `model`, `price`, ...). The token is supplied via
//! configuration and never logged.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;

use super::{classify_status, json_field, transport_error, Provider, ProviderOutcome};
use crate::models::plate::Plate;
use crate::models::vehicle::RecordDraft;

const TIMEOUT: Duration = Duration::from_secs(10);

pub struct PlacasApiProvider {
    http: Client,
    url: String,
    token: String,
}

impl PlacasApiProvider {
    pub fn new(url: &str, token: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        })
    }

    fn parse_response(body: &str, plate: &str) -> ProviderOutcome {
        let data: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return ProviderOutcome::Fatal(format!("unparseable response body: {e}")),
        };

        let mut draft = RecordDraft::new();
        draft.make = json_field(&data, "brand");
        draft.model = json_field(&data, "model");
        draft.model_year = json_field(&data, "modelYear");
        draft.fuel_type = json_field(&data, "fuel");
        draft.fipe_value = json_field(&data, "price");
        draft.fipe_code = json_field(&data, "codeFipe");
        draft.reference_month = json_field(&data, "referenceMonth");

        if !draft.has_price() {
            return ProviderOutcome::NotFound;
        }

        ProviderOutcome::Found(draft.finish(plate))
    }
}

#[async_trait]
impl Provider for PlacasApiProvider {
    fn name(&self) -> &'static str {
        "placas_api"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn lookup(&self, plate: &Plate) -> ProviderOutcome {
        let url = format!("{}/{}", self.url, plate.normalized);

        let response = match self.http.get(&url).bearer_auth(&self.token).send().await {
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
