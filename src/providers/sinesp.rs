//! SINESP-style JSON provider.
//!
//! POSTs `{ "placa": ... }` with an access key in the `chave` header. A 2xx
//! body carries a `codigoRetorno` discriminator ("0" on success), the vehicle
//! identity fields, and a `fipe.dados` list of candidate FIPE matches ranked
//! by a confidence `score`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{classify_status, json_field, transport_error, Provider, ProviderOutcome};
use crate::models::plate::Plate;
use crate::models::vehicle::RecordDraft;

const TIMEOUT: Duration = Duration::from_secs(10);

/// One priced FIPE match for a plate. Upstream returns several per lookup,
/// ranked by confidence.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct FipeCandidate {
    #[serde(default)]
    pub score: f64,
    #[serde(rename = "texto_valor")]
    pub value: Option<String>,
    #[serde(rename = "codigo_fipe")]
    pub fipe_code: Option<String>,
    #[serde(rename = "combustivel")]
    pub fuel: Option<String>,
    #[serde(rename = "mes_referencia")]
    pub reference_month: Option<String>,
}

/// Pick the candidate to report: among positive scores the maximum wins,
/// first-seen on ties; with no positive score the first candidate is used.
pub fn select_candidate(candidates: &[FipeCandidate]) -> Option<&FipeCandidate> {
    let mut best: Option<&FipeCandidate> = None;
    for candidate in candidates.iter().filter(|c| c.score > 0.0) {
        match best {
            Some(b) if candidate.score <= b.score => {}
            _ => best = Some(candidate),
        }
    }
    best.or_else(|| candidates.first())
}

pub struct SinespProvider {
    http: Client,
    url: String,
    key: String,
}

impl SinespProvider {
    pub fn new(url: &str, key: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder().timeout(TIMEOUT).build()?;
        Ok(Self {
            http,
            url: url.to_string(),
            key: key.to_string(),
        })
    }

    /// Adapt a 2xx response body into an outcome.
    fn parse_response(body: &str, plate: &str) -> ProviderOutcome {
        let data: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return ProviderOutcome::Fatal(format!("unparseable response body: {e}")),
        };

        // Logical failure inside a 2xx body.
        let codigo = data
            .get("codigoRetorno")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default();
        if codigo != "0" {
            return ProviderOutcome::NotFound;
        }

        let mut draft = RecordDraft::new();
        draft.make = json_field(&data, "marca");
        draft.model = json_field(&data, "modelo");
        draft.model_year = json_field(&data, "anoModelo");
        draft.color = json_field(&data, "cor");
        draft.chassis = json_field(&data, "chassi");
        draft.municipality = json_field(&data, "municipio");
        draft.state = json_field(&data, "uf");
        draft.status = json_field(&data, "situacao");

        if let Some(dados) = data
            .pointer("/fipe/dados")
            .and_then(serde_json::Value::as_array)
        {
            let candidates: Vec<FipeCandidate> = dados
                .iter()
                .filter_map(|v| serde_json::from_value(v.clone()).ok())
                .collect();
            if let Some(best) = select_candidate(&candidates) {
                draft.fipe_value = best.value.clone();
                draft.fipe_code = best.fipe_code.clone();
                draft.fuel_type = best.fuel.clone();
                draft.reference_month = best.reference_month.clone();
            }
        }

        ProviderOutcome::Found(draft.finish(plate))
    }
}

#[async_trait]
impl Provider for SinespProvider {
    fn name(&self) -> &'static str {
        "sinesp"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn lookup(&self, plate: &Plate) -> ProviderOutcome {
        let body = serde_json::json!({ "placa": plate.normalized });

        let response = match self
            .http
            .post(&self.url)
            .header("chave", &self.key)
            .json(&body)
            .send()
            .await
        {
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
