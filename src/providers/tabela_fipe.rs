//! Two-stage FIPE lookup provider.
//!
//! Stage one scrapes a public plate page for the vehicle's FIPE catalog code
//! (the `Código FIPE:` label). Stage two resolves that code against a
//! structured lookup-by-code API. A miss in stage one is a provider miss;
//! stage-two failures are classified by the API's own status rules.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use super::{classify_status, json_field, transport_error, visible_text, Provider, ProviderOutcome};
use crate::models::plate::Plate;
use crate::models::vehicle::RecordDraft;

const TIMEOUT: Duration = Duration::from_secs(15);

static FIPE_CODE_RE: OnceLock<Regex> = OnceLock::new();

fn fipe_code_re() -> &'static Regex {
    FIPE_CODE_RE
        .get_or_init(|| Regex::new(r"Código FIPE:?\D*([0-9]{6}-[0-9])").expect("valid regex"))
}

/// Pull the FIPE catalog code out of a scraped plate page.
pub fn extract_fipe_code(html: &str) -> Option<String> {
    let text = visible_text(html);
    fipe_code_re()
        .captures(&text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}

pub struct TabelaFipeProvider {
    http: Client,
    base_url: String,
    lookup_url: String,
}

impl TabelaFipeProvider {
    pub fn new(base_url: &str, lookup_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(super::BROWSER_USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            lookup_url: lookup_url.trim_end_matches('/').to_string(),
        })
    }

    fn parse_lookup(body: &str, plate: &str, fipe_code: &str) -> ProviderOutcome {
        let data: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(e) => return ProviderOutcome::Fatal(format!("unparseable lookup body: {e}")),
        };

        let mut draft = RecordDraft::new();
        draft.make = json_field(&data, "brand");
        draft.model = json_field(&data, "model");
        draft.model_year = json_field(&data, "modelYear");
        draft.fuel_type = json_field(&data, "fuel");
        draft.fipe_value = json_field(&data, "price");
        draft.fipe_code = Some(fipe_code.to_string());

        if !draft.has_price() {
            return ProviderOutcome::NotFound;
        }

        ProviderOutcome::Found(draft.finish(plate))
    }
}

#[async_trait]
impl Provider for TabelaFipeProvider {
    fn name(&self) -> &'static str {
        "tabela_fipe"
    }

    fn timeout(&self) -> Duration {
        TIMEOUT
    }

    async fn lookup(&self, plate: &Plate) -> ProviderOutcome {
        // Stage one: recover the catalog code from the plate page.
        let page_url = format!("{}/placa/{}", self.base_url, plate.normalized);
        let response = match self.http.get(&page_url).send().await {
            Ok(r) => r,
            Err(e) => return transport_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            return classify_status(status);
        }

        let html = match response.text().await {
            Ok(h) => h,
            Err(e) => return transport_error(e),
        };

        let Some(fipe_code) = extract_fipe_code(&html) else {
            return ProviderOutcome::NotFound;
        };

        // Stage two: structured lookup keyed by the code.
        let lookup_url = format!("{}/{}", self.lookup_url, fipe_code);
        let response = match self.http.get(&lookup_url).send().await {
            Ok(r) => r,
            Err(e) => return transport_error(e),
        };

        let status = response.status();
        if !status.is_success() {
            return classify_status(status);
        }

        match response.text().await {
            Ok(body) => Self::parse_lookup(&body, &plate.normalized, &fipe_code),
            Err(e) => transport_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_extracted_from_page() {
        let html = r#"
        <html><body>
          <table>
            <tr><td>Código FIPE:</td><td>038001-6</td></tr>
          </table>
        </body></html>
        "#;
        assert_eq!(extract_fipe_code(html), Some("038001-6".to_string()));
    }

    #[test]
    fn test_code_extracted_without_colon() {
        let html = "<p>Código FIPE 038001-6</p>";
        assert_eq!(extract_fipe_code(html), Some("038001-6".to_string()));
    }

    #[test]
    fn test_missing_code_is_none() {
        assert_eq!(extract_fipe_code("<html><body>nada aqui</body></html>"), None);
    }

    #[test]
    fn test_lookup_body_adapted() {
        let body = r#"{
            "brand": "HONDA",
            "model": "CIVIC 2.0 EXL",
            "modelYear": 2020,
            "fuel": "Gasolina",
            "price": "R$ 115.000,00"
        }"#;
        let ProviderOutcome::Found(record) =
            TabelaFipeProvider::parse_lookup(body, "ABC1D23", "038001-6")
        else {
            panic!("expected Found");
        };
        assert_eq!(record.make, "HONDA");
        assert_eq!(record.model_year, "2020");
        assert_eq!(record.fipe_value, "R$ 115.000,00");
        // The catalog code recovered in stage one is carried into the record.
        assert_eq!(record.fipe_code, "038001-6");
    }

    #[test]
    fn test_priceless_lookup_is_miss() {
        let body = r#"{"brand": "HONDA", "model": "CIVIC"}"#;
        assert_eq!(
            TabelaFipeProvider::parse_lookup(body, "ABC1D23", "038001-6"),
            ProviderOutcome::NotFound
        );
    }
}
