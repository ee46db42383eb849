//! HTML-scraped plate-details provider.
//!
//! No structured API exists for this upstream, so the page is fetched with a
//! browser-like user-agent, reduced to visible text, and mined with one
//! extraction rule per field. Each rule is independently optional; the whole
//! scrape only counts as a hit when the price rule matched.

use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;

use super::{classify_status, transport_error, visible_text, Provider, ProviderOutcome};
use crate::models::plate::Plate;
use crate::models::vehicle::RecordDraft;

const TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TargetField {
    Make,
    Model,
    Year,
    Fuel,
    Color,
    Chassis,
    FipeCode,
    State,
    Municipality,
    Price,
}

/// Label-keyed extraction rules, one capture group each. Applied to the
/// page's visible text, where every text node sits on its own line.
const FIELD_PATTERNS: &[(TargetField, &str)] = &[
    (TargetField::Make, r"Marca:\s*\n?\s*([^\n]+)"),
    (TargetField::Model, r"Modelo:\s*\n?\s*([^\n]+)"),
    (TargetField::Year, r"Ano:\s*\n?\s*([0-9]{4}(?:/[0-9]{4})?)"),
    (TargetField::Fuel, r"Combustível:\s*\n?\s*([^\n]+)"),
    (TargetField::Color, r"Cor:\s*\n?\s*([^\n]+)"),
    (TargetField::Chassis, r"Chassi:\s*\n?\s*([A-Za-z0-9*]+)"),
    (TargetField::FipeCode, r"Código FIPE\D*([0-9]{6}-[0-9])"),
    (TargetField::State, r"UF:\s*\n?\s*([A-Z]{2})"),
    (TargetField::Municipality, r"Município:\s*\n?\s*([^\n]+)"),
    (TargetField::Price, r"(R\$\s?[\d.]+,\d{2})"),
];

pub struct KeplacaProvider {
    http: Client,
    base_url: String,
    rules: Vec<(TargetField, Regex)>,
}

impl KeplacaProvider {
    pub fn new(base_url: &str) -> Result<Self, reqwest::Error> {
        let http = Client::builder()
            .user_agent(super::BROWSER_USER_AGENT)
            .timeout(TIMEOUT)
            .build()?;

        let rules = FIELD_PATTERNS
            .iter()
            .map(|(field, pattern)| (*field, Regex::new(pattern).expect("valid field pattern")))
            .collect();

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            rules,
        })
    }

    fn extract(&self, html: &str, plate: &str) -> ProviderOutcome {
        let text = visible_text(html);

        let mut draft = RecordDraft::new();
        for (field, rule) in &self.rules {
            let Some(value) = rule
                .captures(&text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().trim().to_string())
            else {
                continue;
            };

            match field {
                TargetField::Make => draft.make = Some(value),
                TargetField::Model => draft.model = Some(value),
                TargetField::Year => draft.model_year = Some(value),
                TargetField::Fuel => draft.fuel_type = Some(value),
                TargetField::Color => draft.color = Some(value),
                TargetField::Chassis => draft.chassis = Some(value),
                TargetField::FipeCode => draft.fipe_code = Some(value),
                TargetField::State => draft.state = Some(value),
                TargetField::Municipality => draft.municipality = Some(value),
                TargetField::Price => draft.fipe_value = Some(value),
            }
        }

        if !draft.has_price() {
            return ProviderOutcome::NotFound;
        }

        ProviderOutcome::Found(draft.finish(plate))
    }
}

#[async_trait]
impl Provider for KeplacaProvider {
    fn name(&self) -> &'static str {
        "keplaca"
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
            Ok(html) => self.extract(&html, &plate.normalized),
            Err(e) => transport_error(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle::UNKNOWN;

    fn provider() -> KeplacaProvider {
        KeplacaProvider::new("https://example.invalid").unwrap()
    }

    const FIXTURE: &str = r#"
    <html><body>
      <h1>Consulta de placa</h1>
      <table>
        <tr><td>Marca:</td><td>FIAT</td></tr>
        <tr><td>Modelo:</td><td>UNO MILLE 1.0 FIRE</td></tr>
        <tr><td>Ano:</td><td>2011/2012</td></tr>
        <tr><td>Combustível:</td><td>Flex</td></tr>
        <tr><td>Cor:</td><td>BRANCA</td></tr>
        <tr><td>Chassi:</td><td>9BD15822AC6543210</td></tr>
        <tr><td>UF:</td><td>SP</td></tr>
        <tr><td>Município:</td><td>Campinas</td></tr>
      </table>
      <div>Código FIPE 001267-8</div>
      <div>Valor FIPE: R$ 18.500,00</div>
    </body></html>
    "#;

    #[test]
    fn test_full_page_extracted() {
        let outcome = provider().extract(FIXTURE, "ABC1234");
        let ProviderOutcome::Found(record) = outcome else {
            panic!("expected Found, got {outcome:?}");
        };
        assert_eq!(record.make, "FIAT");
        assert_eq!(record.model, "UNO MILLE 1.0 FIRE");
        assert_eq!(record.model_year, "2011/2012");
        assert_eq!(record.fuel_type, "Flex");
        assert_eq!(record.color, "BRANCA");
        assert_eq!(record.chassis_suffix, "…543210");
        assert_eq!(record.state, "SP");
        assert_eq!(record.municipality, "Campinas");
        assert_eq!(record.fipe_code, "001267-8");
        assert_eq!(record.fipe_value, "R$ 18.500,00");
    }

    #[test]
    fn test_missing_price_is_miss() {
        let html = r#"
        <html><body>
          <table>
            <tr><td>Marca:</td><td>FIAT</td></tr>
            <tr><td>Modelo:</td><td>UNO</td></tr>
          </table>
        </body></html>
        "#;
        assert_eq!(provider().extract(html, "ABC1234"), ProviderOutcome::NotFound);
    }

    #[test]
    fn test_partial_page_fills_sentinels() {
        let html = r#"
        <html><body>
          <p>Marca: VW</p>
          <p>Valor: R$ 42.000,00</p>
        </body></html>
        "#;
        let ProviderOutcome::Found(record) = provider().extract(html, "ABC1234") else {
            panic!("expected Found");
        };
        assert_eq!(record.make, "VW");
        assert_eq!(record.fipe_value, "R$ 42.000,00");
        assert_eq!(record.color, UNKNOWN);
        assert_eq!(record.chassis_suffix, UNKNOWN);
    }

    #[test]
    fn test_empty_page_is_miss() {
        assert_eq!(
            provider().extract("<html><body></body></html>", "ABC1234"),
            ProviderOutcome::NotFound
        );
    }

    #[test]
    fn test_labels_and_values_on_one_line() {
        let html = "<html><body><p>Cor: PRETA</p><p>R$ 9.999,99</p></body></html>";
        let ProviderOutcome::Found(record) = provider().extract(html, "ABC1234") else {
            panic!("expected Found");
        };
        assert_eq!(record.color, "PRETA");
        assert_eq!(record.fipe_value, "R$ 9.999,99");
    }
}
