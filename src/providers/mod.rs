//! Upstream vehicle-data providers and the resolution pipeline.
//!
//! Each provider adapts one upstream source (JSON API or scraped HTML page)
//! into the canonical [`VehicleRecord`]. The pipeline tries providers in
//! configured order and stops at the first one that yields a record with a
//! usable price.

pub mod keplaca;
pub mod placafipe;
pub mod placas_api;
pub mod sinesp;
pub mod tabela_fipe;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::models::plate::Plate;
use crate::models::vehicle::VehicleRecord;

/// Outcome of a single provider attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderOutcome {
    Found(VehicleRecord),
    NotFound,
    /// Network faults, timeouts, 429 and 5xx. The next provider is tried.
    Transient {
        code: Option<u16>,
        message: String,
    },
    /// The upstream contract is broken (unexpected 4xx, unparseable body).
    Fatal(String),
}

impl ProviderOutcome {
    fn label(&self) -> &'static str {
        match self {
            ProviderOutcome::Found(_) => "found",
            ProviderOutcome::NotFound => "not_found",
            ProviderOutcome::Transient { .. } => "transient",
            ProviderOutcome::Fatal(_) => "fatal",
        }
    }
}

/// Browser-like client identifier used by providers that scrape public
/// pages or sit behind bot filtering.
pub(crate) const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
     Chrome/91.0.4472.124 Safari/537.36";

/// Map a transport-level reqwest failure (connect, TLS, body read) to an
/// outcome. These are always worth moving past to the next provider.
pub(crate) fn transport_error(err: reqwest::Error) -> ProviderOutcome {
    ProviderOutcome::Transient {
        code: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

/// Flatten an HTML document to its text nodes, one per line. The extraction
/// rules of scraping providers run over this text, never over raw markup.
pub(crate) fn visible_text(html: &str) -> String {
    let document = scraper::Html::parse_document(html);
    document
        .root_element()
        .text()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Read one string-ish field out of a JSON object. Upstreams are loose about
/// types (years arrive as numbers or strings), so numbers are stringified.
pub(crate) fn json_field(value: &serde_json::Value, key: &str) -> Option<String> {
    match value.get(key)? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Map a non-2xx upstream status to an outcome.
///
/// 404 is an expected miss; 429 and 5xx are worth moving past quietly; any
/// other 4xx means we are speaking the wrong contract.
pub fn classify_status(status: StatusCode) -> ProviderOutcome {
    if status == StatusCode::NOT_FOUND {
        return ProviderOutcome::NotFound;
    }
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return ProviderOutcome::Transient {
            code: Some(status.as_u16()),
            message: format!("upstream returned HTTP {}", status),
        };
    }
    ProviderOutcome::Fatal(format!("upstream returned HTTP {}", status))
}

/// A single upstream data source. Implementations differ only in transport
/// and in how they adapt the upstream shape into a record.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Per-attempt deadline enforced by the pipeline.
    fn timeout(&self) -> Duration {
        Duration::from_secs(10)
    }

    async fn lookup(&self, plate: &Plate) -> ProviderOutcome;
}

#[derive(Debug, thiserror::Error)]
pub enum ResolutionError {
    /// Every configured provider missed or failed. Carries the per-provider
    /// outcomes for logging; they are never serialized to the caller.
    #[error("no provider returned a usable record")]
    Exhausted(Vec<(&'static str, ProviderOutcome)>),
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineBuildError {
    #[error("unknown provider name in PROVIDER_ORDER: {0}")]
    UnknownProvider(String),

    #[error("no provider could be configured")]
    NoProviders,

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// Ordered provider list. One instance is shared across requests; providers
/// keep no per-request state.
pub struct Pipeline {
    providers: Vec<Box<dyn Provider>>,
}

impl Pipeline {
    pub fn new(providers: Vec<Box<dyn Provider>>) -> Self {
        Self { providers }
    }

    /// Build the pipeline from environment-supplied configuration.
    ///
    /// Providers whose endpoint or credentials are missing are skipped with
    /// a warning so a partial deployment still serves lookups.
    pub fn from_config(config: &AppConfig) -> Result<Self, PipelineBuildError> {
        let mut providers: Vec<Box<dyn Provider>> = Vec::new();

        for name in config.provider_order() {
            match name.as_str() {
                "sinesp" => match (&config.sinesp_api_url, &config.sinesp_api_key) {
                    (Some(url), Some(key)) => {
                        providers.push(Box::new(sinesp::SinespProvider::new(url, key)?));
                    }
                    _ => warn!(provider = "sinesp", "skipping provider: missing endpoint or key"),
                },
                "placafipe" => {
                    providers.push(Box::new(placafipe::PlacaFipeProvider::new(
                        &config.placafipe_base_url,
                    )?));
                }
                "placas_api" => match (&config.placas_api_url, &config.placas_api_token) {
                    (Some(url), Some(token)) => {
                        providers.push(Box::new(placas_api::PlacasApiProvider::new(url, token)?));
                    }
                    _ => warn!(provider = "placas_api", "skipping provider: missing endpoint or token"),
                },
                "keplaca" => {
                    providers.push(Box::new(keplaca::KeplacaProvider::new(
                        &config.keplaca_base_url,
                    )?));
                }
                "tabela_fipe" => {
                    providers.push(Box::new(tabela_fipe::TabelaFipeProvider::new(
                        &config.tabela_fipe_base_url,
                        &config.fipe_lookup_url,
                    )?));
                }
                other => return Err(PipelineBuildError::UnknownProvider(other.to_string())),
            }
        }

        if providers.is_empty() {
            return Err(PipelineBuildError::NoProviders);
        }

        Ok(Self::new(providers))
    }

    pub fn provider_names(&self) -> Vec<&'static str> {
        self.providers.iter().map(|p| p.name()).collect()
    }

    /// Resolve a validated plate against the providers, strictly in order.
    ///
    /// The first record passing the usable-price check is returned verbatim;
    /// records are never merged across providers. A well-formed but empty
    /// record (missing price) is demoted to a miss and the next provider is
    /// tried. Dropping the returned future aborts any in-flight upstream
    /// call.
    pub async fn resolve(&self, plate: &Plate) -> Result<VehicleRecord, ResolutionError> {
        let mut outcomes: Vec<(&'static str, ProviderOutcome)> = Vec::new();

        for provider in &self.providers {
            let outcome = match tokio::time::timeout(provider.timeout(), provider.lookup(plate))
                .await
            {
                Ok(outcome) => outcome,
                Err(_) => ProviderOutcome::Transient {
                    code: None,
                    message: format!("timed out after {:?}", provider.timeout()),
                },
            };

            metrics::counter!(
                "provider_lookups_total",
                "provider" => provider.name(),
                "outcome" => outcome.label()
            )
            .increment(1);

            match outcome {
                ProviderOutcome::Found(record) if record.has_usable_price() => {
                    info!(
                        provider = provider.name(),
                        plate = %plate.normalized,
                        "provider returned a usable record"
                    );
                    return Ok(record);
                }
                ProviderOutcome::Found(_) => {
                    info!(
                        provider = provider.name(),
                        plate = %plate.normalized,
                        "provider record has no price, treating as miss"
                    );
                    outcomes.push((provider.name(), ProviderOutcome::NotFound));
                }
                ProviderOutcome::NotFound => {
                    info!(provider = provider.name(), plate = %plate.normalized, "provider miss");
                    outcomes.push((provider.name(), ProviderOutcome::NotFound));
                }
                ProviderOutcome::Transient { ref code, ref message } => {
                    warn!(
                        provider = provider.name(),
                        code = code.map(|c| c as i64),
                        message = %message,
                        "transient provider failure, trying next"
                    );
                    outcomes.push((provider.name(), outcome));
                }
                ProviderOutcome::Fatal(ref message) => {
                    warn!(
                        provider = provider.name(),
                        message = %message,
                        "provider contract failure, trying next"
                    );
                    outcomes.push((provider.name(), outcome));
                }
            }
        }

        Err(ResolutionError::Exhausted(outcomes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::vehicle::RecordDraft;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn test_plate() -> Plate {
        Plate::parse("ABC1234").unwrap()
    }

    fn priced_record(value: &str) -> VehicleRecord {
        let mut draft = RecordDraft::new();
        draft.make = Some("FIAT".to_string());
        draft.model = Some("UNO".to_string());
        draft.fipe_value = Some(value.to_string());
        draft.finish("ABC1234")
    }

    struct StubProvider {
        name: &'static str,
        outcome: ProviderOutcome,
        calls: Arc<AtomicUsize>,
    }

    impl StubProvider {
        fn boxed(name: &'static str, outcome: ProviderOutcome) -> Box<Self> {
            Box::new(Self {
                name,
                outcome,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl Provider for StubProvider {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn lookup(&self, _plate: &Plate) -> ProviderOutcome {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    #[tokio::test]
    async fn test_short_circuits_on_first_usable_record() {
        let p1 = StubProvider::boxed("p1", ProviderOutcome::NotFound);
        let p2 = StubProvider::boxed("p2", ProviderOutcome::Found(priced_record("R$ 30.000,00")));
        let p3 = StubProvider::boxed("p3", ProviderOutcome::Found(priced_record("R$ 99.999,00")));
        let p3_calls = Arc::clone(&p3.calls);

        let pipeline = Pipeline::new(vec![p1, p2, p3]);
        let record = pipeline.resolve(&test_plate()).await.unwrap();

        assert_eq!(record.fipe_value, "R$ 30.000,00");
        // The pipeline must stop at p2; p3 is never invoked.
        assert_eq!(p3_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_priceless_record_demoted_to_miss() {
        let empty = RecordDraft::new().finish("ABC1234");
        let p1 = StubProvider::boxed("p1", ProviderOutcome::Found(empty));
        let p2 = StubProvider::boxed("p2", ProviderOutcome::Found(priced_record("R$ 1,00")));

        let pipeline = Pipeline::new(vec![p1, p2]);
        let record = pipeline.resolve(&test_plate()).await.unwrap();
        assert_eq!(record.fipe_value, "R$ 1,00");
    }

    #[tokio::test]
    async fn test_exhaustion_collects_outcomes() {
        let p1 = StubProvider::boxed("p1", ProviderOutcome::NotFound);
        let p2 = StubProvider::boxed(
            "p2",
            ProviderOutcome::Transient {
                code: Some(503),
                message: "upstream returned HTTP 503".to_string(),
            },
        );
        let p3 = StubProvider::boxed("p3", ProviderOutcome::Fatal("bad body".to_string()));

        let pipeline = Pipeline::new(vec![p1, p2, p3]);
        let err = pipeline.resolve(&test_plate()).await.unwrap_err();
        let ResolutionError::Exhausted(outcomes) = err;
        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[0].0, "p1");
        assert!(matches!(outcomes[1].1, ProviderOutcome::Transient { .. }));
        assert!(matches!(outcomes[2].1, ProviderOutcome::Fatal(_)));
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        struct SlowProvider;

        #[async_trait]
        impl Provider for SlowProvider {
            fn name(&self) -> &'static str {
                "slow"
            }

            fn timeout(&self) -> Duration {
                Duration::from_millis(10)
            }

            async fn lookup(&self, _plate: &Plate) -> ProviderOutcome {
                tokio::time::sleep(Duration::from_secs(60)).await;
                ProviderOutcome::NotFound
            }
        }

        let pipeline = Pipeline::new(vec![Box::new(SlowProvider)]);
        let err = pipeline.resolve(&test_plate()).await.unwrap_err();
        let ResolutionError::Exhausted(outcomes) = err;
        assert!(matches!(
            outcomes[0].1,
            ProviderOutcome::Transient { code: None, .. }
        ));
    }

    #[test]
    fn test_classify_status() {
        assert_eq!(
            classify_status(StatusCode::NOT_FOUND),
            ProviderOutcome::NotFound
        );
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS),
            ProviderOutcome::Transient { code: Some(429), .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY),
            ProviderOutcome::Transient { code: Some(502), .. }
        ));
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED),
            ProviderOutcome::Fatal(_)
        ));
    }
}
