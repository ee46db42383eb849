use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Comma-separated provider names, tried strictly in this order.
    #[serde(default = "default_provider_order")]
    pub provider_order: String,

    /// SINESP-style JSON POST endpoint
    pub sinesp_api_url: Option<String>,

    /// Access key sent in the `chave` header of SINESP requests
    pub sinesp_api_key: Option<String>,

    /// Base URL of the public FIPE-by-plate JSON endpoint
    #[serde(default = "default_placafipe_base_url")]
    pub placafipe_base_url: String,

    /// Bearer-token JSON plate API endpoint
    pub placas_api_url: Option<String>,

    /// Bearer token for the plate API
    pub placas_api_token: Option<String>,

    /// Base URL of the scraped plate-details page
    #[serde(default = "default_keplaca_base_url")]
    pub keplaca_base_url: String,

    /// Base URL of the scraped FIPE-code page (stage one of the two-stage lookup)
    #[serde(default = "default_tabela_fipe_base_url")]
    pub tabela_fipe_base_url: String,

    /// JSON lookup-by-FIPE-code endpoint (stage two)
    #[serde(default = "default_fipe_lookup_url")]
    pub fipe_lookup_url: String,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_provider_order() -> String {
    "sinesp,placafipe,placas_api,keplaca,tabela_fipe".to_string()
}

fn default_placafipe_base_url() -> String {
    "https://placafipe.com".to_string()
}

fn default_keplaca_base_url() -> String {
    "https://www.keplaca.com".to_string()
}

fn default_tabela_fipe_base_url() -> String {
    "https://www.tabelafipebrasil.com".to_string()
}

fn default_fipe_lookup_url() -> String {
    "https://fipe.parallelum.com.br/api/v2/vehicles".to_string()
}

impl AppConfig {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Provider names in lookup order, trimmed and with empty entries dropped.
    pub fn provider_order(&self) -> Vec<String> {
        self.provider_order
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
