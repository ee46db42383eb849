use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Legacy grammar: 3 letters + 4 digits (e.g. ABC1234).
static LEGACY_RE: OnceLock<Regex> = OnceLock::new();

/// Mercosul grammar: 3 letters + digit + letter + 2 digits (e.g. ABC1D23).
static MERCOSUL_RE: OnceLock<Regex> = OnceLock::new();

fn legacy_re() -> &'static Regex {
    LEGACY_RE.get_or_init(|| Regex::new(r"^[A-Z]{3}[0-9]{4}$").expect("valid regex"))
}

fn mercosul_re() -> &'static Regex {
    MERCOSUL_RE.get_or_init(|| Regex::new(r"^[A-Z]{3}[0-9][A-Z][0-9]{2}$").expect("valid regex"))
}

/// The two legal Brazilian plate grammars.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlateFormat {
    Legacy,
    Mercosul,
}

/// A validated license plate. `normalized` is uppercase, alphanumeric-only,
/// and matches exactly one of the two grammars.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plate {
    pub raw: String,
    pub normalized: String,
    pub format: PlateFormat,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Parâmetro \"placa\" é obrigatório")]
    Empty,

    #[error("Formato de placa inválido")]
    InvalidFormat,
}

impl Plate {
    /// Normalize and classify a plate string.
    ///
    /// Strips every character outside `[A-Za-z0-9]`, uppercases the rest,
    /// and tests the legacy grammar before the Mercosul one. The grammars
    /// are disjoint, so the order is a deterministic tie-break only.
    pub fn parse(input: &str) -> Result<Self, ValidationError> {
        if input.trim().is_empty() {
            return Err(ValidationError::Empty);
        }

        let normalized: String = input
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .map(|c| c.to_ascii_uppercase())
            .collect();

        let format = if legacy_re().is_match(&normalized) {
            PlateFormat::Legacy
        } else if mercosul_re().is_match(&normalized) {
            PlateFormat::Mercosul
        } else {
            return Err(ValidationError::InvalidFormat);
        };

        Ok(Self {
            raw: input.to_string(),
            normalized,
            format,
        })
    }
}
