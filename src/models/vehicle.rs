use serde::{Deserialize, Serialize};

/// Placeholder for any field an upstream omits.
pub const UNKNOWN: &str = "—";

/// Placeholder for a missing FIPE price.
pub const UNKNOWN_PRICE: &str = "R$ —";

/// Canonical vehicle + FIPE record returned to the caller.
///
/// Serializes with the Portuguese field names frontends consume. Every field
/// is independently optional upstream and defaults to the sentinel; a record
/// is only considered usable when its price resolved (see
/// [`VehicleRecord::has_usable_price`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    #[serde(rename = "placa")]
    pub plate: String,
    #[serde(rename = "marca")]
    pub make: String,
    #[serde(rename = "modelo")]
    pub model: String,
    #[serde(rename = "ano_modelo")]
    pub model_year: String,
    #[serde(rename = "combustivel")]
    pub fuel_type: String,
    #[serde(rename = "cor")]
    pub color: String,
    /// Masked to the last 6 characters with a leading ellipsis.
    #[serde(rename = "chassi")]
    pub chassis_suffix: String,
    #[serde(rename = "municipio")]
    pub municipality: String,
    #[serde(rename = "uf")]
    pub state: String,
    #[serde(rename = "situacao")]
    pub status: String,
    #[serde(rename = "valor")]
    pub fipe_value: String,
    #[serde(rename = "codigo_fipe")]
    pub fipe_code: String,
    #[serde(rename = "referencia")]
    pub reference_month: String,
}

impl VehicleRecord {
    /// Record validity predicate used by the resolution pipeline: a record
    /// counts as a hit only when its price field actually resolved.
    ///
    /// Extension point: a provider with no pricing at all would instead need
    /// make and model both present; no current provider lacks pricing.
    pub fn has_usable_price(&self) -> bool {
        !self.fipe_value.is_empty()
            && self.fipe_value != UNKNOWN
            && self.fipe_value != UNKNOWN_PRICE
    }
}

/// Mutable accumulator a provider fills while adapting its upstream shape.
/// `finish` freezes it into a [`VehicleRecord`], applying sentinels and the
/// chassis mask.
#[derive(Debug, Default)]
pub struct RecordDraft {
    pub make: Option<String>,
    pub model: Option<String>,
    pub model_year: Option<String>,
    pub fuel_type: Option<String>,
    pub color: Option<String>,
    pub chassis: Option<String>,
    pub municipality: Option<String>,
    pub state: Option<String>,
    pub status: Option<String>,
    pub fipe_value: Option<String>,
    pub fipe_code: Option<String>,
    pub reference_month: Option<String>,
}

impl RecordDraft {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_price(&self) -> bool {
        self.fipe_value
            .as_deref()
            .is_some_and(|v| !v.trim().is_empty())
    }

    pub fn finish(self, plate: &str) -> VehicleRecord {
        let field = |v: Option<String>| -> String {
            match v {
                Some(s) if !s.trim().is_empty() => s.trim().to_string(),
                _ => UNKNOWN.to_string(),
            }
        };

        let chassis_suffix = match self.chassis {
            Some(c) if !c.trim().is_empty() => mask_chassis(c.trim()),
            _ => UNKNOWN.to_string(),
        };

        let fipe_value = match self.fipe_value {
            Some(v) if !v.trim().is_empty() => v.trim().to_string(),
            _ => UNKNOWN_PRICE.to_string(),
        };

        VehicleRecord {
            plate: plate.to_string(),
            make: field(self.make),
            model: field(self.model),
            model_year: field(self.model_year),
            fuel_type: field(self.fuel_type),
            color: field(self.color),
            chassis_suffix,
            municipality: field(self.municipality),
            state: field(self.state),
            status: field(self.status),
            fipe_value,
            fipe_code: field(self.fipe_code),
            reference_month: field(self.reference_month),
        }
    }
}

/// Reduce a full VIN to its last 6 characters, prefixed with an ellipsis.
fn mask_chassis(chassis: &str) -> String {
    let chars: Vec<char> = chassis.chars().collect();
    if chars.len() <= 6 {
        return format!("…{}", chassis);
    }
    let suffix: String = chars[chars.len() - 6..].iter().collect();
    format!("…{}", suffix)
}
