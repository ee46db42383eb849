use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::app_state::AppState;
use crate::models::plate::Plate;
use crate::models::vehicle::VehicleRecord;
use crate::providers::ResolutionError;

#[derive(Debug, Deserialize)]
pub struct PlacaQuery {
    #[serde(default)]
    pub placa: String,
}

/// Domain-appropriate error body. Upstream errors and credentials never
/// reach this shape; callers see either a record or one of these messages.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn error_response(status: StatusCode, message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        status,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// GET /api/placa?placa=... — resolve a plate to a vehicle + FIPE record.
pub async fn lookup_placa(
    State(state): State<AppState>,
    Query(query): Query<PlacaQuery>,
) -> Result<Json<VehicleRecord>, (StatusCode, Json<ErrorResponse>)> {
    metrics::counter!("placa_lookups_total").increment(1);

    let plate = Plate::parse(&query.placa).map_err(|e| {
        metrics::counter!("placa_lookups_rejected_total").increment(1);
        error_response(StatusCode::BAD_REQUEST, &e.to_string())
    })?;

    let start = std::time::Instant::now();
    match state.pipeline.resolve(&plate).await {
        Ok(record) => {
            metrics::histogram!("placa_resolution_seconds").record(start.elapsed().as_secs_f64());
            Ok(Json(record))
        }
        Err(ResolutionError::Exhausted(outcomes)) => {
            tracing::warn!(
                plate = %plate.normalized,
                outcomes = ?outcomes,
                "all providers exhausted"
            );
            metrics::counter!("placa_lookups_exhausted_total").increment(1);
            Err(error_response(
                StatusCode::NOT_FOUND,
                "Placa não encontrada ou dados indisponíveis.",
            ))
        }
    }
}
