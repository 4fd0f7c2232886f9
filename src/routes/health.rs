use axum::extract::State;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::SharedState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    /// Epoch milliseconds.
    pub timestamp: i64,
    pub version: &'static str,
    pub uptime_secs: i64,
    pub store_open: bool,
}

/// GET /health — liveness only; a closed store does not fail it.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    let now = Utc::now();
    Json(HealthResponse {
        status: "ok",
        timestamp: now.timestamp_millis(),
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (now - state.started_at).num_seconds(),
        store_open: !state.store.is_closed(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_response_serializes_to_json() {
        let response = HealthResponse {
            status: "ok",
            timestamp: 1_700_000_000_000,
            version: "0.1.0",
            uptime_secs: 5,
            store_open: true,
        };
        let json = serde_json::to_string(&response).expect("should serialize");
        assert!(json.contains("\"status\":\"ok\""));
        assert!(json.contains("\"timestamp\":1700000000000"));
        assert!(json.contains("\"store_open\":true"));
    }
}
