// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 NairaBridge

use axum::Json;

use crate::models::HealthResponse;

/// Liveness probe. Always 200 while the process runs; dependency health
/// surfaces through the rates endpoint and structured logs.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}
