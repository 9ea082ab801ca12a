// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Metrics handler.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::error::ApiResult;
use crate::state::AppState;

/// GET /metrics
///
/// Returns Prometheus metrics in the text exposition format.
pub async fn prometheus_metrics(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let body = state.metrics.render(&state.service.stats())?;
    Ok(([(header::CONTENT_TYPE, state.metrics.content_type())], body))
}
