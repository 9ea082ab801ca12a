// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Property read and write.

use axum::{
    extract::{rejection::FormRejection, Path, State},
    Form, Json,
};
use serde::Deserialize;
use tracing::debug;

use woopsa_core::error::ModelError;
use woopsa_core::hooks::ModelAccessGuard;
use woopsa_core::model::Element;
use woopsa_core::path::normalize_path;
use woopsa_core::types::{TimedValue, Value};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET {base}/read/{*path}
pub async fn read_property(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> ApiResult<Json<TimedValue>> {
    let path = normalize_path(&path);
    let _guard = ModelAccessGuard::enter(state.hooks.clone(), path.clone());
    Ok(Json(state.model.read(&path).await?))
}

/// Parameters of a write.
#[derive(Debug, Deserialize)]
pub struct WriteParams {
    /// The new value, in its form encoding.
    #[serde(rename = "Value")]
    pub value: String,
}

/// POST {base}/write/{*path}
///
/// The form value is decoded with the property's declared type.
pub async fn write_property(
    State(state): State<AppState>,
    Path(path): Path<String>,
    params: Result<Form<WriteParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let Form(params) = params.map_err(|rejection| ApiError::bad_request(rejection.body_text()))?;
    let path = normalize_path(&path);
    let _guard = ModelAccessGuard::enter(state.hooks.clone(), path.clone());

    let value_type = match state.model.lookup(&path).await? {
        Element::Property(value_type) => value_type,
        Element::Object | Element::Client(_) => return Err(ModelError::not_writable(&path).into()),
    };
    let value = Value::from_json(&serde_json::Value::String(params.value), value_type)?;

    state.model.write(&path, value.clone()).await?;
    debug!(path = %path, value_type = %value_type, "Property written");
    Ok(Json(TimedValue::now(value)))
}
