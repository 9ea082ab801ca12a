// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Subscription service methods.
//!
//! Each is `POST {base}/invoke/SubscriptionService/{Method}` with
//! form-urlencoded parameters, answering `{"Value": .., "Type": ..}`.

use std::time::{Duration, Instant};

use axum::{
    extract::{rejection::FormRejection, State},
    Form, Json,
};
use serde::Deserialize;
use tracing::debug;

use woopsa_core::protocol::method;
use woopsa_core::types::{
    duration_from_secs_f64, ChannelId, MonitorInterval, NotificationId, SubscriptionId, TimedValue, Value,
};

use crate::error::{ApiError, ApiResult};
use crate::response::{notification_list, woopsa_value};
use crate::state::AppState;

fn form<T>(form: Result<Form<T>, FormRejection>) -> ApiResult<T> {
    form.map(|Form(params)| params)
        .map_err(|rejection| ApiError::bad_request(rejection.body_text()))
}

// =============================================================================
// CreateSubscriptionChannel
// =============================================================================

/// Parameters of `CreateSubscriptionChannel`.
#[derive(Debug, Deserialize)]
pub struct CreateChannelParams {
    /// Queue capacity.
    #[serde(rename = "NotificationQueueSize")]
    pub notification_queue_size: usize,
}

/// POST {base}/invoke/SubscriptionService/CreateSubscriptionChannel
pub async fn create_subscription_channel(
    State(state): State<AppState>,
    params: Result<Form<CreateChannelParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let result = create_channel(&state, params);
    state.metrics.record_request(method::CREATE_SUBSCRIPTION_CHANNEL, &result);
    result
}

fn create_channel(
    state: &AppState,
    params: Result<Form<CreateChannelParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let params = form(params)?;
    let channel_id = state.service.create_channel(params.notification_queue_size);
    Ok(woopsa_value(channel_id.get() as i64))
}

// =============================================================================
// RegisterSubscription
// =============================================================================

/// Parameters of `RegisterSubscription`.
#[derive(Debug, Deserialize)]
pub struct RegisterParams {
    /// Channel id.
    #[serde(rename = "SubscriptionChannel")]
    pub subscription_channel: u64,
    /// Path or `server#path` link.
    #[serde(rename = "PropertyLink")]
    pub property_link: String,
    /// Seconds between samples; negative for last-value-only.
    #[serde(rename = "MonitorInterval")]
    pub monitor_interval: f64,
    /// Seconds between publishes.
    #[serde(rename = "PublishInterval")]
    pub publish_interval: f64,
}

/// POST {base}/invoke/SubscriptionService/RegisterSubscription
pub async fn register_subscription(
    State(state): State<AppState>,
    params: Result<Form<RegisterParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let result = register(&state, params).await;
    state.metrics.record_request(method::REGISTER_SUBSCRIPTION, &result);
    result
}

async fn register(
    state: &AppState,
    params: Result<Form<RegisterParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let params = form(params)?;
    let monitor = MonitorInterval::from_secs_f64(params.monitor_interval);
    let publish: Duration = duration_from_secs_f64(params.publish_interval);

    let subscription_id = state
        .service
        .register_subscription(
            ChannelId::new(params.subscription_channel),
            &params.property_link,
            monitor,
            publish,
        )
        .await?;
    Ok(woopsa_value(subscription_id.get() as i64))
}

// =============================================================================
// UnregisterSubscription
// =============================================================================

/// Parameters of `UnregisterSubscription`.
#[derive(Debug, Deserialize)]
pub struct UnregisterParams {
    /// Channel id.
    #[serde(rename = "SubscriptionChannel")]
    pub subscription_channel: u64,
    /// Subscription id.
    #[serde(rename = "SubscriptionId")]
    pub subscription_id: u64,
}

/// POST {base}/invoke/SubscriptionService/UnregisterSubscription
pub async fn unregister_subscription(
    State(state): State<AppState>,
    params: Result<Form<UnregisterParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let result = unregister(&state, params).await;
    state.metrics.record_request(method::UNREGISTER_SUBSCRIPTION, &result);
    result
}

async fn unregister(
    state: &AppState,
    params: Result<Form<UnregisterParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let params = form(params)?;
    let removed = state
        .service
        .unregister_subscription(
            ChannelId::new(params.subscription_channel),
            SubscriptionId::new(params.subscription_id),
        )
        .await?;
    Ok(woopsa_value(Value::Logical(removed)))
}

// =============================================================================
// WaitNotification
// =============================================================================

/// Parameters of `WaitNotification`.
#[derive(Debug, Deserialize)]
pub struct WaitParams {
    /// Channel id.
    #[serde(rename = "SubscriptionChannel")]
    pub subscription_channel: u64,
    /// Last id received, or 0.
    #[serde(rename = "LastNotificationId")]
    pub last_notification_id: u64,
}

/// POST {base}/invoke/SubscriptionService/WaitNotification
pub async fn wait_notification(
    State(state): State<AppState>,
    params: Result<Form<WaitParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let started = Instant::now();
    let result = wait(&state, params).await;
    state.metrics.observe_wait(started.elapsed());
    state.metrics.record_request(method::WAIT_NOTIFICATION, &result);
    result
}

async fn wait(
    state: &AppState,
    params: Result<Form<WaitParams>, FormRejection>,
) -> ApiResult<Json<TimedValue>> {
    let params = form(params)?;
    let channel_id = ChannelId::new(params.subscription_channel);
    let notifications = state
        .service
        .wait_notification(channel_id, NotificationId::new(params.last_notification_id))
        .await?;

    debug!(channel_id = %channel_id, count = notifications.len(), "Answering wait");
    Ok(notification_list(&notifications))
}
