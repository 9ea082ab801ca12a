// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! HTTP transport.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::trace;

use woopsa_core::path::normalize_path;
use woopsa_core::protocol::{
    method, param, ErrorBody, SUBSCRIPTION_SERVICE, VERB_INVOKE, VERB_READ, VERB_WRITE,
};
use woopsa_core::types::{
    ChannelId, MonitorInterval, Notification, NotificationId, SubscriptionId, TimedValue, Value,
};

use super::SubscriptionTransport;
use crate::error::{ClientError, ClientResult};

#[derive(Deserialize)]
struct ValueBody<T> {
    #[serde(rename = "Value")]
    value: T,
}

/// Talks to a Woopsa server over HTTP.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
    base_url: String,
}

impl HttpTransport {
    /// Default request timeout; longer than any server wait timeout.
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Creates a transport for a server root such as `http://host:8080/woopsa`.
    pub fn new(base_url: &str) -> ClientResult<Self> {
        Self::with_timeout(base_url, Self::DEFAULT_TIMEOUT)
    }

    /// Creates a transport with a custom request timeout.
    pub fn with_timeout(base_url: &str, timeout: Duration) -> ClientResult<Self> {
        let base_url = base_url.trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(ClientError::transport(format!("unsupported URL: {}", base_url)));
        }
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base_url })
    }

    /// The server root URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, verb: &str, path: &str) -> String {
        format!("{}/{}/{}", self.base_url, verb, normalize_path(path))
    }

    async fn invoke<T: DeserializeOwned>(
        &self,
        method_name: &str,
        params: &[(&str, String)],
    ) -> ClientResult<T> {
        let url = self.url(VERB_INVOKE, &format!("{}/{}", SUBSCRIPTION_SERVICE, method_name));
        trace!(url = %url, "Invoking");
        let response = self.http.post(&url).form(params).send().await?;
        let body: ValueBody<T> = Self::decode(response).await?;
        Ok(body.value)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> ClientResult<T> {
        let status = response.status();
        let bytes = response.bytes().await?;

        if status.is_success() {
            return serde_json::from_slice(&bytes).map_err(|e| ClientError::decode(e.to_string()));
        }

        match serde_json::from_slice::<ErrorBody>(&bytes) {
            Ok(body) => Err(ClientError::from_remote(&body.error_type, body.message)),
            Err(_) => Err(ClientError::transport(format!("HTTP {}", status))),
        }
    }
}

/// Form encoding of a value; the server decodes it by the property's type.
fn form_value(value: &Value) -> String {
    match value {
        Value::Text(s) | Value::WoopsaLink(s) | Value::ResourceUrl(s) => s.clone(),
        other => other.to_json().to_string(),
    }
}

#[async_trait]
impl SubscriptionTransport for HttpTransport {
    async fn create_subscription_channel(&self, queue_size: usize) -> ClientResult<ChannelId> {
        self.invoke(
            method::CREATE_SUBSCRIPTION_CHANNEL,
            &[(param::NOTIFICATION_QUEUE_SIZE, queue_size.to_string())],
        )
        .await
    }

    async fn register_subscription(
        &self,
        channel_id: ChannelId,
        property_link: &str,
        monitor_interval: MonitorInterval,
        publish_interval: Duration,
    ) -> ClientResult<SubscriptionId> {
        self.invoke(
            method::REGISTER_SUBSCRIPTION,
            &[
                (param::SUBSCRIPTION_CHANNEL, channel_id.to_string()),
                (param::PROPERTY_LINK, property_link.to_string()),
                (param::MONITOR_INTERVAL, monitor_interval.as_secs_f64().to_string()),
                (param::PUBLISH_INTERVAL, publish_interval.as_secs_f64().to_string()),
            ],
        )
        .await
    }

    async fn unregister_subscription(
        &self,
        channel_id: ChannelId,
        subscription_id: SubscriptionId,
    ) -> ClientResult<bool> {
        self.invoke(
            method::UNREGISTER_SUBSCRIPTION,
            &[
                (param::SUBSCRIPTION_CHANNEL, channel_id.to_string()),
                (param::SUBSCRIPTION_ID, subscription_id.to_string()),
            ],
        )
        .await
    }

    async fn wait_notification(
        &self,
        channel_id: ChannelId,
        last_notification_id: NotificationId,
    ) -> ClientResult<Vec<Notification>> {
        self.invoke(
            method::WAIT_NOTIFICATION,
            &[
                (param::SUBSCRIPTION_CHANNEL, channel_id.to_string()),
                (param::LAST_NOTIFICATION_ID, last_notification_id.to_string()),
            ],
        )
        .await
    }

    async fn read(&self, path: &str) -> ClientResult<TimedValue> {
        let response = self.http.get(self.url(VERB_READ, path)).send().await?;
        Self::decode(response).await
    }

    async fn write(&self, path: &str, value: Value) -> ClientResult<()> {
        let response = self
            .http
            .post(self.url(VERB_WRITE, path))
            .form(&[(param::VALUE, form_value(&value))])
            .send()
            .await?;
        let _: serde_json::Value = Self::decode(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let transport = HttpTransport::new("http://localhost:8080/woopsa/").unwrap();
        assert_eq!(transport.base_url(), "http://localhost:8080/woopsa");
        assert_eq!(
            transport.url(VERB_READ, "/Room/Temperature"),
            "http://localhost:8080/woopsa/read/Room/Temperature"
        );
    }

    #[test]
    fn test_rejects_non_http_url() {
        assert!(HttpTransport::new("ftp://host").is_err());
    }

    #[test]
    fn test_form_value() {
        assert_eq!(form_value(&Value::Integer(4)), "4");
        assert_eq!(form_value(&Value::Text("on".into())), "on");
        assert_eq!(form_value(&Value::Logical(true)), "true");
    }
}
