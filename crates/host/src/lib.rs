//! Host bridge abstraction.
//!
//! The companion host (a GUI shell, a test harness, a real BLE stack) owns
//! device pairing and transport. This crate only defines what the transfer
//! logic needs from it: sending a message to an app on a device, launching
//! and listing apps, and a stream of inbound app messages.

pub mod relay;

use std::fmt;
use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

pub use relay::{is_installed, launch_and_settle, list_installed_apps, send_text};

/// Capacity of the inbound notification channel.
pub const INBOUND_CHANNEL_CAPACITY: usize = 256;

/// Errors reported by the host bridge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    #[error("device disconnected")]
    Disconnected,

    #[error("send failed: {0}")]
    Send(String),

    #[error("launch failed: {0}")]
    Launch(String),

    #[error("unsupported by host: {0}")]
    Unsupported(String),
}

/// A boxed future returned by bridge methods.
pub type BridgeFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, BridgeError>> + Send + 'a>>;

/// An app on a specific device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    /// Device address as known to the host.
    pub device: String,
    /// Package name of the app on the device.
    pub app_id: String,
}

impl Endpoint {
    pub fn new(device: impl Into<String>, app_id: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            app_id: app_id.into(),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.app_id, self.device)
    }
}

/// A message an app on the device sent to the companion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundNotification {
    /// Package name of the sending app.
    pub app_id: String,
    /// Message body, usually a JSON object carrying a `tag`.
    pub payload: serde_json::Value,
}

impl InboundNotification {
    pub fn new(app_id: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            app_id: app_id.into(),
            payload,
        }
    }
}

/// Sending half of the inbound notification stream, held by the host.
pub type InboundSender = mpsc::Sender<InboundNotification>;

/// Receiving half of the inbound notification stream.
pub type InboundReceiver = mpsc::Receiver<InboundNotification>;

/// Creates an inbound notification stream.
pub fn inbound_channel() -> (InboundSender, InboundReceiver) {
    mpsc::channel(INBOUND_CHANNEL_CAPACITY)
}

/// Capabilities the host exposes to reach apps on a paired device.
///
/// Implementations must be cheap to call concurrently; the transfer logic
/// never issues overlapping sends for the same endpoint.
pub trait DeviceBridge: Send + Sync {
    /// Sends `payload` to the app at `endpoint`. Fire-and-forget: success
    /// only means the host accepted the message.
    fn send_message<'a>(&'a self, endpoint: &'a Endpoint, payload: String) -> BridgeFuture<'a, ()>;

    /// Launches `app_id` on `device`.
    fn launch_app<'a>(&'a self, device: &'a str, app_id: &'a str) -> BridgeFuture<'a, ()>;

    /// Lists the package names of apps installed on `device`.
    fn list_apps<'a>(&'a self, device: &'a str) -> BridgeFuture<'a, Vec<String>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_display() {
        let ep = Endpoint::new("AA:BB", "com.example.app");
        assert_eq!(ep.to_string(), "com.example.app@AA:BB");
    }

    #[test]
    fn notification_json_is_camel_case() {
        let n = InboundNotification::new("com.example.app", serde_json::json!({"tag": "file"}));
        let v = serde_json::to_value(&n).unwrap();
        assert_eq!(v["appId"], "com.example.app");
        assert_eq!(v["payload"]["tag"], "file");
    }

    #[test]
    fn bridge_error_display() {
        assert_eq!(BridgeError::Disconnected.to_string(), "device disconnected");
        assert_eq!(BridgeError::Send("busy".into()).to_string(), "send failed: busy");
    }

    #[tokio::test]
    async fn inbound_channel_delivers_in_order() {
        let (tx, mut rx) = inbound_channel();
        tx.send(InboundNotification::new("a", serde_json::json!(1))).await.unwrap();
        tx.send(InboundNotification::new("a", serde_json::json!(2))).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().payload, 1);
        assert_eq!(rx.recv().await.unwrap().payload, 2);
    }
}
