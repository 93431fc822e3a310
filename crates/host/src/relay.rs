//! One-shot relay operations on top of a [`DeviceBridge`].
//!
//! These cover the simple panels of the companion: pushing a raw string to
//! an app, checking which apps are installed, and bringing an app to the
//! foreground before talking to it.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::{BridgeError, DeviceBridge, Endpoint};

/// Sends `text` to the app at `endpoint` as-is, without any framing.
pub async fn send_text(
    bridge: &dyn DeviceBridge,
    endpoint: &Endpoint,
    text: &str,
) -> Result<(), BridgeError> {
    if endpoint.app_id.is_empty() {
        return Err(BridgeError::Send("no target app id".into()));
    }

    match bridge.send_message(endpoint, text.to_string()).await {
        Ok(()) => {
            info!(endpoint = %endpoint, len = text.len(), "message relayed");
            Ok(())
        }
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "message relay failed");
            Err(e)
        }
    }
}

/// Lists installed app ids on `device`.
pub async fn list_installed_apps(
    bridge: &dyn DeviceBridge,
    device: &str,
) -> Result<Vec<String>, BridgeError> {
    let apps = bridge.list_apps(device).await?;
    debug!(device, count = apps.len(), "installed apps listed");
    Ok(apps)
}

/// Returns `true` if `app_id` is installed on `device`.
pub async fn is_installed(
    bridge: &dyn DeviceBridge,
    device: &str,
    app_id: &str,
) -> Result<bool, BridgeError> {
    let apps = list_installed_apps(bridge, device).await?;
    Ok(apps.iter().any(|a| a == app_id))
}

/// Launches the app at `endpoint` and, if the launch succeeded, waits
/// `settle` for it to come up.
///
/// Callers treat a launch failure as non-fatal; it is logged here and
/// returned so they can decide.
pub async fn launch_and_settle(
    bridge: &dyn DeviceBridge,
    endpoint: &Endpoint,
    settle: Duration,
) -> Result<(), BridgeError> {
    match bridge.launch_app(&endpoint.device, &endpoint.app_id).await {
        Ok(()) => {
            debug!(endpoint = %endpoint, settle_ms = settle.as_millis() as u64, "app launched");
            tokio::time::sleep(settle).await;
            Ok(())
        }
        Err(e) => {
            warn!(endpoint = %endpoint, error = %e, "app launch failed, continuing");
            Err(e)
        }
    }
}
