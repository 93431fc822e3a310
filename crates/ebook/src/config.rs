//! Session configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use bandbridge_protocol::DEFAULT_APP_ID;
use bandbridge_transfer::DEFAULT_CHUNK_SIZE;

/// Default storage ceiling on the device: 25 MiB.
pub const DEFAULT_STORAGE_CEILING: u64 = 25 * 1024 * 1024;

/// Default handshake timeout.
pub const DEFAULT_HANDSHAKE_TIMEOUT: Duration = Duration::from_millis(3000);

/// Default wait after launching the receiver app.
pub const DEFAULT_LAUNCH_SETTLE: Duration = Duration::from_millis(1000);

/// Configuration of a transfer session, fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Package name of the receiver app.
    #[serde(default = "default_app_id")]
    pub app_id: String,

    /// Nominal chunk size in bytes.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Device storage usage above which a transfer is refused, in bytes.
    #[serde(default = "default_storage_ceiling")]
    pub storage_ceiling: u64,

    /// How long to wait for the handshake, in milliseconds.
    #[serde(default = "default_handshake_timeout_ms")]
    pub handshake_timeout_ms: u64,

    /// How long to let the receiver app start after launching it, in
    /// milliseconds.
    #[serde(default = "default_launch_settle_ms")]
    pub launch_settle_ms: u64,
}

fn default_app_id() -> String {
    DEFAULT_APP_ID.into()
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_storage_ceiling() -> u64 {
    DEFAULT_STORAGE_CEILING
}

fn default_handshake_timeout_ms() -> u64 {
    DEFAULT_HANDSHAKE_TIMEOUT.as_millis() as u64
}

fn default_launch_settle_ms() -> u64 {
    DEFAULT_LAUNCH_SETTLE.as_millis() as u64
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app_id: default_app_id(),
            chunk_size: default_chunk_size(),
            storage_ceiling: default_storage_ceiling(),
            handshake_timeout_ms: default_handshake_timeout_ms(),
            launch_settle_ms: default_launch_settle_ms(),
        }
    }
}

impl SessionConfig {
    pub fn handshake_timeout(&self) -> Duration {
        Duration::from_millis(self.handshake_timeout_ms)
    }

    pub fn launch_settle(&self) -> Duration {
        Duration::from_millis(self.launch_settle_ms)
    }
}
