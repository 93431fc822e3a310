//! In-process stand-in for the receiver app on the wearable.
//!
//! Implements [`DeviceBridge`] by answering each message the way the real
//! receiver does: echoing the handshake, reporting storage on start, and
//! asking for the next chunk after storing one.

use std::collections::BTreeMap;
use std::sync::Mutex;

use serde_json::Value;
use tracing::{debug, info, warn};

use bandbridge_host::{BridgeError, BridgeFuture, DeviceBridge, Endpoint, InboundNotification, InboundSender};
use bandbridge_protocol::constants::HANDSHAKE_REPLY_LIMIT;
use bandbridge_protocol::{FILE_TAG, FileCommand, FileEvent, HANDSHAKE_TAG, HandshakeFrame, encode, encode_handshake};

use crate::config::ReceiverConfig;

#[derive(Default)]
struct ReceiverState {
    filename: Option<String>,
    total: usize,
    chunks: BTreeMap<usize, String>,
    rejected: bool,
}

pub struct SimulatedReceiver {
    app_id: String,
    config: ReceiverConfig,
    inbound: InboundSender,
    state: Mutex<ReceiverState>,
}

impl SimulatedReceiver {
    pub fn new(app_id: impl Into<String>, config: ReceiverConfig, inbound: InboundSender) -> Self {
        Self {
            app_id: app_id.into(),
            config,
            inbound,
            state: Mutex::new(ReceiverState::default()),
        }
    }

    /// Content stored so far, in chunk order.
    pub fn received(&self) -> String {
        self.state.lock().unwrap().chunks.values().map(String::as_str).collect()
    }

    pub fn filename(&self) -> Option<String> {
        self.state.lock().unwrap().filename.clone()
    }

    fn reply(&self, payload: String) {
        let value = match serde_json::from_str::<Value>(&payload) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "dropping unencodable reply");
                return;
            }
        };
        if let Err(e) = self.inbound.try_send(InboundNotification::new(&self.app_id, value)) {
            warn!(error = %e, "inbound channel rejected reply");
        }
    }

    fn reply_event(&self, event: &FileEvent) {
        match encode(FILE_TAG, event) {
            Ok(payload) => self.reply(payload),
            Err(e) => warn!(error = %e, "failed to encode reply"),
        }
    }

    fn on_message(&self, payload: &str) -> Result<(), BridgeError> {
        let value: Value =
            serde_json::from_str(payload).map_err(|e| BridgeError::Send(format!("not JSON: {e}")))?;
        let tag = value.get("tag").and_then(Value::as_str).unwrap_or_default();

        match tag {
            HANDSHAKE_TAG => {
                let frame: HandshakeFrame = serde_json::from_value(value)
                    .map_err(|e| BridgeError::Send(format!("bad handshake: {e}")))?;
                if frame.sequence < HANDSHAKE_REPLY_LIMIT {
                    match encode_handshake(frame.sequence + 1) {
                        Ok(reply) => self.reply(reply),
                        Err(e) => warn!(error = %e, "failed to encode handshake reply"),
                    }
                }
                Ok(())
            }
            FILE_TAG => {
                let command: FileCommand = serde_json::from_value(value)
                    .map_err(|e| BridgeError::Send(format!("bad file command: {e}")))?;
                self.on_command(command);
                Ok(())
            }
            other => Err(BridgeError::Send(format!("unknown tag {other:?}"))),
        }
    }

    fn on_command(&self, command: FileCommand) {
        match command {
            FileCommand::StartTransfer { filename, total, chunk_size } => {
                info!(%filename, total, chunk_size, "receiver: transfer announced");
                *self.state.lock().unwrap() = ReceiverState {
                    filename: Some(filename),
                    total,
                    ..Default::default()
                };
                self.reply_event(&self.ready());
            }
            FileCommand::Data { count, data, set_count } => {
                let reject = {
                    let mut state = self.state.lock().unwrap();
                    if self.config.fail_chunk == Some(count) && !state.rejected {
                        state.rejected = true;
                        true
                    } else {
                        state.chunks.insert(count, data);
                        false
                    }
                };
                if reject {
                    warn!(count, "receiver: rejecting chunk once");
                    self.reply_event(&FileEvent::Error {
                        count,
                        message: "write failed".into(),
                    });
                    return;
                }

                debug!(count, resend = set_count.is_some(), "receiver: chunk stored");
                let total = self.state.lock().unwrap().total;
                if count + 1 >= total {
                    self.reply_event(&FileEvent::Success {
                        message: "success".into(),
                        count: total,
                    });
                } else {
                    self.reply_event(&FileEvent::Next {
                        count: count + 1,
                        message: String::new(),
                    });
                }
            }
            FileCommand::Cancel => info!("receiver: transfer cancelled"),
            FileCommand::GetUsage => self.reply_event(&self.ready()),
        }
    }

    fn ready(&self) -> FileEvent {
        FileEvent::Ready {
            usage: self.config.storage_usage,
            found: false,
            length: 0,
        }
    }
}

impl DeviceBridge for SimulatedReceiver {
    fn send_message<'a>(&'a self, _endpoint: &'a Endpoint, payload: String) -> BridgeFuture<'a, ()> {
        Box::pin(async move { self.on_message(&payload) })
    }

    fn launch_app<'a>(&'a self, device: &'a str, app_id: &'a str) -> BridgeFuture<'a, ()> {
        Box::pin(async move {
            debug!(device, app_id, "receiver: launched");
            Ok(())
        })
    }

    fn list_apps<'a>(&'a self, _device: &'a str) -> BridgeFuture<'a, Vec<String>> {
        Box::pin(async move { Ok(vec![self.app_id.clone()]) })
    }
}
