//! Ebook transfer to a wearable reader app.
//!
//! A [`TransferSession`] pushes one text file to the receiver app through a
//! host [`DeviceBridge`](bandbridge_host::DeviceBridge): handshake, launch,
//! start message, then one chunk per receiver request until the receiver
//! confirms, cancels, or something fails. Resuming a partial copy on the
//! device is handled transparently.

pub mod config;
pub mod error;
pub mod flow;
pub mod handshake;
pub mod session;
pub mod types;

pub use config::SessionConfig;
pub use error::SessionError;
pub use flow::{FlowController, PreparedChunk};
pub use handshake::HandshakeNegotiator;
pub use session::TransferSession;
pub use types::{CancelOrigin, TransferEvent};

pub use bandbridge_transfer::{SourceFile, TransferSnapshot, TransferState};
