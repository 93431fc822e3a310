use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Outbound commands (companion -> receiver)
// ---------------------------------------------------------------------------

/// Command sent on the file channel, discriminated by `stat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stat")]
pub enum FileCommand {
    /// Announces a new file. `chunk_size` is the nominal chunk size, not the
    /// character stride used to cut the content.
    #[serde(rename = "startTransfer")]
    StartTransfer {
        filename: String,
        total: usize,
        #[serde(rename = "chunkSize")]
        chunk_size: usize,
    },

    /// One chunk of content. `set_count` is `null` for forward progress and
    /// equals `count` when the chunk is a resend.
    #[serde(rename = "d")]
    Data {
        count: usize,
        data: String,
        #[serde(rename = "setCount")]
        set_count: Option<usize>,
    },

    /// Aborts the transfer on the receiver.
    #[serde(rename = "cancel")]
    Cancel,

    /// Asks the receiver to report its storage usage with a `ready` event.
    #[serde(rename = "getUsage")]
    GetUsage,
}

impl FileCommand {
    /// Builds a data chunk command.
    pub fn data(count: usize, data: impl Into<String>, is_resend: bool) -> Self {
        FileCommand::Data {
            count,
            data: data.into(),
            set_count: is_resend.then_some(count),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound events (receiver -> companion)
// ---------------------------------------------------------------------------

/// Event received on the file channel, discriminated by `type`.
///
/// Fields are lenient: receivers written in JavaScript may omit fields or
/// send integral values as floats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FileEvent {
    /// Receiver is ready. Reports its storage usage and whether a partial
    /// copy of the file already exists.
    Ready {
        #[serde(default, deserialize_with = "lenient::integer")]
        usage: u64,
        #[serde(default)]
        found: bool,
        #[serde(default, deserialize_with = "lenient::integer")]
        length: u64,
    },

    /// Receiver failed to store chunk `count` and wants it again.
    Error {
        #[serde(deserialize_with = "lenient::integer")]
        count: usize,
        #[serde(default)]
        message: String,
    },

    /// Receiver stored the whole file.
    Success {
        #[serde(default)]
        message: String,
        #[serde(default, deserialize_with = "lenient::integer")]
        count: usize,
    },

    /// Receiver wants chunk `count` next.
    Next {
        #[serde(deserialize_with = "lenient::integer")]
        count: usize,
        #[serde(default)]
        message: String,
    },

    /// Receiver aborted the transfer.
    Cancel,
}

impl FileEvent {
    /// Wire name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            FileEvent::Ready { .. } => "ready",
            FileEvent::Error { .. } => "error",
            FileEvent::Success { .. } => "success",
            FileEvent::Next { .. } => "next",
            FileEvent::Cancel => "cancel",
        }
    }
}

// ---------------------------------------------------------------------------
// Handshake
// ---------------------------------------------------------------------------

/// Body of a handshake message. The sequence travels as `count`; `sequence`
/// is accepted when decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandshakeFrame {
    #[serde(rename = "count", alias = "sequence", deserialize_with = "lenient::integer")]
    pub sequence: u32,
}

impl HandshakeFrame {
    pub fn new(sequence: u32) -> Self {
        Self { sequence }
    }
}

mod lenient {
    use serde::{Deserialize, Deserializer, de::Error};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Number {
        Int(u64),
        Float(f64),
    }

    /// Accepts a non-negative integer, also when encoded as an integral float.
    pub fn integer<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: TryFrom<u64>,
    {
        let value = match Number::deserialize(deserializer)? {
            Number::Int(v) => v,
            Number::Float(f) if f.is_finite() && f >= 0.0 && f.fract() == 0.0 => f as u64,
            Number::Float(f) => {
                return Err(D::Error::custom(format!("expected a non-negative integer, got {f}")));
            }
        };
        T::try_from(value).map_err(|_| D::Error::custom(format!("integer out of range: {value}")))
    }
}
