//! Protocol constants shared with the receiver app.

/// Tag of the file transfer channel.
pub const FILE_TAG: &str = "file";

/// Reserved tag of the handshake channel. Never used for data messages.
pub const HANDSHAKE_TAG: &str = "__hs__";

/// Package name of the stock ebook receiver app.
pub const DEFAULT_APP_ID: &str = "com.bandbbs.ebook";

/// Some receivers report completion through a `next` event whose message
/// contains this marker.
pub const SUCCESS_MARKER: &str = "success";

/// Handshake frames with a sequence below this are answered with
/// `sequence + 1`; higher ones are not answered.
pub const HANDSHAKE_REPLY_LIMIT: u32 = 2;
