//! Stream Codec
//!
//! Decodes inbound WebSocket frames into typed [`FeedMessage`]s and encodes
//! outbound [`ControlFrame`]s. Frames are JSON objects discriminated by a
//! top-level `type` field.
//!
//! Decode failures are recoverable by contract: the receive loop logs the
//! error, drops the frame, and keeps listening. A malformed frame must
//! never take the connection down.

use crate::infrastructure::finnhub::messages::{
    ControlFrame, ErrorMessage, SubscribeStatusMessage, TradeMessage, TradeTick,
};

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// The frame parsed as JSON but carried no `type` discriminator.
    #[error("frame has no type tag: {0}")]
    MissingTypeTag(String),
}

/// A decoded inbound frame.
#[derive(Debug, Clone)]
pub enum FeedMessage {
    /// Batch of trade ticks.
    Trades(Vec<TradeTick>),
    /// Keep-alive acknowledgment (`ping`/`pong`/`heartbeat`).
    Heartbeat,
    /// Per-symbol subscription confirmation/rejection.
    SubscribeStatus(SubscribeStatusMessage),
    /// Upstream error message.
    Error(String),
    /// Well-formed frame with an unknown type tag; logged and ignored.
    Unrecognized(serde_json::Value),
}

/// JSON codec for the streaming connection.
#[derive(Debug, Default, Clone)]
pub struct JsonCodec;

impl JsonCodec {
    /// Create a new JSON codec.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Decode an inbound text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not valid JSON, carries no `type`
    /// tag, or a known message kind fails to parse into its typed shape.
    pub fn decode(&self, text: &str) -> Result<FeedMessage, CodecError> {
        let value: serde_json::Value = serde_json::from_str(text)?;

        let Some(tag) = value.get("type").and_then(|t| t.as_str()) else {
            let preview: String = text.trim().chars().take(50).collect();
            return Err(CodecError::MissingTypeTag(preview));
        };

        match tag {
            "trade" | "price" => {
                let message: TradeMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Trades(message.data))
            }
            "ping" | "pong" | "heartbeat" => Ok(FeedMessage::Heartbeat),
            "subscribe-status" => {
                let message: SubscribeStatusMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::SubscribeStatus(message))
            }
            "error" => {
                let message: ErrorMessage = serde_json::from_value(value)?;
                Ok(FeedMessage::Error(message.msg))
            }
            _ => Ok(FeedMessage::Unrecognized(value)),
        }
    }

    /// Encode an outbound control frame to JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, frame: &ControlFrame) -> Result<String, CodecError> {
        Ok(serde_json::to_string(frame)?)
    }
}

// =============================================================================
// Tests
// =============================================================================
