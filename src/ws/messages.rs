//! Inbound viewer commands.
//!
//! Outbound messages are [`crate::domain::StateChangeEvent`]s serialized as
//! they are. Inbound text frames are JSON objects tagged by `"type"`:
//!
//! ```json
//! {"type": "bid", "bidder_name": "alice", "amount": 600}
//! {"type": "start", "item_name": "GPU", "opening_price": 500}
//! ```

use serde_json::Value;

use crate::domain::{BidRequest, StartRequest};

/// A command sent by a viewer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientCommand {
    /// Place a bid on the running auction.
    Bid(BidRequest),
    /// Reset the auction with a new item.
    Start(StartRequest),
}

/// Why an inbound frame could not be turned into a [`ClientCommand`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InboundError {
    /// Not a protocol message at all. The connection is closed.
    #[error("malformed message: {0}")]
    Malformed(String),

    /// A known command with unusable fields. The connection stays open.
    #[error("invalid {command}: {reason}")]
    Invalid {
        /// Command type the frame named.
        command: &'static str,
        /// Decoder complaint.
        reason: String,
    },
}

impl InboundError {
    /// Returns `true` if the connection must be closed after replying.
    #[must_use]
    pub const fn closes_connection(&self) -> bool {
        matches!(self, Self::Malformed(_))
    }
}

/// Parses one inbound text frame.
///
/// # Errors
///
/// Returns [`InboundError::Malformed`] for non-JSON text or a missing or
/// unknown `type`, and [`InboundError::Invalid`] when a known command has
/// missing or mistyped fields.
pub fn parse_command(text: &str) -> Result<ClientCommand, InboundError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|err| InboundError::Malformed(format!("not valid JSON ({err})")))?;

    let kind = value
        .get("type")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| InboundError::Malformed("missing `type` field".into()))?;

    match kind.as_str() {
        "bid" => serde_json::from_value(value)
            .map(ClientCommand::Bid)
            .map_err(|err| InboundError::Invalid {
                command: "bid",
                reason: err.to_string(),
            }),
        "start" => serde_json::from_value(value)
            .map(ClientCommand::Start)
            .map_err(|err| InboundError::Invalid {
                command: "start",
                reason: err.to_string(),
            }),
        other => Err(InboundError::Malformed(format!("unknown type `{other}`"))),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn parses_bid() {
        let cmd = parse_command(r#"{"type":"bid","bidder_name":"alice","amount":600}"#);
        assert_eq!(cmd, Ok(ClientCommand::Bid(BidRequest::new("alice", 600))));
    }

    #[test]
    fn parses_bid_with_username_alias() {
        let cmd = parse_command(r#"{"type":"bid","username":"bob","amount":7}"#);
        assert_eq!(cmd, Ok(ClientCommand::Bid(BidRequest::new("bob", 7))));
    }

    #[test]
    fn parses_start_with_amount_alias() {
        let Ok(ClientCommand::Start(req)) =
            parse_command(r#"{"type":"start","item_name":"GPU","amount":500}"#)
        else {
            panic!("expected start");
        };
        assert_eq!(req.item_name, "GPU");
        assert_eq!(req.opening_price, 500);
    }

    #[test]
    fn non_json_is_malformed() {
        let Err(err) = parse_command("bid 600") else {
            panic!("expected error");
        };
        assert!(err.closes_connection());
    }

    #[test]
    fn missing_or_unknown_type_is_malformed() {
        for text in [r#"{"amount":5}"#, r#"{"type":"refund"}"#, r#"{"type":7}"#, "[]"] {
            let Err(err) = parse_command(text) else {
                panic!("expected error for {text}");
            };
            assert!(err.closes_connection(), "{text}");
        }
    }

    #[test]
    fn non_numeric_amount_is_invalid_but_recoverable() {
        let Err(err) = parse_command(r#"{"type":"bid","bidder_name":"alice","amount":"lots"}"#)
        else {
            panic!("expected error");
        };
        assert!(!err.closes_connection());
        assert!(err.to_string().starts_with("invalid bid"));
    }

    #[test]
    fn missing_start_fields_are_invalid() {
        let Err(err) = parse_command(r#"{"type":"start"}"#) else {
            panic!("expected error");
        };
        assert!(matches!(err, InboundError::Invalid { command: "start", .. }));
    }
}
