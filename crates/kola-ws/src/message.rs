//! Inbound websocket frames.

use crate::error::{WsError, WsResult};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One mirrored row.
pub type Record = Map<String, Value>;

/// Action carried by a data frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableAction {
    Partial,
    Insert,
    Update,
    Delete,
}

/// `{table, action, data, keys}`.
#[derive(Debug, Clone, Deserialize)]
pub struct DataFrame {
    pub table: String,
    pub action: TableAction,
    #[serde(default)]
    pub data: Vec<Record>,
    #[serde(default)]
    pub keys: Vec<String>,
}

/// `{subscribe, success, error}` acknowledgement.
#[derive(Debug, Clone, Deserialize)]
pub struct SubscribeAck {
    pub subscribe: String,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
}

/// `{status, error}` control frame.
#[derive(Debug, Clone, Deserialize)]
pub struct StatusFrame {
    pub status: u16,
    #[serde(default)]
    pub error: Option<String>,
}

/// Welcome banner sent after the handshake.
#[derive(Debug, Clone, Deserialize)]
pub struct InfoFrame {
    pub info: String,
    #[serde(default)]
    pub version: Option<String>,
}

/// Any frame the server may send.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WsFrame {
    Data(DataFrame),
    Subscribe(SubscribeAck),
    Status(StatusFrame),
    Info(InfoFrame),
    Other(Value),
}

impl WsFrame {
    pub fn parse(text: &str) -> WsResult<Self> {
        serde_json::from_str(text).map_err(|e| WsError::ParseError(format!("{e}: {text}")))
    }

    /// Turn control frames that end the session into errors.
    pub fn check_control(&self) -> WsResult<()> {
        match self {
            Self::Subscribe(ack) if !ack.success => Err(WsError::SubscriptionError(format!(
                "{}: {}",
                ack.subscribe,
                ack.error.as_deref().unwrap_or("unknown error")
            ))),
            Self::Status(frame) if matches!(frame.status, 400 | 401) => Err(WsError::Rejected {
                status: frame.status,
                error: frame.error.clone().unwrap_or_default(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_data_frame() {
        let frame = WsFrame::parse(
            r#"{"table":"quote","action":"partial","keys":["symbol"],
                "data":[{"symbol":"XBTUSD","bidPrice":9500.5,"askPrice":9501}]}"#,
        )
        .unwrap();
        match frame {
            WsFrame::Data(data) => {
                assert_eq!(data.table, "quote");
                assert_eq!(data.action, TableAction::Partial);
                assert_eq!(data.keys, vec!["symbol".to_string()]);
                assert_eq!(data.data.len(), 1);
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[test]
    fn test_control_frames() {
        let ok = WsFrame::parse(r#"{"success":true,"subscribe":"trade:XBTUSD"}"#).unwrap();
        assert!(matches!(ok, WsFrame::Subscribe(_)));
        assert!(ok.check_control().is_ok());

        let failed = WsFrame::parse(
            r#"{"success":false,"subscribe":"order:XBTUSD","error":"Not authenticated"}"#,
        )
        .unwrap();
        assert!(matches!(
            failed.check_control(),
            Err(WsError::SubscriptionError(_))
        ));

        let denied = WsFrame::parse(r#"{"status":401,"error":"Invalid API Key."}"#).unwrap();
        let err = denied.check_control().unwrap_err();
        assert!(err.is_fatal());

        let info = WsFrame::parse(r#"{"info":"Welcome","version":"2.0"}"#).unwrap();
        assert!(matches!(info, WsFrame::Info(_)));
        assert!(matches!(
            WsFrame::parse(r#"{"foo":1}"#).unwrap(),
            WsFrame::Other(_)
        ));
    }

    #[test]
    fn test_parse_garbage() {
        assert!(matches!(
            WsFrame::parse("not json"),
            Err(WsError::ParseError(_))
        ));
    }
}
