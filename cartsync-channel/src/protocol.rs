//! Wire envelopes exchanged with the page script.
//!
//! Requests are `{action, ...params, id}`; replies are `{id, result}` or
//! `{id, error}`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use cartsync_core::{RecordId, SyncError};

/// Actions the page script understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ChannelRequest {
    /// List records in a window. Dates are in the retailer's own format.
    #[serde(rename_all = "camelCase")]
    FetchRecords { start_date: String, end_date: String },
    /// Sent as `orderId`; `id` on the envelope is the correlation id.
    FetchRecordDetail {
        #[serde(rename = "orderId")]
        record_id: RecordId,
    },
    CheckLogin,
    Ping,
}

impl ChannelRequest {
    pub fn action(&self) -> &'static str {
        match self {
            ChannelRequest::FetchRecords { .. } => "fetchRecords",
            ChannelRequest::FetchRecordDetail { .. } => "fetchRecordDetail",
            ChannelRequest::CheckLogin => "checkLogin",
            ChannelRequest::Ping => "ping",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestEnvelope {
    #[serde(flatten)]
    pub request: ChannelRequest,
    pub id: u64,
}

/// Error reported by the page script, either a bare message or `{kind, message}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RemoteError {
    Message(String),
    Detailed {
        #[serde(default)]
        kind: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

impl RemoteError {
    /// The reported message, falling back to the kind when the peer sent none.
    pub fn message(&self) -> String {
        match self {
            RemoteError::Message(message) => message.clone(),
            RemoteError::Detailed {
                message: Some(message),
                ..
            } => message.clone(),
            RemoteError::Detailed {
                kind: Some(kind), ..
            } => kind.clone(),
            RemoteError::Detailed { .. } => "unspecified remote error".to_string(),
        }
    }
}

impl From<RemoteError> for SyncError {
    fn from(err: RemoteError) -> Self {
        let message = err.message();
        match err {
            RemoteError::Detailed {
                kind: Some(kind), ..
            } if kind == "UnknownAction" => SyncError::UnknownAction(message),
            RemoteError::Message(_) if message.starts_with("Unknown action") => {
                SyncError::UnknownAction(message)
            }
            _ => SyncError::Remote(message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub id: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
}

impl ResponseEnvelope {
    pub fn ok(id: u64, result: Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn err(id: u64, error: RemoteError) -> Self {
        Self {
            id,
            result: None,
            error: Some(error),
        }
    }

    /// `error` wins when both are present. A missing `result` reads as `null`.
    pub fn into_result(self) -> Result<Value, SyncError> {
        match self.error {
            Some(error) => Err(error.into()),
            None => Ok(self.result.unwrap_or(Value::Null)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_envelope_is_flat() {
        let envelope = RequestEnvelope {
            request: ChannelRequest::FetchRecords {
                start_date: "07/21/2026".into(),
                end_date: "10/19/2026".into(),
            },
            id: 4,
        };
        let value = serde_json::to_value(&envelope).expect("encode");
        assert_eq!(
            value,
            json!({"action": "fetchRecords", "startDate": "07/21/2026", "endDate": "10/19/2026", "id": 4})
        );
    }

    #[test]
    fn unit_actions_encode_with_only_action_and_id() {
        let value = serde_json::to_value(RequestEnvelope {
            request: ChannelRequest::CheckLogin,
            id: 1,
        })
        .expect("encode");
        assert_eq!(value, json!({"action": "checkLogin", "id": 1}));
    }

    #[test]
    fn detail_request_keeps_record_and_correlation_ids_apart() {
        let wire = serde_json::to_string(&RequestEnvelope {
            request: ChannelRequest::FetchRecordDetail {
                record_id: RecordId::from("112-9"),
            },
            id: 7,
        })
        .expect("encode");
        assert_eq!(wire.matches("\"id\"").count(), 1, "wire: {wire}");

        let parsed: Value = serde_json::from_str(&wire).expect("parse");
        assert_eq!(
            parsed,
            json!({"action": "fetchRecordDetail", "orderId": "112-9", "id": 7})
        );
        let decoded: RequestEnvelope = serde_json::from_str(&wire).expect("decode");
        assert_eq!(
            decoded.request,
            ChannelRequest::FetchRecordDetail {
                record_id: RecordId::from("112-9")
            }
        );
        assert_eq!(decoded.id, 7);
    }

    #[test]
    fn error_reply_maps_unknown_action() {
        let reply: ResponseEnvelope = serde_json::from_value(
            json!({"id": 3, "error": {"kind": "UnknownAction", "message": "frobnicate"}}),
        )
        .expect("decode");
        let err = reply.into_result().unwrap_err();
        assert!(matches!(err, SyncError::UnknownAction(_)), "got: {err}");
    }

    #[test]
    fn error_without_message_still_settles_the_call() {
        let reply: ResponseEnvelope =
            serde_json::from_str(r#"{"id":5,"error":{"kind":"UnknownAction"}}"#).expect("decode");
        assert_eq!(reply.id, 5);
        let err = reply.into_result().unwrap_err();
        assert!(matches!(err, SyncError::UnknownAction(ref m) if m == "UnknownAction"), "got: {err}");

        let reply: ResponseEnvelope =
            serde_json::from_str(r#"{"id":6,"error":{}}"#).expect("decode");
        let err = reply.into_result().unwrap_err();
        assert!(matches!(err, SyncError::Remote(_)), "got: {err}");
    }

    #[test]
    fn bare_error_string_is_remote_error() {
        let reply: ResponseEnvelope =
            serde_json::from_value(json!({"id": 3, "error": "Not logged in"})).expect("decode");
        let err = reply.into_result().unwrap_err();
        assert!(matches!(err, SyncError::Remote(ref m) if m == "Not logged in"), "got: {err}");
    }

    #[test]
    fn null_result_is_a_value() {
        let reply: ResponseEnvelope =
            serde_json::from_value(json!({"id": 5, "result": null})).expect("decode");
        assert_eq!(reply.into_result().expect("ok"), Value::Null);
    }
}
