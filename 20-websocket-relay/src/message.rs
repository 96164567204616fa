use serde::{Deserialize, Serialize};

pub const SENT_STATUS: &str = "Message sent";

/// Body of `POST /send-message`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageRequest {
    pub sender: String,
    pub receiver: String,
    pub message: String,
}

impl SendMessageRequest {
    /// Text pushed to the receiver, e.g. `[alice]: hi`.
    pub fn relay_text(&self) -> String {
        format!("[{}]: {}", self.sender, self.message)
    }
}

/// Acknowledgment returned for every accepted submission, delivered or not.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SendMessageResponse {
    pub status: String,
}

impl SendMessageResponse {
    pub fn sent() -> Self {
        Self {
            status: SENT_STATUS.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relay_text_prefixes_sender() {
        let request = SendMessageRequest {
            sender: "alice".into(),
            receiver: "bob".into(),
            message: "hi".into(),
        };
        assert_eq!(request.relay_text(), "[alice]: hi");
    }

    #[test]
    fn request_decodes_from_client_json() {
        let request: SendMessageRequest =
            serde_json::from_str(r#"{"sender":"user1","receiver":"user2","message":"hello there"}"#)
                .expect("valid request");
        assert_eq!(request.receiver, "user2");
        assert_eq!(request.relay_text(), "[user1]: hello there");
    }

    #[test]
    fn request_requires_every_field() {
        let result = serde_json::from_str::<SendMessageRequest>(r#"{"sender":"a","message":"b"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn acknowledgment_matches_wire_shape() {
        let encoded = serde_json::to_value(SendMessageResponse::sent()).expect("encode");
        assert_eq!(encoded, serde_json::json!({ "status": "Message sent" }));
    }
}
