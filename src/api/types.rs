//! Response envelopes shared by the resource handlers.

use serde::Serialize;

/// Self-referential retrieval link attached to list items and confirmations
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestLink {
    #[serde(rename = "type")]
    pub method: &'static str,
    pub url: String,
}

impl RequestLink {
    /// `GET <base_url>/<resource>/<id>`
    pub fn get(base_url: &str, resource: &str, id: &str) -> Self {
        Self {
            method: "GET",
            url: format!("{}/{}/{}", base_url, resource, id),
        }
    }
}

/// Plain confirmation, optionally pointing back at the affected record
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<RequestLink>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            request: None,
        }
    }

    pub fn with_request(mut self, request: RequestLink) -> Self {
        self.request = Some(request);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_link_shape() {
        let link = RequestLink::get("https://food.example", "meals", "abc");
        let json = serde_json::to_value(&link).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"type": "GET", "url": "https://food.example/meals/abc"})
        );
    }

    #[test]
    fn test_message_without_request() {
        let json = serde_json::to_value(MessageResponse::new("Meal deleted")).unwrap();
        assert_eq!(json, serde_json::json!({"message": "Meal deleted"}));
    }
}
