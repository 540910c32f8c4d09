use serde::Serialize;

/// Success envelope shared by every endpoint: `{success, message, data?}`.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
        }
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_with_data() {
        let json =
            serde_json::to_value(ApiResponse::ok("done", vec![1, 2, 3])).expect("serialize");
        assert_eq!(json["success"], true);
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"][2], 3);
    }

    #[test]
    fn message_only_envelope_omits_data() {
        let json = serde_json::to_value(ApiResponse::message("Check your email!"))
            .expect("serialize");
        assert_eq!(json["success"], true);
        assert!(json.get("data").is_none());
    }
}
