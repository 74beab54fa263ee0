use portal_core::error::AppError;
use serde::{Deserialize, Serialize};

/// Wrapper every backend endpoint answers with.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    // missing `data`/`message` deserialize as None
    pub data: Option<T>,
    pub message: Option<String>,
}

impl<T> ApiResponse<T> {
    /// `Ok(data)` for a successful envelope; `Rejected` carrying the backend's
    /// message otherwise. `data` may legitimately be absent (no subscription yet).
    pub fn into_result(self) -> Result<Option<T>, AppError> {
        if self.success {
            Ok(self.data)
        } else {
            Err(AppError::Rejected(
                self.message
                    .unwrap_or_else(|| "Request was not successful".to_string()),
            ))
        }
    }

    /// Like [`into_result`](Self::into_result) but treats missing data as an error.
    pub fn into_data(self, what: &str) -> Result<T, AppError> {
        self.into_result()?.ok_or_else(|| {
            AppError::InternalError(anyhow::anyhow!("Backend response has no {}", what))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_with_data() {
        let envelope: ApiResponse<u32> =
            serde_json::from_str(r#"{"success": true, "data": 5}"#).unwrap();
        assert_eq!(envelope.into_data("count").unwrap(), 5);
    }

    #[test]
    fn test_success_without_data() {
        let envelope: ApiResponse<u32> =
            serde_json::from_str(r#"{"success": true, "data": null}"#).unwrap();
        assert!(envelope.into_result().unwrap().is_none());
    }

    #[test]
    fn test_failure_carries_message() {
        let envelope: ApiResponse<u32> =
            serde_json::from_str(r#"{"success": false, "message": "Plan not available"}"#)
                .unwrap();
        match envelope.into_result() {
            Err(AppError::Rejected(msg)) => assert_eq!(msg, "Plan not available"),
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
