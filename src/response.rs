//! Result shaping for callers: every service outcome becomes a `{success, ...}` document.

use crate::errors::{Error, ErrorKind};
use crate::services::ServiceResult;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum ApiResponse<T> {
    Success { success: bool, data: T },
    Failure { success: bool, error: String, kind: ErrorKind },
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        ApiResponse::Success { success: true, data }
    }

    pub fn error(e: &Error) -> Self {
        ApiResponse::Failure {
            success: false,
            error: format!("{}", e),
            kind: e.kind(),
        }
    }

    pub fn is_success(&self) -> bool {
        match self {
            ApiResponse::Success { .. } => true,
            ApiResponse::Failure { .. } => false,
        }
    }
}

impl<T> From<ServiceResult<T>> for ApiResponse<T> {
    fn from(result: ServiceResult<T>) -> Self {
        match result {
            Ok(data) => ApiResponse::ok(data),
            Err(e) => {
                if e.kind() == ErrorKind::Internal {
                    error!("{}", e);
                }
                ApiResponse::error(&e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_wraps_data() {
        let response = ApiResponse::from(Ok(vec![1, 2]));
        assert!(response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": true, "data": [1, 2]})
        );
    }

    #[test]
    fn failure_carries_message_and_kind() {
        let response: ApiResponse<()> = Err(Error::EmptyCart).into();
        assert!(!response.is_success());
        assert_eq!(
            serde_json::to_value(&response).unwrap(),
            json!({"success": false, "error": "Cart is empty for this store", "kind": "validation"})
        );
    }

    #[test]
    fn gateway_failure_keeps_gateway_message() {
        let response: ApiResponse<()> = Err(Error::Gateway("card_declined".to_string())).into();
        match response {
            ApiResponse::Failure { error, kind, .. } => {
                assert_eq!(kind, ErrorKind::ExternalService);
                assert!(error.ends_with("card_declined"));
            }
            ApiResponse::Success { .. } => panic!("expected failure"),
        }
    }
}
