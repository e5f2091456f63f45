use axum::Json;
use serde_json::{Value, json};

/// Health check handler
///
/// Returns `{"message": "Server is running"}`.
pub async fn health_check() -> Json<Value> {
    Json(json!({ "message": "Server is running" }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_health_check() {
        let Json(body) = health_check().await;
        assert_eq!(body, json!({"message": "Server is running"}));
    }
}
