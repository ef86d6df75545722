//! Token verification tests.

#[cfg(test)]
mod tests {
    use crate::{
        REQUIRED_SCOPE, bearer, bearer_signed_with, bearer_unsigned, spawn_blob_proxy,
    };

    const OBJECTS: &[(&str, &[u8])] = &[("file.zip", b"0000" as &[u8])];

    async fn get_with_authorization(base: &str, authorization: &str) -> reqwest::Response {
        reqwest::Client::new()
            .get(format!("{base}/file.zip"))
            .header("authorization", authorization)
            .send()
            .await
            .expect("GET /file.zip")
    }

    #[tokio::test]
    async fn test_should_serve_caller_with_signed_token() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_authorization(&base, &bearer(&[REQUIRED_SCOPE])).await;

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"0000");
    }

    #[tokio::test]
    async fn test_should_reject_unsigned_token() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_authorization(&base, &bearer_unsigned(&[REQUIRED_SCOPE])).await;

        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn test_should_reject_token_signed_by_unknown_key() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let forged = bearer_signed_with(&[REQUIRED_SCOPE], b"attacker-secret-0123456789abcdef");
        let resp = get_with_authorization(&base, &forged).await;

        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_reject_tampered_scopes() {
        let base = spawn_blob_proxy(OBJECTS).await;

        // Swap the payload of a validly signed, unprivileged token.
        let privileged = bearer(&[REQUIRED_SCOPE]);
        let privileged_payload = privileged
            .trim_start_matches("Bearer ")
            .split('.')
            .nth(1)
            .unwrap();
        let signed = bearer(&[]);
        let mut segments: Vec<&str> = signed.trim_start_matches("Bearer ").split('.').collect();
        segments[1] = privileged_payload;

        let resp = get_with_authorization(&base, &format!("Bearer {}", segments.join("."))).await;

        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }
}
