//! Object-store mode download tests.

#[cfg(test)]
mod tests {
    use cdproxy_core::SCOPE_DENIED_MESSAGE;

    use crate::{REQUIRED_SCOPE, get_with_scopes, spawn_blob_proxy};

    const OBJECTS: &[(&str, &[u8])] = &[
        ("file.zip", b"0000" as &[u8]),
        ("sub/file.zip", b"sub-0000" as &[u8]),
        ("reports/2024 q1.csv", b"a,b\n1,2\n" as &[u8]),
    ];

    #[tokio::test]
    async fn test_should_download_object_as_attachment() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_scopes(&base, "/file.zip", &[REQUIRED_SCOPE]).await;

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"file.zip\""
        );
        assert_eq!(resp.headers()["content-type"], "application/zip");
        assert!(resp.headers().contains_key("x-request-id"));
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"0000");
    }

    #[tokio::test]
    async fn test_should_deny_caller_without_required_scope() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_scopes(&base, "/file.zip", &[]).await;

        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["detail"], SCOPE_DENIED_MESSAGE);
    }

    #[tokio::test]
    async fn test_should_deny_anonymous_caller() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = reqwest::get(format!("{base}/file.zip")).await.unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_should_reject_unreadable_token() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = reqwest::Client::new()
            .get(format!("{base}/file.zip"))
            .header("authorization", "Bearer not-a-jwt")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_should_reject_container_root() {
        let base = spawn_blob_proxy(OBJECTS).await;

        for path in ["/", "/bulk-data-fp-mdw/", "/sub/"] {
            let resp = get_with_scopes(&base, path, &[REQUIRED_SCOPE]).await;
            assert_eq!(resp.status(), reqwest::StatusCode::BAD_REQUEST, "{path}");
            assert!(resp.bytes().await.unwrap().is_empty());
        }
    }

    #[tokio::test]
    async fn test_should_report_missing_object() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_scopes(&base, "/non-file.zip", &[REQUIRED_SCOPE]).await;

        assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
        assert!(resp.bytes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_should_strip_ingress_prefix() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_scopes(
            &base,
            "/bulk-data-fp-mdw/sub/file.zip",
            &[REQUIRED_SCOPE],
        )
        .await;

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"file.zip\""
        );
        assert_eq!(resp.bytes().await.unwrap().as_ref(), b"sub-0000");
    }

    #[tokio::test]
    async fn test_should_decode_escaped_paths() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = get_with_scopes(&base, "/reports/2024%20q1.csv", &[REQUIRED_SCOPE]).await;

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert_eq!(
            resp.headers()["content-disposition"],
            "attachment; filename=\"2024 q1.csv\""
        );
        assert_eq!(resp.headers()["content-type"], "text/csv");
    }

    #[tokio::test]
    async fn test_should_answer_repeated_downloads_identically() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let mut seen = Vec::new();
        for _ in 0..3 {
            let resp = get_with_scopes(&base, "/file.zip", &[REQUIRED_SCOPE]).await;
            seen.push((resp.status(), resp.bytes().await.unwrap()));
        }

        assert!(seen.windows(2).all(|pair| pair[0] == pair[1]));
    }

    #[tokio::test]
    async fn test_should_reject_non_get_methods() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = reqwest::Client::new()
            .post(format!("{base}/file.zip"))
            .body("payload")
            .send()
            .await
            .unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(resp.headers()["allow"], "GET");
    }

    #[tokio::test]
    async fn test_should_report_status_online() {
        let base = spawn_blob_proxy(OBJECTS).await;

        let resp = reqwest::get(format!("{base}/status/")).await.unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = resp.json().await.unwrap();
        assert_eq!(body["status"], "online");
    }
}
