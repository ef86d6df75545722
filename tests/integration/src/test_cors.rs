//! CORS preflight tests.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use cdproxy_backend::HttpBackend;
    use cdproxy_http::ProxyHttpConfig;

    use crate::{spawn_proxy, spawn_upstream};

    async fn spawn_cors_proxy() -> String {
        let upstream = spawn_upstream().await;
        let config = ProxyHttpConfig {
            cors_allowed_origins: vec!["https://data.example.nl".to_owned()],
            ..ProxyHttpConfig::default()
        };
        spawn_proxy(Arc::new(HttpBackend::new(upstream).unwrap()), config).await
    }

    fn preflight(base: &str, origin: &str) -> reqwest::RequestBuilder {
        reqwest::Client::new()
            .request(reqwest::Method::OPTIONS, format!("{base}/file.zip"))
            .header("origin", origin)
            .header("access-control-request-method", "GET")
    }

    #[tokio::test]
    async fn test_should_answer_preflight_for_allowed_origin() {
        let base = spawn_cors_proxy().await;

        let resp = preflight(&base, "https://data.example.nl").send().await.unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        let headers = resp.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "https://data.example.nl"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
        assert_eq!(headers["access-control-allow-methods"], "GET, OPTIONS");
        assert_eq!(headers["access-control-max-age"], "86400");
    }

    #[tokio::test]
    async fn test_should_not_name_unknown_origin() {
        let base = spawn_cors_proxy().await;

        let resp = preflight(&base, "https://elsewhere.example").send().await.unwrap();

        assert_eq!(resp.status(), reqwest::StatusCode::OK);
        assert!(!resp.headers().contains_key("access-control-allow-origin"));
    }
}
