use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::auth::Credentials;
use crate::error::{AppwriteError, ErrorBody, Result};
use crate::query::Query;

pub const DEFAULT_ENDPOINT: &str = "https://cloud.appwrite.io/v1";
const PROJECT_HEADER: &str = "X-Appwrite-Project";
const RESPONSE_FORMAT_HEADER: &str = "X-Appwrite-Response-Format";
const RESPONSE_FORMAT: &str = "1.6.0";
const DEFAULT_MAX_RETRIES: u32 = 5;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection context shared by every service handle.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    pub project_id: String,
    pub credentials: Credentials,
    pub timeout: Duration,
    /// Attempts made after a 429/503 before giving up.
    pub max_retries: u32,
}

impl ClientConfig {
    pub fn new(endpoint: impl Into<String>, project_id: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            project_id: project_id.into(),
            credentials: Credentials::Anonymous,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }
}

#[derive(Clone)]
pub struct AppwriteClient {
    endpoint: String,
    project_id: String,
    credentials: Credentials,
    http: reqwest::Client,
    max_retries: u32,
}

impl AppwriteClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let parsed = Url::parse(&endpoint)
            .map_err(|e| AppwriteError::InvalidUrl(format!("{endpoint}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(AppwriteError::InvalidUrl(format!(
                "{endpoint}: endpoint must be http or https"
            )));
        }
        if config.project_id.is_empty() {
            return Err(AppwriteError::InvalidArgument(
                "project id must not be empty".into(),
            ));
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(AppwriteError::Http)?;

        Ok(Self {
            endpoint,
            project_id: config.project_id,
            credentials: config.credentials,
            http,
            max_retries: config.max_retries,
        })
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{path}", self.endpoint)
    }

    /// Absolute URL for a resource that is fetched directly by browsers or
    /// other clients, carrying the project id as a query parameter.
    pub(crate) fn resource_url(&self, path: &str, params: &[(&str, String)]) -> Result<Url> {
        let raw = self.url(path);
        let mut url = Url::parse(&raw).map_err(|e| AppwriteError::InvalidUrl(format!("{raw}: {e}")))?;
        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            pairs.append_pair("project", &self.project_id);
        }
        Ok(url)
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        queries: &[Query],
    ) -> Result<T> {
        let params = Query::to_params(queries)?;
        let url = self.url(path);
        let resp = self
            .execute(Method::GET, &url, |req| Ok(req.query(&params)))
            .await?;
        decode(resp, &url).await
    }

    pub(crate) async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.url(path);
        let resp = self
            .execute(method, &url, |req| Ok(req.json(body)))
            .await?;
        decode(resp, &url).await
    }

    pub(crate) async fn delete(&self, path: &str) -> Result<()> {
        let url = self.url(path);
        self.execute(Method::DELETE, &url, Ok).await?;
        Ok(())
    }

    /// Send a request built by `build`, retrying on 429/503.
    ///
    /// `build` runs once per attempt so request bodies that cannot be cloned
    /// (multipart forms) are rebuilt each time.
    pub(crate) async fn execute<F>(&self, method: Method, url: &str, build: F) -> Result<Response>
    where
        F: Fn(RequestBuilder) -> Result<RequestBuilder>,
    {
        let mut retries = 0;
        loop {
            let req = self
                .http
                .request(method.clone(), url)
                .header(PROJECT_HEADER, &self.project_id)
                .header(RESPONSE_FORMAT_HEADER, RESPONSE_FORMAT);
            let req = build(self.credentials.apply(req))?;

            let resp = req
                .send()
                .await
                .map_err(|source| AppwriteError::Transport {
                    method: method.clone(),
                    url: url.to_string(),
                    source,
                })?;

            let status = resp.status();

            if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
            {
                retries += 1;
                if retries > self.max_retries {
                    return Err(AppwriteError::RetriesExhausted {
                        url: url.to_string(),
                        status,
                    });
                }
                let retry_after = resp
                    .headers()
                    .get("Retry-After")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(2u64.pow(retries.min(6)));
                warn!(url = %url, retry_after, retries, "rate limited, backing off");
                tokio::time::sleep(Duration::from_secs(retry_after)).await;
                continue;
            }

            if !status.is_success() {
                let body = resp.text().await.unwrap_or_default();
                return Err(ErrorBody::into_error(status, &body));
            }

            debug!(method = %method, url = %url, status = status.as_u16(), "OK");
            return Ok(resp);
        }
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(resp: Response, url: &str) -> Result<T> {
    resp.json().await.map_err(|source| AppwriteError::Decode {
        url: url.to_string(),
        source,
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub(crate) fn test_client(server: &MockServer) -> AppwriteClient {
        let config = ClientConfig::new(format!("{}/v1", server.uri()), "test-project")
            .with_credentials(Credentials::api_key("test-key"))
            .with_max_retries(2);
        AppwriteClient::new(config).unwrap()
    }

    #[test]
    fn rejects_bad_endpoint() {
        let err = AppwriteClient::new(ClientConfig::new("not a url", "p")).err();
        assert!(matches!(err, Some(AppwriteError::InvalidUrl(_))));

        let err = AppwriteClient::new(ClientConfig::new("ftp://example.com/v1", "p")).err();
        assert!(matches!(err, Some(AppwriteError::InvalidUrl(_))));
    }

    #[test]
    fn rejects_empty_project() {
        let err = AppwriteClient::new(ClientConfig::new(DEFAULT_ENDPOINT, "")).err();
        assert!(matches!(err, Some(AppwriteError::InvalidArgument(_))));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let client =
            AppwriteClient::new(ClientConfig::new("https://example.com/v1/", "p")).unwrap();
        assert_eq!(client.url("/health"), "https://example.com/v1/health");
    }

    #[test]
    fn resource_url_appends_project() {
        let client = AppwriteClient::new(ClientConfig::new("https://example.com/v1", "blog"))
            .unwrap();
        let url = client
            .resource_url("/storage/buckets/b/files/f/view", &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/v1/storage/buckets/b/files/f/view?project=blog"
        );
    }

    #[tokio::test]
    async fn sends_project_and_key_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .and(header("X-Appwrite-Project", "test-project"))
            .and(header("X-Appwrite-Key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pass"})))
            .expect(1)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let body: serde_json::Value = client.get_json("/health", &[]).await.unwrap();
        assert_eq!(body["status"], "pass");
    }

    #[tokio::test]
    async fn retries_after_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "pass"})))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let body: serde_json::Value = client.get_json("/health", &[]).await.unwrap();
        assert_eq!(body["status"], "pass");
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/health"))
            .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
            .expect(3)
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client
            .get_json::<serde_json::Value>("/health", &[])
            .await
            .unwrap_err();
        assert!(matches!(err, AppwriteError::RetriesExhausted { .. }));
        assert_eq!(err.status(), Some(StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn maps_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/thing"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "message": "The current user is not authorized to perform the requested action.",
                "code": 401,
                "type": "user_unauthorized",
                "version": "1.6.0"
            })))
            .mount(&server)
            .await;

        let client = test_client(&server);
        let err = client.delete("/thing").await.unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::UNAUTHORIZED));
        assert_eq!(err.kind(), Some("user_unauthorized"));
    }
}
