//! HTTP client abstraction.
//!
//! The store builds requests; an [`HttpClient`] moves them over the wire.
//! This keeps the protocol code independent of the HTTP library, so tests
//! can script responses and applications can bring their own client.

/// HTTP method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    /// GET.
    Get,
    /// POST.
    Post,
}

impl Method {
    /// Returns the method name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// A request to the search engine.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    /// Method.
    pub method: Method,
    /// Path, starting with `/`.
    pub path: String,
    /// Query string pairs, not yet encoded.
    pub query: Vec<(String, String)>,
    /// Request body.
    pub body: Option<String>,
    /// Content type of the body.
    pub content_type: &'static str,
}

impl HttpRequest {
    /// A GET without a body.
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            query: Vec::new(),
            body: None,
            content_type: JSON,
        }
    }

    /// A POST with a JSON body.
    pub fn post(path: impl Into<String>, body: String) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            query: Vec::new(),
            body: Some(body),
            content_type: JSON,
        }
    }

    /// Sets the query pairs.
    #[must_use]
    pub fn with_query(mut self, query: Vec<(String, String)>) -> Self {
        self.query = query;
        self
    }

    /// Sets the content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.content_type = content_type;
        self
    }
}

/// JSON content type.
pub const JSON: &str = "application/json";

/// Newline-delimited JSON content type, used by the bulk endpoint.
pub const NDJSON: &str = "application/x-ndjson";

/// A response from the search engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Raw body.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// Returns true for a 2xx status.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP client abstraction.
///
/// Implement this trait to provide the actual HTTP transport. An `Err`
/// means no response was received at all; any status code, including
/// errors, comes back as `Ok`.
pub trait HttpClient: Send + Sync {
    /// Sends a request to `url` and returns the response.
    fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String>;

    /// Checks if the client is connected/healthy.
    fn is_healthy(&self) -> bool {
        true
    }
}

#[cfg(feature = "reqwest")]
pub use self::blocking::ReqwestClient;

#[cfg(feature = "reqwest")]
mod blocking {
    use super::{HttpClient, HttpRequest, HttpResponse, Method};
    use crate::config::HttpStoreConfig;
    use elasticdata_core::{StoreError, StoreResult};
    use reqwest::header::CONTENT_TYPE;

    /// [`HttpClient`] backed by a blocking `reqwest` client.
    #[derive(Debug, Clone)]
    pub struct ReqwestClient {
        inner: reqwest::blocking::Client,
    }

    impl ReqwestClient {
        /// Builds a client with the configured timeout and user agent.
        pub fn new(config: &HttpStoreConfig) -> StoreResult<Self> {
            let inner = reqwest::blocking::Client::builder()
                .timeout(config.timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| StoreError::transport(format!("http client: {e}")))?;
            Ok(Self { inner })
        }
    }

    impl HttpClient for ReqwestClient {
        fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String> {
            let mut builder = match request.method {
                Method::Get => self.inner.get(url),
                Method::Post => self.inner.post(url),
            };
            if !request.query.is_empty() {
                builder = builder.query(&request.query);
            }
            if let Some(body) = &request.body {
                builder = builder
                    .header(CONTENT_TYPE, request.content_type)
                    .body(body.clone());
            }

            let resp = builder
                .send()
                .map_err(|e| format!("request to {url} failed: {e}"))?;
            let status = resp.status().as_u16();
            let body = resp
                .bytes()
                .map(|b| b.to_vec())
                .map_err(|e| format!("read body: {e}"))?;
            Ok(HttpResponse { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_builders() {
        let req = HttpRequest::get("/idx/note/1").with_query(vec![("_source".into(), "a".into())]);
        assert_eq!(req.method, Method::Get);
        assert!(req.body.is_none());
        assert_eq!(req.query.len(), 1);

        let req = HttpRequest::post("/_bulk", String::new()).with_content_type(NDJSON);
        assert_eq!(req.method.as_str(), "POST");
        assert_eq!(req.content_type, NDJSON);
    }

    #[test]
    fn success_range() {
        let ok = HttpResponse { status: 201, body: Vec::new() };
        let missing = HttpResponse { status: 404, body: Vec::new() };
        assert!(ok.is_success());
        assert!(!missing.is_success());
    }
}
