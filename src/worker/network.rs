use std::future::Future;

use reqwest::Client;
use tracing::debug;

use super::{FetchRequest, WorkerError};

/// A fully buffered HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(url: &str, status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.to_string(),
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Source of live responses.
///
/// Only transport failures are errors; a response with any status code is
/// `Ok`, as with the browser's `fetch`.
pub trait Network: Send + Sync + 'static {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<HttpResponse, WorkerError>> + Send;
}

/// `Network` over a reqwest client.
#[derive(Clone)]
pub struct HttpNetwork {
    client: Client,
}

impl HttpNetwork {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<HttpResponse, WorkerError> {
        debug!(url = %request.url, method = %request.method, "Network fetch");
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let url = response.url().to_string();
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| WorkerError::Network(e.to_string()))?;

        Ok(headers
            .iter()
            .fold(HttpResponse::new(&url, status, body.to_vec()), |r, (name, value)| {
                r.with_header(name, value)
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_http_network_buffers_any_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/assets/styles.min.css"))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw("body{}", "text/css"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let network = HttpNetwork::new(Client::new());
        let ok = network
            .fetch(&FetchRequest::parse(&format!("{}/assets/styles.min.css", server.uri()), Default::default()).unwrap())
            .await
            .unwrap();
        assert_eq!(ok.status, 200);
        assert_eq!(ok.header("Content-Type"), Some("text/css"));
        assert_eq!(ok.text(), "body{}");

        let missing = network
            .fetch(&FetchRequest::parse(&format!("{}/missing", server.uri()), Default::default()).unwrap())
            .await
            .unwrap();
        assert_eq!(missing.status, 404);
        assert!(!missing.is_ok());
    }
}
