use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, trace};

use crate::backends::{SendOutcome, Sink};

pub(crate) const SHIPPER_AGENT_HEADER: &str = "Shipper-Agent";

/// 🏷️ `curx/v{crate version}/{attempt}/0.`, so the receiving end can tell a retry from a first try.
pub(crate) fn shipper_agent(attempt: u32) -> String {
    format!("curx/v{}/{}/0.", env!("CARGO_PKG_VERSION"), attempt)
}

/// 📡 The sink side of the pipeline: one POST per `send`, zero buffering.
///
/// Holds a single `reqwest::Client` so the connection pool survives across batches
/// and retries. The endpoint already carries the token and log type as query params.
#[derive(Debug)]
pub(crate) struct HttpSink {
    client: reqwest::Client,
    endpoint: reqwest::Url,
}

impl HttpSink {
    /// 🚀 Build the client with the configured timeouts. No connectivity ping: a
    /// dead endpoint shows up as `Unreachable` on the first batch, and the shipper
    /// knows what to do with that.
    pub(crate) fn new(
        endpoint: reqwest::Url,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()
            .context("💀 The HTTP client refused to be born. Probably the TLS stack. It usually is.")?;
        Ok(Self { client, endpoint })
    }
}

#[async_trait]
impl Sink for HttpSink {
    async fn send(&mut self, payload: &str, attempt: u32) -> SendOutcome {
        debug!(
            "📡 POST {} bytes to {} (attempt {})",
            payload.len(),
            self.endpoint.path(),
            attempt
        );
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .header(SHIPPER_AGENT_HEADER, shipper_agent(attempt))
            .body(payload.to_owned())
            .send()
            .await;

        let response = match response {
            Ok(response) => response,
            // 📡 connect refused, DNS, timeout. We never heard back.
            Err(err) => {
                return SendOutcome::Unreachable {
                    reason: err.to_string(),
                };
            }
        };

        let status = response.status().as_u16();
        if response.status().is_success() {
            trace!("✅ endpoint accepted the batch with {}", status);
            return SendOutcome::Accepted { status };
        }
        // 🧾 the body is best-effort. If reading it fails we still know the status.
        let body = response.text().await.unwrap_or_default();
        SendOutcome::Rejected { status, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_string, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sink_for(server: &MockServer) -> HttpSink {
        let mut endpoint = reqwest::Url::parse(&format!("{}/ingest", server.uri())).unwrap();
        endpoint
            .query_pairs_mut()
            .append_pair("token", "s3cr3t")
            .append_pair("type", "billing");
        HttpSink::new(endpoint, Duration::from_secs(2), Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn the_one_where_the_agent_header_wears_its_version_and_attempt() {
        let agent = shipper_agent(3);
        assert_eq!(agent, format!("curx/v{}/3/0.", env!("CARGO_PKG_VERSION")));
    }

    #[tokio::test]
    async fn the_one_where_the_payload_arrives_with_all_its_paperwork() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/ingest"))
            .and(query_param("token", "s3cr3t"))
            .and(query_param("type", "billing"))
            .and(header("content-type", "application/json"))
            .and(header(SHIPPER_AGENT_HEADER, shipper_agent(0).as_str()))
            .and(body_string("{\"a\":1}\n{\"a\":2}"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut sink = sink_for(&server);
        let outcome = sink.send("{\"a\":1}\n{\"a\":2}", 0).await;
        assert_eq!(outcome, SendOutcome::Accepted { status: 200 });
    }

    #[tokio::test]
    async fn the_one_where_a_400_comes_back_with_a_complaint_letter() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("bad json, bad"))
            .mount(&server)
            .await;

        let mut sink = sink_for(&server);
        let outcome = sink.send("{", 0).await;
        assert_eq!(
            outcome,
            SendOutcome::Rejected {
                status: 400,
                body: "bad json, bad".to_string()
            }
        );
    }

    #[tokio::test]
    async fn the_one_where_nobody_is_home() {
        // 🕳️ bind a port, learn its number, then let it go so nothing listens there
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let endpoint = reqwest::Url::parse(&format!("http://{}/ingest", addr)).unwrap();
        let mut sink =
            HttpSink::new(endpoint, Duration::from_secs(1), Duration::from_secs(2)).unwrap();
        let outcome = sink.send("{}", 0).await;
        assert!(
            matches!(outcome, SendOutcome::Unreachable { .. }),
            "expected Unreachable, got {:?}",
            outcome
        );
    }
}
