use reqwest::Url;
use reqwest::header::CONTENT_TYPE;

use crate::Result;
use crate::error::Error;
use crate::event::Event;
use crate::sinker::Sink;

const CLOUDEVENTS_JSON: &str = "application/cloudevents+json";

/// POSTs every event to the target URL. A 2xx response acknowledges the event; any other status
/// or a transport failure rejects it. The client does not retry by itself, the send workers do.
#[derive(Debug, Clone)]
pub struct HttpSink {
    client: reqwest::Client,
    url: Url,
}

impl HttpSink {
    pub fn new(url: Url) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::SinkUnavailable(format!("failed to build http client: {e}")))?;
        Ok(Self { client, url })
    }
}

impl Sink for HttpSink {
    async fn send(&self, event: &Event) -> Result<()> {
        let body = serde_json::to_vec(event)
            .map_err(|e| Error::Sink(format!("failed to encode event {}: {e}", event.id)))?;

        let response = self
            .client
            .post(self.url.clone())
            .header(CONTENT_TYPE, CLOUDEVENTS_JSON)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Sink(format!(
                "sink {} rejected event {} with status {status}",
                self.url, event.id
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::Router;
    use axum::body::Bytes;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;
    use parking_lot::Mutex;
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    #[derive(Clone)]
    struct AppState {
        status: StatusCode,
        received: Arc<Mutex<Vec<(String, serde_json::Value)>>>,
    }

    async fn receive(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> StatusCode {
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = serde_json::from_slice(&body).unwrap_or_default();
        state.received.lock().push((content_type, body));
        state.status
    }

    async fn start_server(status: StatusCode) -> (Url, AppState) {
        let state = AppState {
            status,
            received: Arc::new(Mutex::new(Vec::new())),
        };
        let app = Router::new()
            .route("/events", post(receive))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        let url = Url::parse(&format!("http://{addr}/events")).unwrap();
        (url, state)
    }

    #[tokio::test]
    async fn test_http_sink_ack() {
        let (url, state) = start_server(StatusCode::ACCEPTED).await;
        let sink = HttpSink::new(url).unwrap();
        let event = Event::new("1", "/orders", "order.created").with_data(json!({"id": 7}));

        sink.send(&event).await.unwrap();

        let received = state.received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, CLOUDEVENTS_JSON);
        assert_eq!(received[0].1["id"], "1");
        assert_eq!(received[0].1["type"], "order.created");
        assert_eq!(received[0].1["data"], json!({"id": 7}));
    }

    #[tokio::test]
    async fn test_http_sink_rejects_on_error_status() {
        let (url, state) = start_server(StatusCode::SERVICE_UNAVAILABLE).await;
        let sink = HttpSink::new(url).unwrap();

        let result = sink.send(&Event::new("1", "/s", "t")).await;
        assert!(matches!(result, Err(Error::Sink(_))));
        assert_eq!(state.received.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_http_sink_rejects_when_unreachable() {
        // grab a free port and release it so nothing is listening there
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let sink = HttpSink::new(Url::parse(&format!("http://{addr}/")).unwrap()).unwrap();
        let result = sink.send(&Event::new("1", "/s", "t")).await;
        assert!(matches!(result, Err(Error::Sink(_))));
    }
}
