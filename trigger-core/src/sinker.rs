use crate::Result;
use crate::error::Error;
use crate::event::Event;

/// [http] sink delivers the events to an HTTP endpoint in CloudEvents structured mode.
#[path = "sinker/http.rs"]
mod http;

/// [log] sink logs the events through `tracing` and acknowledges all of them.
#[path = "sinker/log.rs"]
mod log;

pub use self::http::HttpSink;
pub use self::log::LogSink;

const LOG_SINK_SCHEME: &str = "log";

/// Outbound delivery of a single event. `Ok` means the sink acknowledged the event, any error is
/// a rejection of this attempt.
#[trait_variant::make(Sink: Send)]
#[allow(dead_code)]
pub trait LocalSink {
    /// Deliver the event to the Sink.
    async fn send(&self, event: &Event) -> Result<()>;
}

/// Builds the sink client of a trigger from the subscription's target address.
pub trait SinkConnector: Send + Sync + 'static {
    type Sink: Sink + Sync + 'static;

    /// Fails with [Error::SinkUnavailable] if no client can be built for the target.
    fn connect(&self, target: &str) -> Result<Self::Sink>;
}

/// The sink clients built by [DefaultConnector].
pub enum SinkClient {
    Http(HttpSink),
    Log(LogSink),
}

impl Sink for SinkClient {
    async fn send(&self, event: &Event) -> Result<()> {
        match self {
            SinkClient::Http(sink) => Sink::send(sink, event).await,
            SinkClient::Log(sink) => Sink::send(sink, event).await,
        }
    }
}

/// Connects `http`/`https` targets to an [HttpSink] and `log:` targets to a [LogSink].
#[derive(Debug, Clone, Default)]
pub struct DefaultConnector;

impl SinkConnector for DefaultConnector {
    type Sink = SinkClient;

    fn connect(&self, target: &str) -> Result<Self::Sink> {
        let url = reqwest::Url::parse(target)
            .map_err(|e| Error::SinkUnavailable(format!("invalid sink address {target}: {e}")))?;

        match url.scheme() {
            "http" | "https" => Ok(SinkClient::Http(HttpSink::new(url)?)),
            LOG_SINK_SCHEME => Ok(SinkClient::Log(LogSink)),
            scheme => Err(Error::SinkUnavailable(format!(
                "unsupported sink scheme {scheme} in {target}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_by_scheme() {
        let connector = DefaultConnector;
        assert!(matches!(
            connector.connect("http://localhost:8080/events"),
            Ok(SinkClient::Http(_))
        ));
        assert!(matches!(
            connector.connect("https://sink.example.com"),
            Ok(SinkClient::Http(_))
        ));
        assert!(matches!(connector.connect("log:"), Ok(SinkClient::Log(_))));
    }

    #[test]
    fn test_connect_unavailable() {
        let connector = DefaultConnector;
        assert!(matches!(
            connector.connect("not a url"),
            Err(Error::SinkUnavailable(_))
        ));
        assert!(matches!(
            connector.connect("ftp://files.example.com"),
            Err(Error::SinkUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_log_client_acks() {
        let client = DefaultConnector.connect("log:").unwrap();
        let event = Event::new("1", "/s", "t");
        assert_eq!(Sink::send(&client, &event).await, Ok(()));
    }
}
