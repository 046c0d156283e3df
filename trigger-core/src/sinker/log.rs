use crate::event::Event;
use crate::sinker::Sink;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    async fn send(&self, event: &Event) -> crate::Result<()> {
        let mut extensions = String::new();
        event.extensions.iter().for_each(|(k, v)| {
            extensions.push_str(&format!("{k}: {v}, "));
        });

        let data = event
            .data
            .as_ref()
            .map(|data| data.to_string())
            .unwrap_or_default();

        tracing::info!(
            "Data - {} Source - {} Type - {} Extensions - {} ID - {}",
            data,
            event.source,
            event.ty,
            extensions,
            event.id,
        );
        Ok(())
    }
}
