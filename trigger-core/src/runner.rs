use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::Result;
use crate::config::TriggerSettings;
use crate::error::Error;
use crate::event::{Event, EventRecord, OffsetInfo};
use crate::offset::{OffsetTracker, SubscriptionOffset};
use crate::sinker::DefaultConnector;
use crate::trigger::Trigger;

/// All the lines of the input belong to this event log.
const INPUT_EVENTLOG_ID: u64 = 0;
const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Runs a trigger for the configured subscription over newline delimited CloudEvents read from
/// `input`, the line number being the offset of the event. Lines which are not valid events are
/// skipped.
///
/// Once the input is exhausted the trigger is stopped as soon as every accepted event is done
/// with, or right away when `shutdown` is cancelled. Returns the commit cursors.
pub async fn run<R>(
    settings: TriggerSettings,
    input: R,
    shutdown: CancellationToken,
) -> Result<Vec<OffsetInfo>>
where
    R: AsyncBufRead + Unpin,
{
    let offsets = Arc::new(SubscriptionOffset::new(settings.subscription.id.clone()));
    let trigger = Trigger::new(
        settings.config,
        &settings.subscription,
        Arc::clone(&offsets) as Arc<dyn OffsetTracker>,
        DefaultConnector,
    );
    trigger.start().await?;

    let result = forward(&trigger, input, &shutdown).await;
    if result.is_ok() {
        wait_for_drain(&offsets, &shutdown).await;
    }
    trigger.stop().await;

    let commit_offsets = offsets.commit_offsets();
    info!(
        subscription_id = %settings.subscription.id,
        ?commit_offsets,
        outstanding = offsets.outstanding(),
        "Runner finished"
    );
    result.map(|_| commit_offsets)
}

/// Hands every event of the input over to the trigger, returns how many were accepted.
async fn forward<R>(
    trigger: &Trigger,
    input: R,
    shutdown: &CancellationToken,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    let mut offset = 0;
    let mut accepted = 0;

    loop {
        let line = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            line = lines.next_line() => line,
        };
        let line = match line {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!(?e, "Reading events failed, no more events will be read");
                break;
            }
        };

        let offset_info = OffsetInfo::new(INPUT_EVENTLOG_ID, offset);
        offset += 1;
        if line.trim().is_empty() {
            continue;
        }
        let event: Event = match serde_json::from_str(&line) {
            Ok(event) => event,
            Err(e) => {
                warn!(%offset_info, ?e, "Skipping line which is not a CloudEvent");
                continue;
            }
        };

        match trigger
            .event_arrived(shutdown, EventRecord::new(event, offset_info))
            .await
        {
            Ok(()) => accepted += 1,
            Err(Error::Cancelled) => break,
            Err(e) => return Err(e),
        }
    }
    Ok(accepted)
}

async fn wait_for_drain(offsets: &SubscriptionOffset, shutdown: &CancellationToken) {
    while offsets.outstanding() > 0 {
        tokio::select! {
            _ = shutdown.cancelled() => return,
            _ = time::sleep(DRAIN_POLL_INTERVAL) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::config::TriggerConfig;
    use crate::filter::SubscriptionFilter;
    use crate::subscription::Subscription;

    fn settings(subscription: Subscription) -> TriggerSettings {
        TriggerSettings {
            subscription,
            config: TriggerConfig {
                retry_period: Duration::from_millis(10),
                ..TriggerConfig::default()
            },
        }
    }

    const INPUT: &str = r#"{"id":"1","source":"/orders","type":"order.created","specversion":"1.0"}
not an event

{"id":"2","source":"/orders","type":"order.deleted","specversion":"1.0"}
"#;

    #[tokio::test]
    async fn test_run_to_completion() {
        let subscription = Subscription::new("runner-sub", "log:stdout");
        let commit_offsets = run(
            settings(subscription),
            INPUT.as_bytes(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        // events at line 0 and 3 were received and committed
        assert_eq!(commit_offsets, vec![OffsetInfo::new(INPUT_EVENTLOG_ID, 4)]);
    }

    #[tokio::test]
    async fn test_run_with_filter() {
        let subscription = Subscription::new("runner-filter-sub", "log:stdout").with_filters(vec![
            SubscriptionFilter::Prefix(BTreeMap::from([(
                "type".to_string(),
                "order.created".to_string(),
            )])),
        ]);
        let commit_offsets = run(
            settings(subscription),
            INPUT.as_bytes(),
            CancellationToken::new(),
        )
        .await
        .unwrap();

        assert_eq!(commit_offsets, vec![OffsetInfo::new(INPUT_EVENTLOG_ID, 4)]);
    }

    #[tokio::test]
    async fn test_run_sink_unavailable() {
        let subscription = Subscription::new("runner-bad-sub", "ftp://sink.local");
        let result = run(
            settings(subscription),
            INPUT.as_bytes(),
            CancellationToken::new(),
        )
        .await;

        assert!(matches!(result, Err(Error::SinkUnavailable(_))));
    }

    #[tokio::test]
    async fn test_run_already_shut_down() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let subscription = Subscription::new("runner-shutdown-sub", "log:stdout");

        let commit_offsets = run(settings(subscription), INPUT.as_bytes(), shutdown)
            .await
            .unwrap();
        assert!(commit_offsets.is_empty());
    }
}
