// ABOUTME: Message pumps and the concurrent bidirectional relay used by client adapters.
// ABOUTME: Each pump owns its outcome; outcomes are merged only after both pumps finish.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::AdapterError;
use crate::stream::{MessageSink, MessageSource};

/// Cancellation and deadline applied to a relayed call.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
    /// Cancelling this token stops every pump of the call.
    pub cancel: CancellationToken,
    /// Wall-clock budget for the whole relay.
    pub timeout: Option<Duration>,
}

impl RelayOptions {
    /// Options with a fresh token and no deadline.
    pub fn new() -> Self {
        Self::default()
    }

    /// Use the given cancellation token.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound the relay by a timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub(crate) fn guard(&self) -> CallGuard {
        CallGuard {
            cancel: self.cancel.child_token(),
            deadline: self.timeout.map(|t| Instant::now() + t),
        }
    }
}

/// Per-call stop signal shared by the pumps of one relay.
#[derive(Debug, Clone)]
pub(crate) struct CallGuard {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl CallGuard {
    /// Resolves with the reason the call must stop.
    async fn stopped(&self) -> AdapterError {
        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = self.cancel.cancelled() => AdapterError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => AdapterError::DeadlineExceeded,
            },
            None => {
                self.cancel.cancelled().await;
                AdapterError::Cancelled
            }
        }
    }

    fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Run `fut` unless the call is stopped first.
    pub(crate) async fn guarded<T, F>(&self, fut: F) -> Result<T, AdapterError>
    where
        F: Future<Output = Result<T, AdapterError>>,
    {
        tokio::select! {
            reason = self.stopped() => Err(reason),
            outcome = fut => outcome,
        }
    }
}

/// Forward messages from `source` to `sink` until end-of-stream.
///
/// Returns the number of messages forwarded. Any receive or send error
/// ends the pump immediately, and so does the guard, whether the pump is
/// waiting to receive or blocked on a full sink.
pub(crate) async fn pump<T, S, K>(
    source: &mut S,
    sink: &mut K,
    guard: &CallGuard,
) -> Result<usize, AdapterError>
where
    T: Send,
    S: MessageSource<T> + ?Sized,
    K: MessageSink<T> + ?Sized,
{
    let mut forwarded = 0usize;
    loop {
        let Some(msg) = guard.guarded(source.recv()).await? else {
            return Ok(forwarded);
        };
        guard.guarded(sink.send(msg)).await?;
        forwarded += 1;
    }
}

/// Message counts of a finished bidirectional relay.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelayStats {
    /// Messages forwarded from the served call to the upstream call.
    pub upstream: usize,
    /// Messages forwarded from the upstream call back to the served call.
    pub downstream: usize,
}

/// Which pump of a bidirectional relay produced an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Upstream,
    Downstream,
}

/// Relay a bidirectional call.
///
/// Runs two tasks for the duration of the call: one forwards
/// `inbound_rx -> upstream_tx` and drops `upstream_tx` at end-of-stream to
/// half-close the upstream call, the other forwards
/// `upstream_rx -> inbound_tx`. The relay returns once both tasks have
/// finished. Each task reports into its own slot; the first error observed
/// wins, and a failing task cancels the other so a stalled peer cannot keep
/// the call open.
pub async fn relay_bidirectional<Req, Res, IR, IT, UT, UR>(
    inbound_rx: IR,
    inbound_tx: IT,
    upstream_tx: UT,
    upstream_rx: UR,
    options: RelayOptions,
) -> Result<RelayStats, AdapterError>
where
    Req: Send + 'static,
    Res: Send + 'static,
    IR: MessageSource<Req> + 'static,
    IT: MessageSink<Res> + 'static,
    UT: MessageSink<Req> + 'static,
    UR: MessageSource<Res> + 'static,
{
    relay_guarded(inbound_rx, inbound_tx, upstream_tx, upstream_rx, options.guard()).await
}

/// [`relay_bidirectional`] under a guard the caller already holds.
pub(crate) async fn relay_guarded<Req, Res, IR, IT, UT, UR>(
    mut inbound_rx: IR,
    mut inbound_tx: IT,
    mut upstream_tx: UT,
    mut upstream_rx: UR,
    guard: CallGuard,
) -> Result<RelayStats, AdapterError>
where
    Req: Send + 'static,
    Res: Send + 'static,
    IR: MessageSource<Req> + 'static,
    IT: MessageSink<Res> + 'static,
    UT: MessageSink<Req> + 'static,
    UR: MessageSource<Res> + 'static,
{
    let up_guard = guard.clone();
    let mut upstream = tokio::spawn(async move {
        let outcome = pump(&mut inbound_rx, &mut upstream_tx, &up_guard).await;
        // Dropping the sender half-closes the upstream call.
        drop(upstream_tx);
        if outcome.is_err() {
            up_guard.cancel();
        }
        outcome
    });

    let down_guard = guard.clone();
    let mut downstream = tokio::spawn(async move {
        let outcome = pump(&mut upstream_rx, &mut inbound_tx, &down_guard).await;
        if outcome.is_err() {
            down_guard.cancel();
        }
        outcome
    });

    let (first, second) = tokio::select! {
        res = &mut upstream => (
            (Direction::Upstream, res),
            (Direction::Downstream, downstream.await),
        ),
        res = &mut downstream => (
            (Direction::Downstream, res),
            (Direction::Upstream, upstream.await),
        ),
    };

    let mut stats = RelayStats::default();
    let mut failure = None;
    for (direction, joined) in [first, second] {
        let outcome = joined.map_err(|e| AdapterError::Task(e.to_string())).and_then(|r| r);
        match outcome {
            Ok(count) => match direction {
                Direction::Upstream => stats.upstream = count,
                Direction::Downstream => stats.downstream = count,
            },
            Err(err) => match failure {
                None => failure = Some(err),
                // A cancellation triggered by the other pump's failure is not the cause.
                Some(AdapterError::Cancelled) if !matches!(err, AdapterError::Cancelled) => {
                    failure = Some(err)
                }
                Some(_) => debug!(?direction, error = %err, "bidirectional relay follow-up error"),
            },
        }
    }

    match failure {
        Some(err) => {
            warn!(error = %err, "bidirectional relay failed");
            Err(err)
        }
        None => {
            debug!(
                upstream = stats.upstream,
                downstream = stats.downstream,
                "bidirectional relay finished"
            );
            Ok(stats)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{ResponseSender, StreamReceiver, StreamSender};
    use futures::StreamExt;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::ReceiverStream;

    fn finite_source(count: u32) -> StreamReceiver<u32> {
        StreamReceiver::new(futures::stream::iter((1..=count).map(Ok)))
    }

    #[tokio::test]
    async fn test_pump_forwards_until_end() {
        let (tx, rx) = mpsc::channel(16);
        let mut source = finite_source(5);
        let mut sink = StreamSender::new(tx);
        let guard = RelayOptions::new().guard();

        let forwarded = pump(&mut source, &mut sink, &guard).await.unwrap();
        drop(sink);
        assert_eq!(forwarded, 5);

        let received: Vec<u32> = ReceiverStream::new(rx).collect().await;
        assert_eq!(received, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_pump_stops_on_cancel() {
        let (_keep_open, rx) = mpsc::channel::<Result<u32, tonic::Status>>(1);
        let mut source = StreamReceiver::new(ReceiverStream::new(rx));
        let (tx, _out) = mpsc::channel::<u32>(1);
        let mut sink = StreamSender::new(tx);

        let options = RelayOptions::new();
        let guard = options.guard();
        options.cancel.cancel();

        let err = pump(&mut source, &mut sink, &guard).await.unwrap_err();
        assert!(matches!(err, AdapterError::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_stops_at_deadline() {
        let (_keep_open, rx) = mpsc::channel::<Result<u32, tonic::Status>>(1);
        let mut source = StreamReceiver::new(ReceiverStream::new(rx));
        let (tx, _out) = mpsc::channel::<u32>(1);
        let mut sink = StreamSender::new(tx);

        let guard = RelayOptions::new()
            .with_timeout(Duration::from_secs(5))
            .guard();

        let err = pump(&mut source, &mut sink, &guard).await.unwrap_err();
        assert!(matches!(err, AdapterError::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_pump_blocked_on_full_sink_stops_at_deadline() {
        let mut source = StreamReceiver::new(futures::stream::repeat(Ok(1u32)));
        let (tx, _never_read) = mpsc::channel::<u32>(1);
        let mut sink = StreamSender::new(tx);

        let guard = RelayOptions::new()
            .with_timeout(Duration::from_secs(5))
            .guard();

        let err = pump(&mut source, &mut sink, &guard).await.unwrap_err();
        assert!(matches!(err, AdapterError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_pump_blocked_on_full_sink_stops_on_cancel() {
        let mut source = StreamReceiver::new(futures::stream::repeat(Ok(1u32)));
        let (tx, _never_read) = mpsc::channel::<u32>(1);
        let mut sink = StreamSender::new(tx);

        let options = RelayOptions::new();
        let guard = options.guard();
        let cancel = options.cancel.clone();
        let pumping = tokio::spawn(async move { pump(&mut source, &mut sink, &guard).await });

        tokio::task::yield_now().await;
        cancel.cancel();
        let err = pumping.await.unwrap().unwrap_err();
        assert!(matches!(err, AdapterError::Cancelled));
    }

    #[tokio::test]
    async fn test_bidirectional_relay_delivers_everything() {
        let (upstream_tx, upstream_seen) = mpsc::channel::<u32>(64);
        let (inbound_tx, inbound_seen) = ResponseSender::<u32>::channel(64);

        let stats = relay_bidirectional(
            finite_source(7),
            inbound_tx,
            StreamSender::new(upstream_tx),
            finite_source(4),
            RelayOptions::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            stats,
            RelayStats {
                upstream: 7,
                downstream: 4
            }
        );

        let sent_up: Vec<u32> = ReceiverStream::new(upstream_seen).collect().await;
        assert_eq!(sent_up, (1..=7).collect::<Vec<_>>());

        let sent_down: Vec<u32> = inbound_seen.map(|r| r.unwrap()).collect().await;
        assert_eq!(sent_down, (1..=4).collect::<Vec<_>>());
    }
}
