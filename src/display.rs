//! Foreground display tasks and the handshake used to stop them.
//!
//! A display task owns the canvas while it runs and hands it back through its
//! join handle, so two tasks can never draw at the same time. Stopping is
//! cooperative: the task checks the stop signal before every fetch and while
//! it sleeps, but never interrupts a fetch that is already in flight.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot::error::TryRecvError;
use tokio::sync::{oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::canvas::{Canvas, StyleHint};
use crate::error::FetchError;
use crate::model::ViewKind;
use crate::provider::{ResourceProvider, bounded, list_view};
use crate::ui::{self, ListingFrame};

const FINGERPRINT_BYTES: usize = 64;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Timings {
    pub render_interval: Duration,
    pub log_poll_interval: Duration,
    pub request_timeout: Duration,
    pub max_backoff: Duration,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum DisplayKind {
    Listing(ViewKind),
    Streaming,
    Describing,
}

/// What a display task hands back when it exits.
pub struct TaskOutcome<C> {
    pub canvas: C,
    /// Length of the last list the task fetched.
    pub listed: Option<usize>,
}

/// Ownership token for the running foreground task.
pub struct DisplayTaskHandle<C> {
    kind: DisplayKind,
    stop: oneshot::Sender<()>,
    join: JoinHandle<TaskOutcome<C>>,
}

impl<C: Send + 'static> DisplayTaskHandle<C> {
    fn spawn<F>(kind: DisplayKind, task: impl FnOnce(oneshot::Receiver<()>) -> F) -> Self
    where
        F: Future<Output = TaskOutcome<C>> + Send + 'static,
    {
        let (stop, stop_rx) = oneshot::channel();
        let join = tokio::spawn(task(stop_rx));
        debug!(?kind, "display task started");
        Self { kind, stop, join }
    }

    pub fn kind(&self) -> DisplayKind {
        self.kind
    }

    /// Signals the task and waits until it has exited.
    pub async fn cancel(self) -> Result<TaskOutcome<C>, JoinError> {
        if self.join.is_finished() {
            debug!(kind = ?self.kind, "display task already finished");
        } else {
            let _ = self.stop.send(());
        }
        let outcome = self.join.await;
        debug!(kind = ?self.kind, "display task acknowledged stop");
        outcome
    }
}

#[derive(Debug, Clone)]
pub struct ListingRequest {
    pub view: ViewKind,
    pub namespace: String,
    pub cursor_line: usize,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LogTarget {
    pub namespace: String,
    pub pod_name: String,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct DescribeTarget {
    pub view: ViewKind,
    pub namespace: String,
    pub name: String,
}

pub fn spawn_listing<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    request: ListingRequest,
    status: watch::Receiver<Option<String>>,
    canvas: C,
) -> DisplayTaskHandle<C> {
    DisplayTaskHandle::spawn(DisplayKind::Listing(request.view), move |stop| {
        run_listing(provider, timings, request, status, canvas, stop)
    })
}

pub fn spawn_streaming<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    target: LogTarget,
    status: watch::Receiver<Option<String>>,
    canvas: C,
) -> DisplayTaskHandle<C> {
    DisplayTaskHandle::spawn(DisplayKind::Streaming, move |stop| {
        run_streaming(provider, timings, target, status, canvas, stop)
    })
}

/// The receiver resolves once the description is on screen, or with the
/// fetch error (in which case the task has already exited).
pub fn spawn_describe<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    target: DescribeTarget,
    status: watch::Receiver<Option<String>>,
    canvas: C,
) -> (
    DisplayTaskHandle<C>,
    oneshot::Receiver<Result<(), FetchError>>,
) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let handle = DisplayTaskHandle::spawn(DisplayKind::Describing, move |stop| {
        run_describe(provider, timings, target, status, canvas, ready_tx, stop)
    });
    (handle, ready_rx)
}

async fn run_listing<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    request: ListingRequest,
    status: watch::Receiver<Option<String>>,
    mut canvas: C,
    mut stop: oneshot::Receiver<()>,
) -> TaskOutcome<C> {
    let mut listed = None;
    let mut backoff = Backoff::new(timings.render_interval, timings.max_backoff);

    loop {
        if stop_requested(&mut stop) {
            break;
        }

        let result = bounded(
            "list",
            timings.request_timeout,
            list_view(provider.as_ref(), request.view, &request.namespace),
        )
        .await;
        let status_line = status.borrow().clone();

        let delay = match result {
            Ok(items) => {
                listed = Some(items.len());
                let frame = ListingFrame {
                    view: request.view,
                    namespace: &request.namespace,
                    items: &items,
                    cursor_line: request.cursor_line,
                    status: status_line.as_deref(),
                };
                if let Err(error) = ui::render_listing(&mut canvas, &frame) {
                    warn!("list render failed: {error}");
                }
                backoff.reset()
            }
            Err(error) => {
                warn!(view = %request.view, "list refresh failed: {error}");
                if let Err(render_error) = ui::render_unavailable(
                    &mut canvas,
                    request.view,
                    &request.namespace,
                    &error.to_string(),
                    status_line.as_deref(),
                ) {
                    warn!("list render failed: {render_error}");
                }
                backoff.next_delay()
            }
        };

        if pause(&mut stop, delay).await {
            break;
        }
    }

    TaskOutcome { canvas, listed }
}

async fn run_streaming<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    target: LogTarget,
    mut status: watch::Receiver<Option<String>>,
    mut canvas: C,
    mut stop: oneshot::Receiver<()>,
) -> TaskOutcome<C> {
    if let Err(error) = ui::render_log_header(&mut canvas, &target.namespace, &target.pod_name) {
        warn!("log header render failed: {error}");
    }
    draw_status(&mut canvas, &mut status);
    let mut tail = LogTail::default();
    let mut backoff = Backoff::new(timings.log_poll_interval, timings.max_backoff);

    loop {
        if stop_requested(&mut stop) {
            break;
        }

        let result = bounded(
            "fetch logs",
            timings.request_timeout,
            provider.stream_logs(&target.namespace, &target.pod_name),
        )
        .await;

        let delay = match result {
            Ok(text) => {
                let update = tail.advance(&text);
                let rendered_text = update != TailUpdate::Unchanged;
                let rendered = match update {
                    TailUpdate::Unchanged => Ok(()),
                    TailUpdate::Append(suffix) => canvas
                        .write(suffix, StyleHint::Plain)
                        .and_then(|()| canvas.flush()),
                    TailUpdate::Reset(full) => {
                        debug!(pod = %target.pod_name, "log rewritten, re-rendering");
                        ui::render_log_header(&mut canvas, &target.namespace, &target.pod_name)
                            .and_then(|()| canvas.write(full, StyleHint::Plain))
                            .and_then(|()| canvas.flush())
                    }
                };
                if let Err(error) = rendered {
                    warn!("log render failed: {error}");
                }
                // appended text may have scrolled over the status row
                if rendered_text && status.borrow().is_some() {
                    draw_status(&mut canvas, &mut status);
                }
                backoff.reset()
            }
            Err(error) => {
                warn!(pod = %target.pod_name, "log fetch failed: {error}");
                backoff.next_delay()
            }
        };

        if pause_showing_status(&mut stop, delay, &mut status, &mut canvas).await {
            break;
        }
    }

    TaskOutcome {
        canvas,
        listed: None,
    }
}

async fn run_describe<P: ResourceProvider, C: Canvas>(
    provider: Arc<P>,
    timings: Timings,
    target: DescribeTarget,
    mut status: watch::Receiver<Option<String>>,
    mut canvas: C,
    ready: oneshot::Sender<Result<(), FetchError>>,
    mut stop: oneshot::Receiver<()>,
) -> TaskOutcome<C> {
    let result = bounded(
        "describe",
        timings.request_timeout,
        provider.describe_resource(target.view, &target.namespace, &target.name),
    )
    .await;

    match result {
        Ok(text) => {
            if let Err(error) = ui::render_describe(
                &mut canvas,
                target.view,
                &target.namespace,
                &target.name,
                &text,
            ) {
                warn!("describe render failed: {error}");
            }
            draw_status(&mut canvas, &mut status);
            let _ = ready.send(Ok(()));
            wait_showing_status(&mut stop, &mut status, &mut canvas).await;
        }
        Err(error) => {
            let _ = ready.send(Err(error));
        }
    }

    TaskOutcome {
        canvas,
        listed: None,
    }
}

fn stop_requested(stop: &mut oneshot::Receiver<()>) -> bool {
    // a dropped sender counts as a stop
    !matches!(stop.try_recv(), Err(TryRecvError::Empty))
}

/// Sleeps for `delay`. Returns true when the stop signal arrived first.
async fn pause(stop: &mut oneshot::Receiver<()>, delay: Duration) -> bool {
    tokio::select! {
        _ = stop => true,
        _ = sleep(delay) => false,
    }
}

/// Like [`pause`], but redraws the status row whenever the controller
/// publishes a new message.
async fn pause_showing_status<C: Canvas>(
    stop: &mut oneshot::Receiver<()>,
    delay: Duration,
    status: &mut watch::Receiver<Option<String>>,
    canvas: &mut C,
) -> bool {
    let deadline = sleep(delay);
    tokio::pin!(deadline);
    loop {
        tokio::select! {
            _ = &mut *stop => return true,
            _ = &mut deadline => return false,
            changed = status.changed() => {
                if changed.is_err() {
                    // controller gone; nothing more will be published
                    return tokio::select! {
                        _ = &mut *stop => true,
                        _ = &mut deadline => false,
                    };
                }
                draw_status(canvas, status);
            }
        }
    }
}

/// Parks until the stop signal, redrawing the status row on every change.
async fn wait_showing_status<C: Canvas>(
    stop: &mut oneshot::Receiver<()>,
    status: &mut watch::Receiver<Option<String>>,
    canvas: &mut C,
) {
    loop {
        tokio::select! {
            _ = &mut *stop => return,
            changed = status.changed() => {
                if changed.is_err() {
                    let _ = (&mut *stop).await;
                    return;
                }
                draw_status(canvas, status);
            }
        }
    }
}

fn draw_status<C: Canvas>(canvas: &mut C, status: &mut watch::Receiver<Option<String>>) {
    let message = status.borrow_and_update().clone();
    if let Err(error) = ui::render_status_overlay(canvas, message.as_deref()) {
        warn!("status render failed: {error}");
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum TailUpdate<'a> {
    Unchanged,
    Append(&'a str),
    Reset(&'a str),
}

/// Tracks how much of a growing log has been rendered.
///
/// Position is a byte offset into the snapshot. The bytes just before the
/// offset are kept as a fingerprint so a rotated or rewritten log is detected
/// and re-rendered instead of being spliced.
#[derive(Debug, Clone, Default)]
pub struct LogTail {
    offset: usize,
    fingerprint: String,
}

impl LogTail {
    pub fn advance<'a>(&mut self, text: &'a str) -> TailUpdate<'a> {
        let continues = text.len() >= self.offset
            && text.is_char_boundary(self.offset)
            && text[..self.offset].ends_with(self.fingerprint.as_str());

        let update = if !continues {
            TailUpdate::Reset(text)
        } else if text.len() == self.offset {
            TailUpdate::Unchanged
        } else {
            TailUpdate::Append(&text[self.offset..])
        };

        self.offset = text.len();
        self.fingerprint = tail_fingerprint(text).to_string();
        update
    }
}

fn tail_fingerprint(text: &str) -> &str {
    let mut start = text.len().saturating_sub(FINGERPRINT_BYTES);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Exponential retry delay, reset after each success.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    current: Duration,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            current: base,
        }
    }

    pub fn reset(&mut self) -> Duration {
        self.current = self.base;
        self.base
    }

    pub fn next_delay(&mut self) -> Duration {
        self.current = self.current.saturating_mul(2).min(self.max);
        self.current
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Backoff, DescribeTarget, DisplayKind, ListingRequest, LogTail, LogTarget, TailUpdate,
        Timings, spawn_describe, spawn_listing, spawn_streaming,
    };
    use crate::canvas::StyleHint;
    use crate::model::ViewKind;
    use crate::testing::{Call, CanvasOp, FakeProvider, RecordingCanvas, wait_until};
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::sync::watch;

    fn timings() -> Timings {
        Timings {
            render_interval: Duration::from_millis(5),
            log_poll_interval: Duration::from_millis(5),
            request_timeout: Duration::from_millis(500),
            max_backoff: Duration::from_millis(20),
        }
    }

    #[test]
    fn tail_appends_only_new_suffix() {
        let mut tail = LogTail::default();
        assert_eq!(tail.advance("line1\n"), TailUpdate::Append("line1\n"));
        assert_eq!(tail.advance("line1\nline2\n"), TailUpdate::Append("line2\n"));
        assert_eq!(tail.advance("line1\nline2\n"), TailUpdate::Unchanged);
    }

    #[test]
    fn tail_handles_repeated_content() {
        let mut tail = LogTail::default();
        tail.advance("ping\n");
        assert_eq!(tail.advance("ping\nping\n"), TailUpdate::Append("ping\n"));
        assert_eq!(
            tail.advance("ping\nping\nping\n"),
            TailUpdate::Append("ping\n")
        );
    }

    #[test]
    fn tail_resets_when_log_shrinks_or_is_rewritten() {
        let mut tail = LogTail::default();
        tail.advance("aaaa\nbbbb\n");
        assert_eq!(tail.advance("cc\n"), TailUpdate::Reset("cc\n"));
        assert_eq!(
            tail.advance("xx\nyyyy\nzz\n"),
            TailUpdate::Reset("xx\nyyyy\nzz\n")
        );
        assert_eq!(
            tail.advance("xx\nyyyy\nzz\nmore\n"),
            TailUpdate::Append("more\n")
        );
    }

    #[test]
    fn tail_resets_on_split_multibyte_offset() {
        let mut tail = LogTail::default();
        tail.advance("ab");
        assert_eq!(tail.advance("aé"), TailUpdate::Reset("aé"));
    }

    #[test]
    fn backoff_doubles_to_cap_and_resets() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.next_delay(), Duration::from_millis(350));
        assert_eq!(backoff.reset(), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(200));
    }

    #[tokio::test]
    async fn listing_reports_size_after_cancel() {
        let provider = Arc::new(FakeProvider::new().with_pods(
            "default",
            &[("a", "Running"), ("b", "Pending"), ("c", "Running")],
        ));
        let canvas = RecordingCanvas::new();
        let (_status_tx, status_rx) = watch::channel(None);
        let handle = spawn_listing(
            provider.clone(),
            timings(),
            ListingRequest {
                view: ViewKind::Pods,
                namespace: "default".to_string(),
                cursor_line: 0,
            },
            status_rx,
            canvas.clone(),
        );
        assert_eq!(handle.kind(), DisplayKind::Listing(ViewKind::Pods));

        wait_until("two list ticks", || {
            provider.count_calls(|call| matches!(call, Call::ListPods(_))) >= 2
        })
        .await;
        let outcome = handle.cancel().await.unwrap();

        assert_eq!(outcome.listed, Some(3));
        let highlighted = canvas.writes_with(StyleHint::Highlight);
        assert!(highlighted.iter().all(|row| row.contains("a ")));

        let calls_after_cancel = provider.calls().len();
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(provider.calls().len(), calls_after_cancel);
    }

    #[tokio::test]
    async fn listing_shows_unavailable_and_keeps_retrying() {
        let provider = Arc::new(FakeProvider::new());
        provider.fail_lists(Some("connection refused"));
        let canvas = RecordingCanvas::new();
        let (_status_tx, status_rx) = watch::channel(None);
        let handle = spawn_listing(
            provider.clone(),
            timings(),
            ListingRequest {
                view: ViewKind::Namespaces,
                namespace: "default".to_string(),
                cursor_line: 0,
            },
            status_rx,
            canvas.clone(),
        );

        wait_until("retried list", || {
            provider.count_calls(|call| *call == Call::ListNamespaces) >= 2
        })
        .await;
        let outcome = handle.cancel().await.unwrap();

        assert_eq!(outcome.listed, None);
        assert!(canvas.text().contains("data unavailable"));
        assert!(canvas.text().contains("connection refused"));
    }

    #[tokio::test]
    async fn streaming_prints_only_appended_text() {
        let provider = Arc::new(
            FakeProvider::new().with_logs(&["line1\n", "line1\nline2\n"]),
        );
        let canvas = RecordingCanvas::new();
        let (_status_tx, status_rx) = watch::channel(None);
        let handle = spawn_streaming(
            provider.clone(),
            timings(),
            LogTarget {
                namespace: "default".to_string(),
                pod_name: "a".to_string(),
            },
            status_rx,
            canvas.clone(),
        );

        wait_until("three log fetches", || {
            provider.count_calls(|call| matches!(call, Call::Logs(..))) >= 3
        })
        .await;
        handle.cancel().await.unwrap();

        assert_eq!(
            canvas.writes_with(StyleHint::Plain),
            vec!["line1\n".to_string(), "line2\n".to_string()]
        );
        assert!(canvas.text().contains("logs default/a"));
    }

    #[tokio::test]
    async fn describe_renders_once_and_waits_for_stop() {
        let provider = Arc::new(FakeProvider::new());
        let canvas = RecordingCanvas::new();
        let (_status_tx, status_rx) = watch::channel(None);
        let (handle, ready) = spawn_describe(
            provider.clone(),
            timings(),
            DescribeTarget {
                view: ViewKind::StatefulWorkloads,
                namespace: "default".to_string(),
                name: "web".to_string(),
            },
            status_rx,
            canvas.clone(),
        );

        ready.await.unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(handle.kind(), DisplayKind::Describing);
        handle.cancel().await.unwrap();

        assert_eq!(
            provider.calls(),
            vec![Call::Describe(
                ViewKind::StatefulWorkloads,
                "default".to_string(),
                "web".to_string()
            )]
        );
        assert!(canvas.text().contains("Name: web"));
    }

    #[tokio::test]
    async fn describe_failure_is_reported_and_task_exits() {
        let provider = Arc::new(FakeProvider::new().with_describe_failure("not found"));
        let (_status_tx, status_rx) = watch::channel(None);
        let (handle, ready) = spawn_describe(
            provider,
            timings(),
            DescribeTarget {
                view: ViewKind::Pods,
                namespace: "default".to_string(),
                name: "gone".to_string(),
            },
            status_rx,
            RecordingCanvas::new(),
        );

        let error = ready.await.unwrap().unwrap_err();
        assert!(error.to_string().contains("not found"));
        let outcome = handle.cancel().await.unwrap();
        assert_eq!(outcome.listed, None);
    }

    #[tokio::test]
    async fn describe_redraws_status_row_while_parked() {
        let provider = Arc::new(FakeProvider::new());
        let canvas = RecordingCanvas::new();
        let (status_tx, status_rx) = watch::channel(None);
        let (handle, ready) = spawn_describe(
            provider,
            timings(),
            DescribeTarget {
                view: ViewKind::Namespaces,
                namespace: "default".to_string(),
                name: "kube-system".to_string(),
            },
            status_rx,
            canvas.clone(),
        );
        ready.await.unwrap().unwrap();

        status_tx.send_replace(Some("saving logs is only available in the Pods view".into()));
        wait_until("status on describe screen", || {
            canvas
                .writes_with(StyleHint::Warning)
                .iter()
                .any(|line| line.contains("only available in the Pods view"))
        })
        .await;
        handle.cancel().await.unwrap();

        let ops = canvas.ops();
        let last_restore = ops
            .iter()
            .rposition(|op| *op == CanvasOp::RestoreCursor)
            .unwrap();
        let last_save = ops
            .iter()
            .rposition(|op| *op == CanvasOp::SaveCursor)
            .unwrap();
        assert!(last_save < last_restore);
    }

    #[tokio::test]
    async fn streaming_shows_status_without_touching_log_text() {
        let provider = Arc::new(FakeProvider::new().with_logs(&["line1\n"]));
        let canvas = RecordingCanvas::new();
        let (status_tx, status_rx) = watch::channel(None);
        let handle = spawn_streaming(
            provider.clone(),
            timings(),
            LogTarget {
                namespace: "default".to_string(),
                pod_name: "a".to_string(),
            },
            status_rx,
            canvas.clone(),
        );

        wait_until("first log fetch", || {
            provider.count_calls(|call| matches!(call, Call::Logs(..))) >= 1
        })
        .await;
        status_tx.send_replace(Some("Saved logs to ./a.log".into()));
        wait_until("status on log screen", || {
            canvas
                .writes_with(StyleHint::Warning)
                .contains(&"Saved logs to ./a.log".to_string())
        })
        .await;

        let fetched = provider.count_calls(|call| matches!(call, Call::Logs(..)));
        wait_until("polling continues", || {
            provider.count_calls(|call| matches!(call, Call::Logs(..))) > fetched
        })
        .await;
        handle.cancel().await.unwrap();

        assert_eq!(
            canvas.writes_with(StyleHint::Plain),
            vec!["line1\n".to_string()]
        );
    }
}
