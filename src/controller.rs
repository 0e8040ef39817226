//! The render supervisor: reads one command at a time, stops the foreground
//! display task, applies the command to the session state and decides which
//! display task runs next.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::canvas::Canvas;
use crate::display::{
    DescribeTarget, DisplayTaskHandle, ListingRequest, LogTarget, Timings, spawn_describe,
    spawn_listing, spawn_streaming,
};
use crate::error::{ActionError, ControllerError, FetchError};
use crate::input::{Decoded, InputSource, spawn_decoder};
use crate::model::{Command, ResourceSummary, SessionState, ViewKind};
use crate::provider::{ResourceProvider, bounded, list_view};
use crate::snapshot::write_snapshot;

#[derive(Debug, Clone)]
pub struct ControllerSettings {
    pub timings: Timings,
    pub snapshot_dir: PathBuf,
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Phase {
    Listing(ViewKind),
    Streaming,
    Describing,
    Stopped,
}

enum Flow {
    Continue,
    Stop,
}

/// Who holds the canvas right now.
enum Foreground<C> {
    Idle(C),
    Running(DisplayTaskHandle<C>),
}

pub struct Controller<P, I, C> {
    provider: Arc<P>,
    input: Arc<I>,
    settings: ControllerSettings,
    state: SessionState,
    phase: Phase,
    foreground: Option<Foreground<C>>,
    status_tx: watch::Sender<Option<String>>,
    commands_tx: mpsc::Sender<Decoded>,
    commands_rx: mpsc::Receiver<Decoded>,
}

impl<P: ResourceProvider, I: InputSource, C: Canvas> Controller<P, I, C> {
    pub fn new(
        provider: Arc<P>,
        input: Arc<I>,
        canvas: C,
        namespace: impl Into<String>,
        settings: ControllerSettings,
    ) -> Self {
        // single slot: at most one decoded command waits for the controller
        let (commands_tx, commands_rx) = mpsc::channel(1);
        let (status_tx, _) = watch::channel(None);
        Self {
            provider,
            input,
            settings,
            state: SessionState::new(namespace),
            phase: Phase::Listing(ViewKind::Pods),
            foreground: Some(Foreground::Idle(canvas)),
            status_tx,
            commands_tx,
            commands_rx,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Runs until `Quit` or a fatal error. The foreground task is stopped in
    /// both cases before this returns.
    pub async fn run(&mut self) -> Result<(), ControllerError> {
        info!(namespace = %self.state.namespace(), "controller started");
        let canvas = self.reclaim_canvas().await?;
        self.launch_listing(canvas);
        self.launch_decoder();

        while let Some(decoded) = self.commands_rx.recv().await {
            let command = match decoded {
                Ok(command) => command,
                Err(error) => {
                    warn!("input failed, shutting down: {error}");
                    if let Ok(canvas) = self.reclaim_canvas().await {
                        self.foreground = Some(Foreground::Idle(canvas));
                    }
                    self.phase = Phase::Stopped;
                    return Err(error.into());
                }
            };

            debug!(?command, phase = ?self.phase, "command received");
            match self.handle(command).await? {
                Flow::Continue => self.launch_decoder(),
                Flow::Stop => break,
            }
        }

        Ok(())
    }

    async fn handle(&mut self, command: Command) -> Result<Flow, ControllerError> {
        self.status_tx.send_replace(None);

        match command {
            Command::SwitchView(view) => {
                let canvas = self.reclaim_canvas().await?;
                self.state.switch_view(view);
                self.launch_listing(canvas);
            }
            Command::MoveUp | Command::MoveDown => {
                let canvas = self.reclaim_canvas().await?;
                self.ensure_listed_len().await;
                let delta = if command == Command::MoveUp { -1 } else { 1 };
                self.state.move_cursor(delta);
                self.launch_listing(canvas);
            }
            Command::Delete => {
                let canvas = self.reclaim_canvas().await?;
                let result = self.delete_selected().await;
                self.state.reset_cursor();
                self.report(result);
                self.launch_listing(canvas);
            }
            Command::SelectEnter => {
                let canvas = self.reclaim_canvas().await?;
                if self.state.view() == ViewKind::Namespaces {
                    let result = self.enter_namespace().await;
                    self.report(result);
                }
                self.launch_listing(canvas);
            }
            Command::StartLogStream => {
                if self.state.view() != ViewKind::Pods {
                    self.report(Err(ActionError::PodsOnly {
                        action: "log streaming",
                    }));
                    return Ok(Flow::Continue);
                }
                // a failed lookup leaves the current view running
                let pod = match self.selected_item().await {
                    Ok(pod) => pod,
                    Err(error) => {
                        self.report(Err(error));
                        return Ok(Flow::Continue);
                    }
                };
                let (canvas, _) = self.stop_foreground().await?;
                self.launch_streaming(canvas, pod.name);
            }
            Command::Describe => {
                let item = match self.selected_item().await {
                    Ok(item) => item,
                    Err(error) => {
                        self.report(Err(error));
                        return Ok(Flow::Continue);
                    }
                };
                let (canvas, _) = self.stop_foreground().await?;
                self.describe(canvas, item.name).await?;
            }
            Command::SaveLogSnapshot => {
                // runs inline; whatever is on screen stays there
                let result = self.save_snapshot().await;
                self.report(result);
            }
            Command::Quit => {
                let canvas = self.reclaim_canvas().await?;
                self.foreground = Some(Foreground::Idle(canvas));
                self.phase = Phase::Stopped;
                info!("quit requested");
                return Ok(Flow::Stop);
            }
        }

        Ok(Flow::Continue)
    }

    /// Stops the foreground task, if one is running, and takes its canvas.
    /// The cursor is clamped to the last list that task drew.
    async fn reclaim_canvas(&mut self) -> Result<C, ControllerError> {
        let (canvas, listed) = self.stop_foreground().await?;
        if let Some(len) = listed {
            self.state.observe_len(len);
        }
        Ok(canvas)
    }

    /// Stops the foreground task and hands back its canvas together with the
    /// length of the last list it drew, without touching the session.
    async fn stop_foreground(&mut self) -> Result<(C, Option<usize>), ControllerError> {
        match self.foreground.take() {
            Some(Foreground::Idle(canvas)) => Ok((canvas, None)),
            Some(Foreground::Running(task)) => {
                let kind = task.kind();
                let outcome = task.cancel().await?;
                debug!(?kind, "foreground task stopped");
                Ok((outcome.canvas, outcome.listed))
            }
            None => Err(ControllerError::CanvasUnavailable),
        }
    }

    fn launch_listing(&mut self, canvas: C) {
        let view = self.state.view();
        let request = ListingRequest {
            view,
            namespace: self.state.namespace().to_string(),
            cursor_line: self.state.cursor_line(),
        };
        let task = spawn_listing(
            self.provider.clone(),
            self.settings.timings,
            request,
            self.status_tx.subscribe(),
            canvas,
        );
        self.foreground = Some(Foreground::Running(task));
        self.phase = Phase::Listing(view);
    }

    fn launch_streaming(&mut self, canvas: C, pod_name: String) {
        info!(namespace = %self.state.namespace(), pod = %pod_name, "streaming logs");
        let target = LogTarget {
            namespace: self.state.namespace().to_string(),
            pod_name,
        };
        let task = spawn_streaming(
            self.provider.clone(),
            self.settings.timings,
            target,
            self.status_tx.subscribe(),
            canvas,
        );
        self.foreground = Some(Foreground::Running(task));
        self.phase = Phase::Streaming;
    }

    fn launch_decoder(&self) {
        spawn_decoder(self.input.clone(), self.commands_tx.clone());
    }

    /// Waits until the description is on screen. On failure the listing is
    /// brought back with the error on the status line.
    async fn describe(&mut self, canvas: C, name: String) -> Result<(), ControllerError> {
        let target = DescribeTarget {
            view: self.state.view(),
            namespace: self.state.namespace().to_string(),
            name,
        };
        let (task, ready) = spawn_describe(
            self.provider.clone(),
            self.settings.timings,
            target,
            self.status_tx.subscribe(),
            canvas,
        );

        match ready.await {
            Ok(Ok(())) => {
                self.foreground = Some(Foreground::Running(task));
                self.phase = Phase::Describing;
            }
            Ok(Err(error)) => {
                let outcome = task.cancel().await?;
                self.report(Err(error.into()));
                self.launch_listing(outcome.canvas);
            }
            Err(_) => {
                let outcome = task.cancel().await?;
                self.launch_listing(outcome.canvas);
            }
        }
        Ok(())
    }

    async fn delete_selected(&mut self) -> Result<String, ActionError> {
        let item = self.selected_item().await?;
        let view = self.state.view();
        let namespace = self.state.namespace().to_string();
        bounded(
            "delete",
            self.settings.timings.request_timeout,
            self.provider.delete_resource(view, &namespace, &item.name),
        )
        .await?;

        Ok(if view.namespaced() {
            format!("Deleted {} {namespace}/{}", view.item_kind(), item.name)
        } else {
            format!("Deleted {} {}", view.item_kind(), item.name)
        })
    }

    async fn enter_namespace(&mut self) -> Result<String, ActionError> {
        let item = self.selected_item().await?;
        self.state.select_namespace(item.name.clone());
        Ok(format!("Namespace set to {}", item.name))
    }

    async fn save_snapshot(&mut self) -> Result<String, ActionError> {
        if self.state.view() != ViewKind::Pods {
            return Err(ActionError::PodsOnly {
                action: "saving logs",
            });
        }
        let pod = self.selected_item().await?;
        let log = bounded(
            "fetch logs",
            self.settings.timings.request_timeout,
            self.provider.stream_logs(self.state.namespace(), &pod.name),
        )
        .await?;
        let path = write_snapshot(&self.settings.snapshot_dir, &pod.name, &log, Local::now()).await?;
        Ok(format!("Saved logs to {}", path.display()))
    }

    /// Item under the cursor in a freshly fetched list.
    async fn selected_item(&mut self) -> Result<ResourceSummary, ActionError> {
        let items = self.fetch_current_list().await?;
        items
            .into_iter()
            .nth(self.state.cursor_line())
            .ok_or(ActionError::NothingSelected {
                view: self.state.view().item_kind(),
            })
    }

    async fn fetch_current_list(&mut self) -> Result<Vec<ResourceSummary>, FetchError> {
        let items = bounded(
            "list",
            self.settings.timings.request_timeout,
            list_view(
                self.provider.as_ref(),
                self.state.view(),
                self.state.namespace(),
            ),
        )
        .await?;
        self.state.observe_len(items.len());
        Ok(items)
    }

    async fn ensure_listed_len(&mut self) {
        if self.state.listed_len().is_some() {
            return;
        }
        if let Err(error) = self.fetch_current_list().await {
            warn!("could not size {} list: {error}", self.state.view());
        }
    }

    fn report(&self, result: Result<String, ActionError>) {
        let message = match result {
            Ok(message) => {
                info!("{message}");
                message
            }
            Err(error) => {
                warn!("{error}");
                error.to_string()
            }
        };
        self.status_tx.send_replace(Some(message));
    }
}
