//! In-memory collaborators for controller and display-task tests.

use std::collections::{BTreeMap, VecDeque};
use std::io;
use std::sync::mpsc::{Receiver, Sender, channel};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyModifiers};

use crate::canvas::{Canvas, StyleHint};
use crate::error::{DecodeError, FetchError};
use crate::model::{ResourceSummary, ViewKind};
use crate::provider::ResourceProvider;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    ListPods(String),
    ListStatefulWorkloads(String),
    ListCustomResourceDefinitions,
    ListNamespaces,
    Delete(ViewKind, String, String),
    Logs(String, String),
    Describe(ViewKind, String, String),
}

#[derive(Default)]
struct FakeCluster {
    pods: BTreeMap<String, Vec<ResourceSummary>>,
    statefulsets: BTreeMap<String, Vec<ResourceSummary>>,
    crds: Vec<ResourceSummary>,
    namespaces: Vec<ResourceSummary>,
    logs: VecDeque<String>,
    last_log: String,
    describe_failure: Option<String>,
    list_failure: Option<String>,
    calls: Vec<Call>,
}

#[derive(Default)]
pub struct FakeProvider {
    cluster: Mutex<FakeCluster>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pods(self, namespace: &str, pods: &[(&str, &str)]) -> Self {
        let items = pods
            .iter()
            .map(|(name, status)| ResourceSummary::new(*name, "Pod", *status))
            .collect();
        self.lock().pods.insert(namespace.to_string(), items);
        self
    }

    pub fn with_statefulsets(self, namespace: &str, names: &[&str]) -> Self {
        let items = names
            .iter()
            .map(|name| ResourceSummary::new(*name, "StatefulSet", "1/1"))
            .collect();
        self.lock().statefulsets.insert(namespace.to_string(), items);
        self
    }

    pub fn with_namespaces(self, names: &[&str]) -> Self {
        self.lock().namespaces = names
            .iter()
            .map(|name| ResourceSummary::new(*name, "Namespace", "Active"))
            .collect();
        self
    }

    /// Successive log fetches return these snapshots; the last one repeats.
    pub fn with_logs(self, snapshots: &[&str]) -> Self {
        self.lock().logs = snapshots.iter().map(|text| text.to_string()).collect();
        self
    }

    pub fn with_describe_failure(self, message: &str) -> Self {
        self.lock().describe_failure = Some(message.to_string());
        self
    }

    pub fn fail_lists(&self, message: Option<&str>) {
        self.lock().list_failure = message.map(str::to_string);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn count_calls(&self, predicate: impl Fn(&Call) -> bool) -> usize {
        self.lock().calls.iter().filter(|call| predicate(call)).count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, FakeCluster> {
        self.cluster.lock().unwrap()
    }

    fn listed(
        &self,
        call: Call,
        pick: impl FnOnce(&FakeCluster) -> Vec<ResourceSummary>,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        let mut cluster = self.lock();
        cluster.calls.push(call);
        if let Some(message) = cluster.list_failure.clone() {
            return Err(FetchError::remote("list", message));
        }
        Ok(pick(&cluster))
    }
}

impl ResourceProvider for FakeProvider {
    async fn list_pods(&self, namespace: &str) -> Result<Vec<ResourceSummary>, FetchError> {
        self.listed(Call::ListPods(namespace.to_string()), |cluster| {
            cluster.pods.get(namespace).cloned().unwrap_or_default()
        })
    }

    async fn list_stateful_workloads(
        &self,
        namespace: &str,
    ) -> Result<Vec<ResourceSummary>, FetchError> {
        self.listed(Call::ListStatefulWorkloads(namespace.to_string()), |cluster| {
            cluster.statefulsets.get(namespace).cloned().unwrap_or_default()
        })
    }

    async fn list_custom_resource_definitions(&self) -> Result<Vec<ResourceSummary>, FetchError> {
        self.listed(Call::ListCustomResourceDefinitions, |cluster| {
            cluster.crds.clone()
        })
    }

    async fn list_namespaces(&self) -> Result<Vec<ResourceSummary>, FetchError> {
        self.listed(Call::ListNamespaces, |cluster| cluster.namespaces.clone())
    }

    async fn delete_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> Result<(), FetchError> {
        let mut cluster = self.lock();
        cluster
            .calls
            .push(Call::Delete(kind, namespace.to_string(), name.to_string()));
        let items = match kind {
            ViewKind::Pods => cluster.pods.get_mut(namespace),
            ViewKind::StatefulWorkloads => cluster.statefulsets.get_mut(namespace),
            ViewKind::CustomResourceDefinitions => Some(&mut cluster.crds),
            ViewKind::Namespaces => Some(&mut cluster.namespaces),
        };
        if let Some(items) = items {
            items.retain(|item| item.name != name);
        }
        Ok(())
    }

    async fn stream_logs(&self, namespace: &str, pod_name: &str) -> Result<String, FetchError> {
        let mut cluster = self.lock();
        cluster
            .calls
            .push(Call::Logs(namespace.to_string(), pod_name.to_string()));
        if let Some(next) = cluster.logs.pop_front() {
            cluster.last_log = next;
        }
        Ok(cluster.last_log.clone())
    }

    async fn describe_resource(
        &self,
        kind: ViewKind,
        namespace: &str,
        name: &str,
    ) -> Result<String, FetchError> {
        let mut cluster = self.lock();
        cluster
            .calls
            .push(Call::Describe(kind, namespace.to_string(), name.to_string()));
        match cluster.describe_failure.clone() {
            Some(message) => Err(FetchError::remote(format!("describe {name}"), message)),
            None => Ok(format!("Name: {name}\nKind: {}", kind.item_kind())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CanvasOp {
    Clear,
    MoveCursor(u16, u16),
    SaveCursor,
    RestoreCursor,
    ClearLine,
    Write(String, StyleHint),
    Flush,
}

/// Canvas that records every operation into a log shared with the test.
#[derive(Clone, Default)]
pub struct RecordingCanvas {
    ops: Arc<Mutex<Vec<CanvasOp>>>,
}

impl RecordingCanvas {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ops(&self) -> Vec<CanvasOp> {
        self.ops.lock().unwrap().clone()
    }

    pub fn text(&self) -> String {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CanvasOp::Write(text, _) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn writes_with(&self, style: StyleHint) -> Vec<String> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                CanvasOp::Write(text, hint) if hint == style => Some(text),
                _ => None,
            })
            .collect()
    }

    fn push(&self, op: CanvasOp) {
        self.ops.lock().unwrap().push(op);
    }
}

impl Canvas for RecordingCanvas {
    fn clear(&mut self) -> io::Result<()> {
        self.push(CanvasOp::Clear);
        Ok(())
    }

    fn move_cursor(&mut self, row: u16, col: u16) -> io::Result<()> {
        self.push(CanvasOp::MoveCursor(row, col));
        Ok(())
    }

    fn save_cursor(&mut self) -> io::Result<()> {
        self.push(CanvasOp::SaveCursor);
        Ok(())
    }

    fn restore_cursor(&mut self) -> io::Result<()> {
        self.push(CanvasOp::RestoreCursor);
        Ok(())
    }

    fn clear_line(&mut self) -> io::Result<()> {
        self.push(CanvasOp::ClearLine);
        Ok(())
    }

    fn write(&mut self, text: &str, style: StyleHint) -> io::Result<()> {
        self.push(CanvasOp::Write(text.to_string(), style));
        Ok(())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.push(CanvasOp::Flush);
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok((100, 30))
    }
}

/// Input source fed from the test through a channel. Closing the channel
/// makes the next read fail.
pub struct ScriptedInput {
    events: Mutex<Receiver<Event>>,
}

impl ScriptedInput {
    pub fn new() -> (Self, Sender<Event>) {
        let (tx, rx) = channel();
        (
            Self {
                events: Mutex::new(rx),
            },
            tx,
        )
    }
}

impl crate::input::InputSource for ScriptedInput {
    fn read_event(&self) -> Result<Event, DecodeError> {
        let events = self
            .events
            .lock()
            .map_err(|_| io::Error::other("scripted input poisoned"))?;
        events
            .recv()
            .map_err(|_| DecodeError(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed")))
    }
}

pub fn key(code: KeyCode) -> Event {
    Event::Key(KeyEvent::new(code, KeyModifiers::NONE))
}

pub fn char_key(c: char) -> Event {
    key(KeyCode::Char(c))
}

/// Polls `condition` until it holds, failing the test after two seconds.
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {what}"
        );
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}
