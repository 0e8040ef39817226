use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum ViewKind {
    Pods,
    StatefulWorkloads,
    CustomResourceDefinitions,
    Namespaces,
}

impl ViewKind {
    pub const ALL: [Self; 4] = [
        Self::Pods,
        Self::StatefulWorkloads,
        Self::CustomResourceDefinitions,
        Self::Namespaces,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Pods => "Pods",
            Self::StatefulWorkloads => "StatefulSets",
            Self::CustomResourceDefinitions => "CustomResourceDefinitions",
            Self::Namespaces => "Namespaces",
        }
    }

    /// Kubernetes kind of a single item in this view.
    pub fn item_kind(self) -> &'static str {
        match self {
            Self::Pods => "Pod",
            Self::StatefulWorkloads => "StatefulSet",
            Self::CustomResourceDefinitions => "CustomResourceDefinition",
            Self::Namespaces => "Namespace",
        }
    }

    pub fn short_token(self) -> &'static str {
        match self {
            Self::Pods => "po",
            Self::StatefulWorkloads => "sts",
            Self::CustomResourceDefinitions => "crd",
            Self::Namespaces => "ns",
        }
    }

    pub fn namespaced(self) -> bool {
        matches!(self, Self::Pods | Self::StatefulWorkloads)
    }
}

impl Display for ViewKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum Command {
    SwitchView(ViewKind),
    MoveUp,
    MoveDown,
    Delete,
    SelectEnter,
    StartLogStream,
    SaveLogSnapshot,
    Describe,
    Quit,
}

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResourceSummary {
    pub name: String,
    pub kind: String,
    pub status: String,
}

impl ResourceSummary {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            status: status.into(),
        }
    }
}

/// Navigation state owned by the controller.
///
/// `cursor_line` stays inside the bounds of the most recent list observed for
/// `view`; when no list for the current view has been observed yet it is 0.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct SessionState {
    view: ViewKind,
    namespace: String,
    cursor_line: usize,
    listed_len: Option<usize>,
}

impl SessionState {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            view: ViewKind::Pods,
            namespace: namespace.into(),
            cursor_line: 0,
            listed_len: None,
        }
    }

    pub fn view(&self) -> ViewKind {
        self.view
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn cursor_line(&self) -> usize {
        self.cursor_line
    }

    /// Size of the last list fetched for the current view, if any.
    pub fn listed_len(&self) -> Option<usize> {
        self.listed_len
    }

    pub fn switch_view(&mut self, view: ViewKind) {
        self.view = view;
        self.cursor_line = 0;
        self.listed_len = None;
    }

    pub fn observe_len(&mut self, len: usize) {
        self.listed_len = Some(len);
        self.cursor_line = clamp_cursor(self.cursor_line, len);
    }

    pub fn move_cursor(&mut self, delta: isize) {
        let len = self.listed_len.unwrap_or(0);
        let moved = self.cursor_line.saturating_add_signed(delta);
        self.cursor_line = clamp_cursor(moved, len);
    }

    pub fn reset_cursor(&mut self) {
        self.cursor_line = 0;
    }

    /// Makes `namespace` the active one. Ignored outside the Namespaces view.
    pub fn select_namespace(&mut self, namespace: impl Into<String>) -> bool {
        if self.view != ViewKind::Namespaces {
            return false;
        }
        self.namespace = namespace.into();
        true
    }
}

pub fn clamp_cursor(line: usize, len: usize) -> usize {
    line.min(len.saturating_sub(1))
}
