use std::sync::Arc;

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::trace;

use crate::error::DecodeError;
use crate::model::{Command, ViewKind};

/// What a decoder invocation posts to the controller.
pub type Decoded = Result<Command, DecodeError>;

/// Blocking source of raw terminal events, one event per call.
pub trait InputSource: Send + Sync + 'static {
    fn read_event(&self) -> Result<Event, DecodeError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalInput;

impl InputSource for TerminalInput {
    fn read_event(&self) -> Result<Event, DecodeError> {
        crossterm::event::read().map_err(DecodeError::from)
    }
}

/// The one key table. Letters are matched lowercase.
pub const KEY_BINDINGS: [(KeyCode, Command); 15] = [
    (KeyCode::Char('0'), Command::SwitchView(ViewKind::Pods)),
    (KeyCode::Char('1'), Command::SwitchView(ViewKind::StatefulWorkloads)),
    (
        KeyCode::Char('2'),
        Command::SwitchView(ViewKind::CustomResourceDefinitions),
    ),
    (KeyCode::Char('3'), Command::SwitchView(ViewKind::Namespaces)),
    (KeyCode::Up, Command::MoveUp),
    (KeyCode::Char('k'), Command::MoveUp),
    (KeyCode::Down, Command::MoveDown),
    (KeyCode::Char('j'), Command::MoveDown),
    (KeyCode::Enter, Command::SelectEnter),
    (KeyCode::Char('d'), Command::Delete),
    (KeyCode::Char('l'), Command::StartLogStream),
    (KeyCode::Char('s'), Command::SaveLogSnapshot),
    (KeyCode::Char('g'), Command::Describe),
    (KeyCode::Char('q'), Command::Quit),
    (KeyCode::Esc, Command::Quit),
];

pub fn map_key(key: KeyEvent) -> Option<Command> {
    if key.kind != KeyEventKind::Press {
        return None;
    }

    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Command::Quit),
            _ => None,
        };
    }

    if key.modifiers.intersects(KeyModifiers::ALT | KeyModifiers::SUPER) {
        return None;
    }

    let code = match key.code {
        KeyCode::Char(c) => KeyCode::Char(c.to_ascii_lowercase()),
        other => other,
    };

    KEY_BINDINGS
        .iter()
        .find(|(bound, _)| *bound == code)
        .map(|(_, command)| *command)
}

/// Reads events until one maps to a command. Unmapped events are dropped.
pub fn decode_next<I: InputSource + ?Sized>(input: &I) -> Decoded {
    loop {
        match input.read_event()? {
            Event::Key(key) => {
                if let Some(command) = map_key(key) {
                    return Ok(command);
                }
                trace!("dropping unmapped key {:?}", key.code);
            }
            other => trace!("dropping non-key event {other:?}"),
        }
    }
}

/// One decoder invocation: post exactly one message, then exit.
pub fn spawn_decoder<I: InputSource>(input: Arc<I>, tx: mpsc::Sender<Decoded>) -> JoinHandle<()> {
    tokio::task::spawn_blocking(move || {
        let decoded = decode_next(input.as_ref());
        let _ = tx.blocking_send(decoded);
    })
}
