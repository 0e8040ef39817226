use std::io::{self, Stdout, Write};

use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
};
use crossterm::terminal::{Clear, ClearType};

const ACCENT: Color = Color::Rgb {
    r: 52,
    g: 211,
    b: 153,
};
const MUTED: Color = Color::Rgb {
    r: 140,
    g: 156,
    b: 178,
};
const WARN: Color = Color::Rgb {
    r: 251,
    g: 191,
    b: 36,
};
const ERROR: Color = Color::Rgb {
    r: 248,
    g: 113,
    b: 113,
};
const HIGHLIGHT_BG: Color = Color::Rgb {
    r: 17,
    g: 94,
    b: 89,
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum StyleHint {
    Plain,
    Heading,
    Highlight,
    Muted,
    Warning,
    Error,
}

/// Drawing surface owned by whichever display task is in the foreground.
pub trait Canvas: Send + 'static {
    fn clear(&mut self) -> io::Result<()>;
    fn move_cursor(&mut self, row: u16, col: u16) -> io::Result<()>;
    fn save_cursor(&mut self) -> io::Result<()>;
    fn restore_cursor(&mut self) -> io::Result<()>;
    /// Blanks the row the cursor is on.
    fn clear_line(&mut self) -> io::Result<()>;
    fn write(&mut self, text: &str, style: StyleHint) -> io::Result<()>;
    fn flush(&mut self) -> io::Result<()>;
    /// `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;
}

pub struct TerminalCanvas<W: Write + Send + 'static = Stdout> {
    out: W,
}

impl TerminalCanvas<Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W: Write + Send + 'static> TerminalCanvas<W> {
    #[cfg(test)]
    pub fn new(out: W) -> Self {
        Self { out }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write + Send + 'static> Canvas for TerminalCanvas<W> {
    fn clear(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))
    }

    fn move_cursor(&mut self, row: u16, col: u16) -> io::Result<()> {
        queue!(self.out, MoveTo(col, row))
    }

    fn save_cursor(&mut self) -> io::Result<()> {
        queue!(self.out, SavePosition)
    }

    fn restore_cursor(&mut self) -> io::Result<()> {
        queue!(self.out, RestorePosition)
    }

    fn clear_line(&mut self) -> io::Result<()> {
        queue!(self.out, Clear(ClearType::CurrentLine))
    }

    fn write(&mut self, text: &str, style: StyleHint) -> io::Result<()> {
        // raw mode: a bare line feed does not return the carriage
        let text = text.replace('\n', "\r\n");
        match style {
            StyleHint::Plain => queue!(self.out, Print(text)),
            StyleHint::Heading => queue!(
                self.out,
                SetForegroundColor(ACCENT),
                SetAttribute(Attribute::Bold),
                Print(text),
                SetAttribute(Attribute::Reset),
                ResetColor
            ),
            StyleHint::Highlight => queue!(
                self.out,
                SetBackgroundColor(HIGHLIGHT_BG),
                SetForegroundColor(Color::White),
                Print(text),
                ResetColor
            ),
            StyleHint::Muted => queue!(self.out, SetForegroundColor(MUTED), Print(text), ResetColor),
            StyleHint::Warning => queue!(self.out, SetForegroundColor(WARN), Print(text), ResetColor),
            StyleHint::Error => queue!(self.out, SetForegroundColor(ERROR), Print(text), ResetColor),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }
}
