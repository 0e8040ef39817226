use std::io;

use crate::canvas::{Canvas, StyleHint};
use crate::model::{ResourceSummary, ViewKind, clamp_cursor};

const KEY_HINTS: &str =
    "0 pods  1 sts  2 crds  3 ns  ↑↓ move  ⏎ select  d delete  l logs  s save  g describe  q quit";
const MIN_NAME_WIDTH: usize = 12;
const MAX_NAME_WIDTH: usize = 63;
/// Header line plus the blank line under it.
const HEADER_ROWS: u16 = 2;

pub struct ListingFrame<'a> {
    pub view: ViewKind,
    pub namespace: &'a str,
    pub items: &'a [ResourceSummary],
    pub cursor_line: usize,
    pub status: Option<&'a str>,
}

pub fn render_listing<C: Canvas>(canvas: &mut C, frame: &ListingFrame<'_>) -> io::Result<()> {
    let (width, height) = canvas.size().unwrap_or((80, 24));
    let cursor = clamp_cursor(frame.cursor_line, frame.items.len());
    let body_rows = usize::from(height.saturating_sub(HEADER_ROWS + 1)).max(1);
    let start = visible_window_start(cursor, frame.items.len(), body_rows);
    let name_width = name_column_width(frame.items);

    canvas.clear()?;
    canvas.move_cursor(0, 0)?;
    canvas.write(
        &fit(&header_line(frame.view, frame.namespace, frame.items.len()), width),
        StyleHint::Heading,
    )?;

    for (row, (index, item)) in frame
        .items
        .iter()
        .enumerate()
        .skip(start)
        .take(body_rows)
        .enumerate()
    {
        canvas.move_cursor(HEADER_ROWS + row as u16, 0)?;
        let line = fit(&format_row(frame.view, item, name_width), width);
        let style = if index == cursor {
            StyleHint::Highlight
        } else {
            StyleHint::Plain
        };
        canvas.write(&line, style)?;
    }

    if frame.items.is_empty() {
        canvas.move_cursor(HEADER_ROWS, 0)?;
        canvas.write(&format!("No {} found", frame.view.title()), StyleHint::Muted)?;
    }

    render_footer(canvas, height, width, frame.status)?;
    canvas.flush()
}

/// Shown in place of the list when a fetch failed.
pub fn render_unavailable<C: Canvas>(
    canvas: &mut C,
    view: ViewKind,
    namespace: &str,
    error: &str,
    status: Option<&str>,
) -> io::Result<()> {
    let (width, height) = canvas.size().unwrap_or((80, 24));
    canvas.clear()?;
    canvas.move_cursor(0, 0)?;
    canvas.write(
        &fit(&format!(" kubedeck │ {} │ ns:{namespace}", view.title()), width),
        StyleHint::Heading,
    )?;
    canvas.move_cursor(HEADER_ROWS, 0)?;
    canvas.write("data unavailable, retrying", StyleHint::Warning)?;
    canvas.move_cursor(HEADER_ROWS + 1, 0)?;
    canvas.write(&fit(error, width), StyleHint::Error)?;
    render_footer(canvas, height, width, status)?;
    canvas.flush()
}

pub fn render_describe<C: Canvas>(
    canvas: &mut C,
    view: ViewKind,
    namespace: &str,
    name: &str,
    text: &str,
) -> io::Result<()> {
    canvas.clear()?;
    canvas.move_cursor(0, 0)?;
    let target = if view.namespaced() {
        format!("{namespace}/{name}")
    } else {
        name.to_string()
    };
    canvas.write(
        &format!(" describe {} {target}\n\n", view.item_kind()),
        StyleHint::Heading,
    )?;
    canvas.write(text, StyleHint::Plain)?;
    canvas.flush()
}

pub fn render_log_header<C: Canvas>(canvas: &mut C, namespace: &str, pod_name: &str) -> io::Result<()> {
    canvas.clear()?;
    canvas.move_cursor(0, 0)?;
    canvas.write(&format!(" logs {namespace}/{pod_name}\n"), StyleHint::Heading)?;
    canvas.flush()
}

/// Redraws the bottom row over a log or describe screen and puts the cursor
/// back where the text left it.
pub fn render_status_overlay<C: Canvas>(canvas: &mut C, status: Option<&str>) -> io::Result<()> {
    let (width, height) = canvas.size().unwrap_or((80, 24));
    canvas.save_cursor()?;
    canvas.move_cursor(height.saturating_sub(1), 0)?;
    canvas.clear_line()?;
    render_footer(canvas, height, width, status)?;
    canvas.restore_cursor()?;
    canvas.flush()
}

fn render_footer<C: Canvas>(
    canvas: &mut C,
    height: u16,
    width: u16,
    status: Option<&str>,
) -> io::Result<()> {
    canvas.move_cursor(height.saturating_sub(1), 0)?;
    match status {
        Some(status) => canvas.write(&fit(status, width), StyleHint::Warning),
        None => canvas.write(&fit(KEY_HINTS, width), StyleHint::Muted),
    }
}

fn header_line(view: ViewKind, namespace: &str, count: usize) -> String {
    if view.namespaced() {
        format!(
            " kubedeck │ {} │ ns:{namespace} │ {count} item{}",
            view.title(),
            if count == 1 { "" } else { "s" }
        )
    } else {
        format!(
            " kubedeck │ {} │ {count} item{}",
            view.title(),
            if count == 1 { "" } else { "s" }
        )
    }
}

fn name_column_width(items: &[ResourceSummary]) -> usize {
    items
        .iter()
        .map(|item| item.name.chars().count())
        .max()
        .unwrap_or(0)
        .clamp(MIN_NAME_WIDTH, MAX_NAME_WIDTH)
}

fn format_row(view: ViewKind, item: &ResourceSummary, name_width: usize) -> String {
    let name = truncate(&item.name, name_width);
    // CRD rows also carry the kind they serve
    if view == ViewKind::CustomResourceDefinitions {
        format!(" {name:<name_width$}  {:<24}  {}", item.kind, item.status)
    } else {
        format!(" {name:<name_width$}  {}", item.status)
    }
}

/// First item index to draw so that `cursor` stays on screen.
pub fn visible_window_start(cursor: usize, len: usize, rows: usize) -> usize {
    if rows == 0 || len <= rows {
        return 0;
    }
    let cursor = clamp_cursor(cursor, len);
    (cursor + 1).saturating_sub(rows).min(len - rows)
}

fn fit(value: &str, width: u16) -> String {
    truncate(value, usize::from(width).max(1))
}

pub fn truncate(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }

    let mut out = value
        .chars()
        .take(max.saturating_sub(1))
        .collect::<String>();
    out.push('…');
    out
}
