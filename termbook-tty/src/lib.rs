use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    cursor,
    event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    queue,
    style::{Attribute, Print, SetAttribute},
    terminal::{Clear, ClearType},
};
use termbook_core::{ChapterState, Intent, PageView, Viewport};

const LIBRARY_FIRST_ROW: u16 = 3;
const EMPTY_LIBRARY_MESSAGE: &str = "No books found (no .epub or .txt files in this directory).";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayoutOptions {
    pub max_text_width: usize,
    /// Columns kept free around the text column, split between both sides.
    pub horizontal_margin: usize,
    pub show_help: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            max_text_width: 80,
            horizontal_margin: 10,
            show_help: true,
        }
    }
}

/// Where the text column and footer rows go for a given terminal size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaderLayout {
    pub columns: u16,
    pub rows: u16,
    pub text: Viewport,
    pub left: u16,
    pub top: u16,
    pub status_row: u16,
    pub help_row: Option<u16>,
}

impl ReaderLayout {
    pub fn new(columns: u16, rows: u16, options: LayoutOptions) -> Self {
        let columns = columns.max(1);
        let rows = rows.max(1);
        let width = options
            .max_text_width
            .min(usize::from(columns).saturating_sub(options.horizontal_margin));
        let text_width = width.max(1);
        let left = (usize::from(columns).saturating_sub(text_width) / 2) as u16;

        // blank row above and below the page, then status and help
        let chrome = 3 + usize::from(options.show_help);
        let text_height = usize::from(rows).saturating_sub(chrome);
        let help_row = options.show_help.then(|| rows.saturating_sub(1));
        let status_row = rows.saturating_sub(1 + u16::from(options.show_help));

        Self {
            columns,
            rows,
            text: Viewport::clamped(text_width, text_height),
            left,
            top: 1,
            status_row,
            help_row,
        }
    }

    /// Rows available for library entries, between the heading and the status row.
    pub fn library_rows(&self) -> usize {
        usize::from(self.status_row.saturating_sub(LIBRARY_FIRST_ROW))
    }
}

pub struct TextRenderer<W: Write> {
    writer: W,
}

impl<W: Write> TextRenderer<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn writer(&mut self) -> &mut W {
        &mut self.writer
    }

    pub fn into_inner(self) -> W {
        self.writer
    }

    pub fn draw_page(
        &mut self,
        page: &PageView<'_>,
        layout: &ReaderLayout,
        status: &str,
        help: &str,
    ) -> Result<()> {
        self.clear_all()?;
        let room = usize::from(layout.columns.saturating_sub(layout.left));
        for (offset, line) in page.lines.iter().enumerate() {
            let row = layout.top.saturating_add(offset as u16);
            if row >= layout.status_row {
                break;
            }
            queue!(
                self.writer,
                cursor::MoveTo(layout.left, row),
                Print(truncate(line, room))
            )?;
        }
        self.draw_footer(layout, status, help)?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn draw_library(
        &mut self,
        entries: &[String],
        selected: usize,
        scroll_offset: usize,
        layout: &ReaderLayout,
        status: &str,
        help: &str,
    ) -> Result<()> {
        self.clear_all()?;
        let columns = usize::from(layout.columns);
        queue!(
            self.writer,
            cursor::MoveTo(2, 1),
            SetAttribute(Attribute::Bold),
            Print("LIBRARY"),
            SetAttribute(Attribute::Reset)
        )?;

        let first_row = LIBRARY_FIRST_ROW;
        if entries.is_empty() {
            queue!(
                self.writer,
                cursor::MoveTo(2, first_row),
                Print(truncate(EMPTY_LIBRARY_MESSAGE, columns))
            )?;
        }

        let visible = layout.library_rows();
        for (idx, entry) in entries.iter().enumerate().skip(scroll_offset).take(visible) {
            let row = first_row + (idx - scroll_offset) as u16;
            let label = truncate(entry, columns.saturating_sub(4));
            if idx == selected {
                queue!(
                    self.writer,
                    cursor::MoveTo(0, row),
                    Print("> "),
                    SetAttribute(Attribute::Reverse),
                    Print(label),
                    SetAttribute(Attribute::Reset)
                )?;
            } else {
                queue!(self.writer, cursor::MoveTo(4, row), Print(label))?;
            }
        }

        self.draw_footer(layout, status, help)?;
        self.writer.flush()?;
        Ok(())
    }

    fn draw_footer(&mut self, layout: &ReaderLayout, status: &str, help: &str) -> Result<()> {
        let columns = usize::from(layout.columns);
        if !status.is_empty() {
            let status = truncate(status, columns);
            queue!(
                self.writer,
                cursor::MoveTo(centered(status.chars().count(), columns), layout.status_row),
                Print(status)
            )?;
        }
        if let Some(row) = layout.help_row {
            let help = truncate(help, columns);
            queue!(
                self.writer,
                cursor::MoveTo(centered(help.chars().count(), columns), row),
                SetAttribute(Attribute::Dim),
                Print(help),
                SetAttribute(Attribute::Reset)
            )?;
        }
        Ok(())
    }

    pub fn begin_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026h")?;
        Ok(())
    }

    /// Disables synchronized updates.
    /// The terminal will render all buffered changes at once.
    pub fn end_sync_update(&mut self) -> Result<()> {
        write!(self.writer, "\u{1b}[?2026l")?;
        self.writer.flush()?;
        Ok(())
    }

    /// Clears the entire screen.
    pub fn clear_all(&mut self) -> Result<()> {
        queue!(
            &mut self.writer,
            Clear(ClearType::All),
            cursor::MoveTo(0, 0)
        )?;
        Ok(())
    }
}

fn centered(width: usize, columns: usize) -> u16 {
    (columns.saturating_sub(width) / 2) as u16
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Builds the status row: document name, position, chapter problems, and any pending key input.
pub fn format_status(title: Option<&str>, page: &PageView<'_>, pending: Option<&str>) -> String {
    let mut status = page.status_label();
    if let Some(title) = title.filter(|t| !t.is_empty()) {
        status = format!("{title} | {status}");
    }
    match page.state {
        ChapterState::Ready => {}
        ChapterState::Empty => status.push_str(" | no text"),
        ChapterState::Unavailable(_) => status.push_str(" | unavailable"),
    }
    if let Some(pending) = pending.filter(|p| !p.is_empty()) {
        status.push_str(" | ");
        status.push_str(pending);
    }
    status
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    /// Apply `intent` `count` times.
    Navigate { intent: Intent, count: usize },
    Resize { columns: u16, rows: u16 },
    LibraryMoveSelection { delta: isize },
    LibraryOpenSelection,
    /// Leave the reader (back to the library when there is one).
    Close,
    Quit,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InputMode {
    #[default]
    Reader,
    Library,
}

#[derive(Debug, Default)]
pub struct EventMapper {
    pending_count: Option<usize>,
    pending_digits: String,
    mode: InputMode,
}

impl EventMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&mut self, mode: InputMode) {
        if self.mode != mode {
            self.reset_count();
            self.mode = mode;
        }
    }

    pub fn map_event(&mut self, event: Event) -> UiEvent {
        match event {
            Event::Resize(columns, rows) => UiEvent::Resize { columns, rows },
            Event::Key(KeyEvent {
                kind: KeyEventKind::Release,
                ..
            }) => UiEvent::None,
            Event::Key(KeyEvent {
                code: KeyCode::Char('c'),
                modifiers,
                ..
            }) if modifiers.contains(KeyModifiers::CONTROL) => UiEvent::Quit,
            Event::Key(key) => match self.mode {
                InputMode::Reader => self.map_key_reader(key),
                InputMode::Library => self.map_key_library(key),
            },
            _ => UiEvent::None,
        }
    }

    fn map_key_reader(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char(c), KeyModifiers::NONE) if c.is_ascii_digit() => {
                if let Some(digit) = c.to_digit(10) {
                    self.push_digit(digit as usize);
                }
                UiEvent::None
            }
            (KeyCode::Char('n' | 'l' | 'j' | ' '), KeyModifiers::NONE)
            | (KeyCode::Right | KeyCode::Down | KeyCode::PageDown, _) => {
                self.navigate(Intent::NextPage)
            }
            (KeyCode::Char('p' | 'h' | 'k'), KeyModifiers::NONE)
            | (KeyCode::Left | KeyCode::Up | KeyCode::PageUp, _) => {
                self.navigate(Intent::PrevPage)
            }
            (KeyCode::Char('g'), KeyModifiers::NONE) | (KeyCode::Home, _) => {
                self.reset_count();
                UiEvent::Navigate {
                    intent: Intent::GoFirst,
                    count: 1,
                }
            }
            (KeyCode::Char('G'), _) | (KeyCode::End, _) => {
                self.reset_count();
                UiEvent::Navigate {
                    intent: Intent::GoLast,
                    count: 1,
                }
            }
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => {
                self.reset_count();
                UiEvent::Close
            }
            _ => {
                self.reset_count();
                UiEvent::None
            }
        }
    }

    fn map_key_library(&mut self, key: KeyEvent) -> UiEvent {
        match (key.code, key.modifiers) {
            (KeyCode::Char('j'), KeyModifiers::NONE) | (KeyCode::Down, _) => {
                UiEvent::LibraryMoveSelection { delta: 1 }
            }
            (KeyCode::Char('k'), KeyModifiers::NONE) | (KeyCode::Up, _) => {
                UiEvent::LibraryMoveSelection { delta: -1 }
            }
            (KeyCode::Enter, _) => UiEvent::LibraryOpenSelection,
            (KeyCode::Char('q'), _) | (KeyCode::Esc, _) => UiEvent::Quit,
            _ => UiEvent::None,
        }
    }

    fn navigate(&mut self, intent: Intent) -> UiEvent {
        let count = self.take_count();
        UiEvent::Navigate { intent, count }
    }

    fn push_digit(&mut self, digit: usize) {
        let current = self.pending_count.unwrap_or(0);
        let next = current.saturating_mul(10).saturating_add(digit);
        self.pending_count = Some(next);
        if let Some(c) = char::from_digit(digit as u32, 10) {
            self.pending_digits.push(c);
        }
    }

    fn take_count(&mut self) -> usize {
        let count = self
            .pending_count
            .take()
            .filter(|&count| count > 0)
            .unwrap_or(1);
        self.pending_digits.clear();
        count
    }

    fn reset_count(&mut self) {
        self.pending_count = None;
        self.pending_digits.clear();
    }

    pub fn pending_input(&self) -> Option<String> {
        if self.pending_digits.is_empty() {
            None
        } else {
            Some(self.pending_digits.clone())
        }
    }
}

pub fn write_status_line<W: Write>(writer: &mut W, label: &str) -> io::Result<()> {
    write!(writer, "{}", label)?;
    writer.flush()
}
