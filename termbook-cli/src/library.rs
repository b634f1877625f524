use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use termbook_epub::is_supported;

/// Lists the readable books directly inside `dir`, sorted by file name. Symlinks are followed.
pub fn find_books(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).with_context(|| format!("failed to list directory {:?}", dir))?;
    let mut books = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if is_supported(&path) && path.is_file() {
            books.push(path);
        }
    }
    books.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(books)
}

pub struct LibraryWindow {
    books: Vec<PathBuf>,
    labels: Vec<String>,
    selected: usize,
    scroll_offset: usize,
}

impl LibraryWindow {
    pub fn new(books: Vec<PathBuf>) -> Self {
        let labels = books
            .iter()
            .map(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string())
            })
            .collect();
        Self {
            books,
            labels,
            selected: 0,
            scroll_offset: 0,
        }
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn scroll_offset(&self) -> usize {
        self.scroll_offset
    }

    pub fn selected_book(&self) -> Option<&Path> {
        self.books.get(self.selected).map(PathBuf::as_path)
    }

    pub fn move_selection(&mut self, delta: isize) -> bool {
        if self.books.is_empty() {
            return false;
        }
        let len = self.books.len() as isize;
        let next = (self.selected as isize + delta).clamp(0, len - 1) as usize;
        if next != self.selected {
            self.selected = next;
            true
        } else {
            false
        }
    }

    pub fn ensure_visible(&mut self, visible_rows: usize) {
        if visible_rows == 0 || self.books.is_empty() {
            self.scroll_offset = 0;
            return;
        }
        let max_offset = self.books.len().saturating_sub(visible_rows);
        self.scroll_offset = self.scroll_offset.min(max_offset);
        if self.selected < self.scroll_offset {
            self.scroll_offset = self.selected;
        } else if self.selected >= self.scroll_offset + visible_rows {
            self.scroll_offset = self.selected + 1 - visible_rows;
        }
    }
}
