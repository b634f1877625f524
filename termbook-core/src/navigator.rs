use std::sync::Arc;

use anyhow::{bail, Result};
use tracing::{debug, info, instrument, warn};

use crate::extract::expand_tabs;
use crate::paginate::Pages;
use crate::wrap::wrap;
use crate::{ChapterError, ContainerReader, DocumentInfo, Viewport};

pub const EMPTY_CHAPTER_MESSAGE: &str = "[This chapter has no readable text]";

/// Zero-based reading position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub chapter: usize,
    pub page: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    NextPage,
    PrevPage,
    GoFirst,
    GoLast,
    Resize(Viewport),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Bounds {
    pub chapter_count: usize,
    /// Page count of the current chapter.
    pub page_count: usize,
}

/// Where to land after switching chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Landing {
    FirstPage,
    LastPage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Stay,
    Page(usize),
    Chapter { index: usize, landing: Landing },
    Reflow(Viewport),
}

/// Pure navigation step. Chapter switches name a [`Landing`] instead of a page because the target
/// chapter's page count is only known once it has been laid out.
pub fn transition(position: Position, intent: Intent, bounds: Bounds) -> Transition {
    let Position { chapter, page } = position;
    let last_page = bounds.page_count.saturating_sub(1);
    match intent {
        Intent::NextPage => {
            if page < last_page {
                Transition::Page(page + 1)
            } else if chapter + 1 < bounds.chapter_count {
                Transition::Chapter {
                    index: chapter + 1,
                    landing: Landing::FirstPage,
                }
            } else {
                Transition::Stay
            }
        }
        Intent::PrevPage => {
            if page > 0 {
                Transition::Page(page - 1)
            } else if chapter > 0 {
                Transition::Chapter {
                    index: chapter - 1,
                    landing: Landing::LastPage,
                }
            } else {
                Transition::Stay
            }
        }
        Intent::GoFirst if page != 0 => Transition::Page(0),
        Intent::GoLast if page != last_page => Transition::Page(last_page),
        Intent::GoFirst | Intent::GoLast => Transition::Stay,
        Intent::Resize(viewport) => Transition::Reflow(viewport),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct NavigatorOptions {
    pub tab_width: usize,
}

impl Default for NavigatorOptions {
    fn default() -> Self {
        Self { tab_width: 4 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChapterState {
    Ready,
    /// Extraction produced only whitespace.
    Empty,
    /// The container could not supply the chapter.
    Unavailable(String),
}

/// What the presentation layer needs for one screen.
#[derive(Debug, Clone, Copy)]
pub struct PageView<'a> {
    pub lines: &'a [String],
    pub chapter_number: usize,
    pub chapter_count: usize,
    pub page_number: usize,
    pub page_count: usize,
    pub state: &'a ChapterState,
}

impl PageView<'_> {
    pub fn status_label(&self) -> String {
        format!(
            "Page {}/{} | Chapter {}/{}",
            self.page_number, self.page_count, self.chapter_number, self.chapter_count
        )
    }
}

/// The current chapter's derived text. Only one chapter is held at a time.
struct LoadedChapter {
    /// Tab-expanded chapter text, or the placeholder message when the chapter is not readable.
    text: String,
    state: ChapterState,
    pages: Pages,
}

impl LoadedChapter {
    fn new(text: String, state: ChapterState, viewport: Viewport) -> Self {
        let pages = layout(&text, &state, viewport);
        Self { text, state, pages }
    }

    fn relayout(&mut self, viewport: Viewport) {
        self.pages = layout(&self.text, &self.state, viewport);
    }
}

fn layout(text: &str, state: &ChapterState, viewport: Viewport) -> Pages {
    let mut lines = wrap(text, viewport.width);
    if *state != ChapterState::Ready {
        // placeholders always fill exactly one page
        lines.truncate(viewport.height);
    }
    Pages::new(lines, viewport.height)
}

pub struct Navigator {
    reader: Arc<dyn ContainerReader>,
    options: NavigatorOptions,
    viewport: Viewport,
    position: Position,
    chapter: LoadedChapter,
}

impl Navigator {
    /// Opens the first chapter at `viewport`. Fails only for a document without chapters.
    pub fn new(
        reader: Arc<dyn ContainerReader>,
        viewport: Viewport,
        options: NavigatorOptions,
    ) -> Result<Self> {
        if reader.chapter_count() == 0 {
            bail!("document {:?} has no chapters", reader.info().path);
        }
        let viewport = Viewport::clamped(viewport.width, viewport.height);
        let chapter = load_chapter(reader.as_ref(), 0, viewport, options);
        Ok(Self {
            reader,
            options,
            viewport,
            position: Position::default(),
            chapter,
        })
    }

    pub fn info(&self) -> &DocumentInfo {
        self.reader.info()
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn chapter_count(&self) -> usize {
        self.reader.chapter_count()
    }

    pub fn page_count(&self) -> usize {
        self.chapter.pages.len()
    }

    pub fn chapter_state(&self) -> &ChapterState {
        &self.chapter.state
    }

    pub fn bounds(&self) -> Bounds {
        Bounds {
            chapter_count: self.chapter_count(),
            page_count: self.page_count(),
        }
    }

    /// Applies one intent to completion. Returns whether the visible page changed.
    pub fn apply(&mut self, intent: Intent) -> bool {
        match transition(self.position, intent, self.bounds()) {
            Transition::Stay => false,
            Transition::Page(page) => {
                self.position.page = page;
                true
            }
            Transition::Chapter { index, landing } => {
                self.enter_chapter(index, landing);
                true
            }
            Transition::Reflow(viewport) => self.resize(viewport),
        }
    }

    /// Re-wraps and re-paginates the current chapter without re-reading it.
    pub fn resize(&mut self, viewport: Viewport) -> bool {
        let viewport = Viewport::clamped(viewport.width, viewport.height);
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.chapter.relayout(viewport);
        self.position.page = self.chapter.pages.clamp_index(self.position.page);
        debug!(
            width = viewport.width,
            height = viewport.height,
            pages = self.page_count(),
            page = self.position.page,
            "reflowed chapter"
        );
        true
    }

    /// Opens the first page of chapter `index`, clamped to the last chapter.
    pub fn jump_to_chapter(&mut self, index: usize) -> bool {
        let index = index.min(self.chapter_count().saturating_sub(1));
        if index == self.position.chapter {
            if self.position.page == 0 {
                return false;
            }
            self.position.page = 0;
            return true;
        }
        self.enter_chapter(index, Landing::FirstPage);
        true
    }

    pub fn current_page(&self) -> PageView<'_> {
        let lines = self
            .chapter
            .pages
            .get(self.position.page)
            .unwrap_or_default();
        PageView {
            lines,
            chapter_number: self.position.chapter + 1,
            chapter_count: self.chapter_count(),
            page_number: self.position.page + 1,
            page_count: self.page_count(),
            state: &self.chapter.state,
        }
    }

    fn enter_chapter(&mut self, index: usize, landing: Landing) {
        self.chapter = load_chapter(self.reader.as_ref(), index, self.viewport, self.options);
        let page = match landing {
            Landing::FirstPage => 0,
            Landing::LastPage => self.chapter.pages.len().saturating_sub(1),
        };
        self.position = Position {
            chapter: index,
            page,
        };
    }
}

#[instrument(skip(reader, options))]
fn load_chapter(
    reader: &dyn ContainerReader,
    index: usize,
    viewport: Viewport,
    options: NavigatorOptions,
) -> LoadedChapter {
    let opened = match reader.chapter_ids().get(index) {
        Some(id) => reader.open_chapter(id),
        None => Err(ChapterError::NotFound {
            id: format!("#{index}"),
        }),
    };

    let chapter = match opened {
        Ok(content) => {
            let text = expand_tabs(&content.text(), options.tab_width);
            if text.trim().is_empty() {
                info!(chapter = index, "chapter has no readable text");
                LoadedChapter::new(
                    EMPTY_CHAPTER_MESSAGE.to_string(),
                    ChapterState::Empty,
                    viewport,
                )
            } else {
                LoadedChapter::new(text, ChapterState::Ready, viewport)
            }
        }
        Err(err) => {
            warn!(chapter = index, error = %err, "chapter unavailable");
            let message = format!("[Chapter unavailable: {err}]");
            LoadedChapter::new(message, ChapterState::Unavailable(err.to_string()), viewport)
        }
    };
    debug!(
        chapter = index,
        pages = chapter.pages.len(),
        "laid out chapter"
    );
    chapter
}
