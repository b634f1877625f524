use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

pub mod extract;
pub mod navigator;
pub mod paginate;
pub mod wrap;

pub use extract::{expand_tabs, extract, MarkupToken, MarkupTokens};
pub use navigator::{
    transition, Bounds, ChapterState, Intent, Landing, Navigator, NavigatorOptions, PageView,
    Position, Transition,
};
pub use paginate::{paginate, Pages};
pub use wrap::wrap;

/// Identifier the container uses for a chapter (the spine `idref` for EPUB).
pub type ChapterId = String;

#[derive(Debug, Clone, Default)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DocumentInfo {
    pub path: PathBuf,
    pub metadata: DocumentMetadata,
}

impl DocumentInfo {
    pub fn display_name(&self) -> String {
        if let Some(title) = self.metadata.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.trim().to_string();
        }
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "<unknown>".to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// XHTML/HTML markup that needs text extraction.
    Markup,
    /// Already plain text; used as-is.
    PlainText,
}

#[derive(Debug, Clone)]
pub struct ChapterContent {
    pub kind: ContentKind,
    pub bytes: Vec<u8>,
}

impl ChapterContent {
    pub fn markup(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ContentKind::Markup,
            bytes: bytes.into(),
        }
    }

    pub fn plain_text(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind: ContentKind::PlainText,
            bytes: bytes.into(),
        }
    }

    /// Displayable text of the chapter, before tab expansion.
    pub fn text(&self) -> String {
        match self.kind {
            ContentKind::Markup => extract(&self.bytes),
            ContentKind::PlainText => String::from_utf8_lossy(&self.bytes).into_owned(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ChapterError {
    #[error("chapter `{id}` not found in container")]
    NotFound { id: ChapterId },
    #[error("failed to read chapter `{id}`: {reason}")]
    Read { id: ChapterId, reason: String },
}

/// Read access to an opened document. Must stay stable for the lifetime of a reading session.
pub trait ContainerReader: Send + Sync {
    fn info(&self) -> &DocumentInfo;

    /// Chapter identifiers in spine (reading) order.
    fn chapter_ids(&self) -> &[ChapterId];

    fn open_chapter(&self, id: &str) -> std::result::Result<ChapterContent, ChapterError>;

    fn chapter_count(&self) -> usize {
        self.chapter_ids().len()
    }
}

#[async_trait::async_trait]
pub trait ContainerProvider: Send + Sync {
    async fn open(&self, path: &Path) -> Result<Arc<dyn ContainerReader>>;
}

/// Drawable text area in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: usize,
    pub height: usize,
}

impl Viewport {
    /// Degenerate sizes are clamped to one cell instead of rejected.
    pub fn clamped(width: usize, height: usize) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }
}
