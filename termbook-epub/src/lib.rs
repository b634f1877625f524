use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use epub::doc::EpubDoc;
use parking_lot::Mutex;
use termbook_core::{
    ChapterContent, ChapterError, ChapterId, ContainerProvider, ContainerReader, DocumentInfo,
    DocumentMetadata,
};
use tracing::{debug, info, instrument};

const PLAIN_TEXT_CHAPTER: &str = "text";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookFormat {
    Epub,
    PlainText,
}

impl BookFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "epub" => Some(BookFormat::Epub),
            "txt" => Some(BookFormat::PlainText),
            _ => None,
        }
    }
}

/// Files the library view lists.
pub fn is_supported(path: &Path) -> bool {
    BookFormat::from_path(path).is_some()
}

/// Opens EPUB files as EPUB and everything else as plain text.
#[derive(Debug, Default, Clone, Copy)]
pub struct BookProvider;

#[async_trait]
impl ContainerProvider for BookProvider {
    async fn open(&self, path: &Path) -> Result<Arc<dyn ContainerReader>> {
        match BookFormat::from_path(path) {
            Some(BookFormat::Epub) => Ok(Arc::new(EpubContainer::open(path)?)),
            _ => Ok(Arc::new(PlainTextContainer::open(path)?)),
        }
    }
}

pub struct EpubContainer {
    info: DocumentInfo,
    spine: Vec<ChapterId>,
    doc: Mutex<EpubDoc<BufReader<File>>>,
}

impl EpubContainer {
    #[instrument]
    pub fn open(path: &Path) -> Result<Self> {
        let doc = EpubDoc::new(path)
            .map_err(|err| anyhow!("failed to open EPUB {:?}: {err}", path))?;
        let spine: Vec<ChapterId> = doc.spine.iter().map(|item| item.idref.clone()).collect();
        let metadata = DocumentMetadata {
            title: doc.mdata("title").map(|item| item.value.clone()),
            author: doc.mdata("creator").map(|item| item.value.clone()),
        };
        info!(
            chapters = spine.len(),
            title = metadata.title.as_deref().unwrap_or("<untitled>"),
            "opened EPUB"
        );
        Ok(Self {
            info: DocumentInfo {
                path: path.to_path_buf(),
                metadata,
            },
            spine,
            doc: Mutex::new(doc),
        })
    }
}

impl ContainerReader for EpubContainer {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn chapter_ids(&self) -> &[ChapterId] {
        &self.spine
    }

    fn open_chapter(&self, id: &str) -> std::result::Result<ChapterContent, ChapterError> {
        let (bytes, mime) = self
            .doc
            .lock()
            .get_resource(id)
            .ok_or_else(|| ChapterError::NotFound { id: id.to_string() })?;
        debug!(id, %mime, size = bytes.len(), "read chapter");
        if mime.eq_ignore_ascii_case("text/plain") {
            Ok(ChapterContent::plain_text(bytes))
        } else {
            Ok(ChapterContent::markup(bytes))
        }
    }
}

/// A text file read as a single chapter. The file is read on each chapter open.
pub struct PlainTextContainer {
    info: DocumentInfo,
    ids: Vec<ChapterId>,
}

impl PlainTextContainer {
    pub fn open(path: &Path) -> Result<Self> {
        let metadata =
            fs::metadata(path).with_context(|| format!("failed to stat {:?}", path))?;
        if !metadata.is_file() {
            anyhow::bail!("{:?} is not a file", path);
        }
        info!(path = %path.display(), size = metadata.len(), "opened plain text document");
        Ok(Self {
            info: DocumentInfo {
                path: PathBuf::from(path),
                metadata: DocumentMetadata::default(),
            },
            ids: vec![PLAIN_TEXT_CHAPTER.to_string()],
        })
    }
}

impl ContainerReader for PlainTextContainer {
    fn info(&self) -> &DocumentInfo {
        &self.info
    }

    fn chapter_ids(&self) -> &[ChapterId] {
        &self.ids
    }

    fn open_chapter(&self, id: &str) -> std::result::Result<ChapterContent, ChapterError> {
        if id != PLAIN_TEXT_CHAPTER {
            return Err(ChapterError::NotFound { id: id.to_string() });
        }
        fs::read(&self.info.path)
            .map(ChapterContent::plain_text)
            .map_err(|err| ChapterError::Read {
                id: id.to_string(),
                reason: err.to_string(),
            })
    }
}
