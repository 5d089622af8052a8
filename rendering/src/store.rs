use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::debug;
use xdom::Syntax;

use crate::model::DocumentReference;

/// A stored wiki page as seen by the rendering core.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub reference: DocumentReference,
    pub content: String,
    pub syntax: Syntax,
    pub author: Option<String>,
}

/// Read access to wiki pages, used by macros that pull in other documents.
pub trait DocumentStore: Send + Sync {
    fn get(&self, reference: &DocumentReference) -> Option<StoredDocument>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<DocumentReference, StoredDocument>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save(&self, document: StoredDocument) {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.reference.clone(), document);
    }

    pub fn delete(&self, reference: &DocumentReference) -> Option<StoredDocument> {
        self.documents
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(reference)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self, reference: &DocumentReference) -> Option<StoredDocument> {
        self.documents
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(reference)
            .cloned()
    }
}

/// Documents of one wiki laid out as `<root>/<Space>/<Page>.<ext>`, where the
/// extension names the syntax (`.xwiki`, `.md`, `.txt`).
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    root: PathBuf,
    wiki: String,
    author: Option<String>,
}

impl DirectoryStore {
    pub fn new(root: impl Into<PathBuf>, wiki: impl Into<String>) -> Self {
        DirectoryStore {
            root: root.into(),
            wiki: wiki.into(),
            author: None,
        }
    }

    /// Author recorded on every document read from disk.
    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = author;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find_file(&self, reference: &DocumentReference) -> Option<(PathBuf, Syntax)> {
        let directory = self.root.join(&reference.space);
        ["xwiki", "md", "txt"].into_iter().find_map(|extension| {
            let path = directory.join(format!("{}.{}", reference.page, extension));
            let syntax = Syntax::from_extension(extension)?;
            path.is_file().then_some((path, syntax))
        })
    }
}

impl DocumentStore for DirectoryStore {
    fn get(&self, reference: &DocumentReference) -> Option<StoredDocument> {
        if reference.wiki != self.wiki {
            return None;
        }
        let (path, syntax) = self.find_file(reference)?;
        match fs::read_to_string(&path) {
            Ok(content) => Some(StoredDocument {
                reference: reference.clone(),
                content,
                syntax,
                author: self.author.clone(),
            }),
            Err(error) => {
                debug!(path = %path.display(), %error, "cannot read document");
                None
            }
        }
    }
}
