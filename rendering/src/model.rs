use std::fmt;

pub const DEFAULT_WIKI: &str = "xwiki";
pub const DEFAULT_SPACE: &str = "Main";

/// Identifies a wiki page: `wiki:Space.Page`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentReference {
    pub wiki: String,
    pub space: String,
    pub page: String,
}

impl DocumentReference {
    pub fn new(wiki: impl Into<String>, space: impl Into<String>, page: impl Into<String>) -> Self {
        DocumentReference {
            wiki: wiki.into(),
            space: space.into(),
            page: page.into(),
        }
    }

    /// Resolve `wiki:Space.Page`, `Space.Page` or `Page`, filling the
    /// missing parts from `default_wiki` and the `Main` space.
    pub fn parse(reference: &str, default_wiki: &str) -> Option<Self> {
        let reference = reference.trim();
        let (wiki, rest) = match reference.split_once(':') {
            Some((wiki, rest)) => (wiki, rest),
            None => (default_wiki, reference),
        };
        let (space, page) = match rest.rsplit_once('.') {
            Some((space, page)) => (space, page),
            None => (DEFAULT_SPACE, rest),
        };
        if wiki.is_empty() || space.is_empty() || page.is_empty() {
            return None;
        }
        Some(DocumentReference::new(wiki, space, page))
    }
}

impl fmt::Display for DocumentReference {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}.{}", self.wiki, self.space, self.page)
    }
}
