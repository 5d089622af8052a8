use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Markup syntaxes known to the parsers and renderers, identified by their
/// `type/version` string (e.g. `xwiki/2.1`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "String")]
pub enum Syntax {
    XWiki21,
    Markdown12,
    Plain10,
    Xhtml10,
    Event10,
}

impl Syntax {
    pub const ALL: [Syntax; 5] = [
        Syntax::XWiki21,
        Syntax::Markdown12,
        Syntax::Plain10,
        Syntax::Xhtml10,
        Syntax::Event10,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Syntax::XWiki21 => "xwiki/2.1",
            Syntax::Markdown12 => "markdown/1.2",
            Syntax::Plain10 => "plain/1.0",
            Syntax::Xhtml10 => "xhtml/1.0",
            Syntax::Event10 => "event/1.0",
        }
    }

    /// Guess a syntax from a file extension, used for stored documents.
    pub fn from_extension(extension: &str) -> Option<Syntax> {
        match extension {
            "xwiki" | "txt" => Some(Syntax::XWiki21),
            "md" | "markdown" => Some(Syntax::Markdown12),
            "html" | "xhtml" => Some(Syntax::Xhtml10),
            _ => None,
        }
    }
}

impl fmt::Display for Syntax {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSyntax(pub String);

impl fmt::Display for UnknownSyntax {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown syntax '{}'", self.0)
    }
}

impl std::error::Error for UnknownSyntax {}

impl FromStr for Syntax {
    type Err = UnknownSyntax;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = s.trim().to_ascii_lowercase();
        // Accept both the full id and a bare type name.
        Syntax::ALL
            .into_iter()
            .find(|syntax| {
                syntax.id() == id || syntax.id().split('/').next() == Some(id.as_str())
            })
            .or(match id.as_str() {
                "html" | "html/5.0" => Some(Syntax::Xhtml10),
                _ => None,
            })
            .ok_or(UnknownSyntax(s.to_string()))
    }
}

impl TryFrom<String> for Syntax {
    type Error = UnknownSyntax;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
