pub mod error;
mod inline;
pub mod macro_syntax;
mod markdown;
mod plain;
mod xwiki;

use crate::block::Block;
use crate::syntax::Syntax;

pub use error::ParseError;
pub use markdown::MarkdownParser;
pub use plain::PlainTextParser;
pub use xwiki::XWikiParser;

/// Turns source text of one syntax into a block tree rooted at a `Document`
/// block.
pub trait Parser: Send + Sync {
    fn syntax(&self) -> Syntax;

    fn parse(&self, source: &str, file_id: usize) -> Result<Block, Vec<ParseError>>;
}

/// The parser for a syntax, if that syntax can be read.
pub fn parser_for(syntax: Syntax) -> Option<Box<dyn Parser>> {
    match syntax {
        Syntax::XWiki21 => Some(Box::new(XWikiParser)),
        Syntax::Markdown12 => Some(Box::new(MarkdownParser)),
        Syntax::Plain10 => Some(Box::new(PlainTextParser)),
        Syntax::Xhtml10 | Syntax::Event10 => None,
    }
}
