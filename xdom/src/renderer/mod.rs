mod event;
mod html;
mod plain;
mod xwiki;

use std::io::{self, Write};

use crate::block::Block;
use crate::syntax::Syntax;

pub use event::EventRenderer;
pub use html::HtmlRenderer;
pub use plain::PlainTextRenderer;
pub use xwiki::XWikiRenderer;

/// Serializes a block tree into a target syntax. Renderers keep no state
/// between calls.
pub trait BlockRenderer: Send + Sync {
    fn syntax(&self) -> Syntax;

    fn render(&self, xdom: &Block, out: &mut dyn Write) -> io::Result<()>;
}

/// The renderer for a syntax, if that syntax can be written.
pub fn renderer_for(syntax: Syntax) -> Option<Box<dyn BlockRenderer>> {
    match syntax {
        Syntax::Event10 => Some(Box::new(EventRenderer)),
        Syntax::Plain10 => Some(Box::new(PlainTextRenderer)),
        Syntax::Xhtml10 => Some(Box::new(HtmlRenderer)),
        Syntax::XWiki21 => Some(Box::new(XWikiRenderer)),
        Syntax::Markdown12 => None,
    }
}

/// Render into a string.
pub fn render_to_string(renderer: &dyn BlockRenderer, xdom: &Block) -> String {
    let mut buffer = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = renderer.render(xdom, &mut buffer);
    String::from_utf8_lossy(&buffer).into_owned()
}
