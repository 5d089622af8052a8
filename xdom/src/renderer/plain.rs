use std::io::{self, Write};

use crate::block::{Block, BlockKind};
use crate::renderer::BlockRenderer;
use crate::syntax::Syntax;

/// Text only: markup, raw content and unexpanded macros are dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextRenderer;

impl BlockRenderer for PlainTextRenderer {
    fn syntax(&self) -> Syntax {
        Syntax::Plain10
    }

    fn render(&self, xdom: &Block, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(text(xdom).as_bytes())
    }
}

fn text(block: &Block) -> String {
    match &block.kind {
        BlockKind::Word(word) => word.clone(),
        BlockKind::Space => " ".to_string(),
        BlockKind::SpecialSymbol(symbol) => symbol.to_string(),
        BlockKind::NewLine => "\n".to_string(),
        BlockKind::Verbatim { content, .. } => content.clone(),
        BlockKind::Raw { syntax, content } if *syntax == Syntax::Plain10 => content.clone(),
        BlockKind::Raw { .. }
        | BlockKind::Macro(_)
        | BlockKind::HorizontalLine
        | BlockKind::EmptyLines(_) => String::new(),
        BlockKind::Link { reference } if block.children.is_empty() => reference.clone(),
        BlockKind::List { .. } => join(&block.children, "\n"),
        BlockKind::ListItem => join(&block.children, "\n"),
        _ if block.is_inline() || block.requires_inline_children() => {
            block.children.iter().map(text).collect()
        }
        _ => join(&block.children, "\n\n"),
    }
}

fn join(children: &[Block], separator: &str) -> String {
    let mut out = String::new();
    let mut previous_inline = false;
    for child in children {
        let rendered = text(child);
        if rendered.is_empty() {
            continue;
        }
        let inline = child.is_inline();
        if !out.is_empty() && !(inline && previous_inline) {
            out.push_str(separator);
        }
        out.push_str(&rendered);
        previous_inline = inline;
    }
    out
}
