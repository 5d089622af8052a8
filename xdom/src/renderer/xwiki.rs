use std::io::{self, Write};

use crate::block::{Block, BlockKind, Format, Parameters};
use crate::parser::macro_syntax::print_macro;
use crate::renderer::BlockRenderer;
use crate::syntax::Syntax;

/// Prints a tree back as xwiki/2.1 source. Expanded macros are printed as
/// the call that produced them, so a transformed tree round-trips to its
/// source.
#[derive(Debug, Default, Clone, Copy)]
pub struct XWikiRenderer;

impl BlockRenderer for XWikiRenderer {
    fn syntax(&self) -> Syntax {
        Syntax::XWiki21
    }

    fn render(&self, xdom: &Block, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(source(xdom).as_bytes())
    }
}

fn source(block: &Block) -> String {
    match &block.kind {
        BlockKind::Document | BlockKind::Composite | BlockKind::MetaData => {
            if block.is_inline() {
                inline(&block.children)
            } else {
                standalone(&block.children)
            }
        }
        BlockKind::Paragraph => format!("{}{}", style(&block.parameters), inline(&block.children)),
        BlockKind::Header { level } => {
            let marker = "=".repeat(*level as usize);
            format!("{} {} {}", marker, inline(&block.children), marker)
        }
        BlockKind::List { .. } => list(block, ""),
        BlockKind::ListItem => inline(&block.children),
        BlockKind::Group => format!(
            "{}(((\n{}\n)))",
            style(&block.parameters),
            standalone(&block.children)
        ),
        BlockKind::Format(Format::None) => format!(
            "{}{}(%%)",
            style(&block.parameters),
            inline(&block.children)
        ),
        BlockKind::Format(format) => {
            let marker = format_marker(*format);
            format!("{}{}{}", marker, inline(&block.children), marker)
        }
        BlockKind::Word(word) => word.clone(),
        BlockKind::Space => " ".to_string(),
        BlockKind::SpecialSymbol(symbol) => symbol.to_string(),
        BlockKind::NewLine => "\n".to_string(),
        BlockKind::EmptyLines(_) | BlockKind::Raw { .. } => String::new(),
        BlockKind::HorizontalLine => "----".to_string(),
        BlockKind::Verbatim { content, inline } => {
            if !inline && content.contains('\n') {
                format!("{{{{{{\n{}\n}}}}}}", content)
            } else {
                format!("{{{{{{{}}}}}}}", content)
            }
        }
        BlockKind::Link { reference } => {
            if block.children.is_empty() {
                format!("[[{}]]", reference)
            } else {
                format!("[[{}>>{}]]", inline(&block.children), reference)
            }
        }
        BlockKind::Macro(call) | BlockKind::MacroMarker(call) => print_macro(call),
    }
}

fn standalone(children: &[Block]) -> String {
    children
        .iter()
        .map(source)
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Inline content, escaping symbols that would otherwise read as markup.
fn inline(children: &[Block]) -> String {
    let mut out = String::new();
    for (index, child) in children.iter().enumerate() {
        if let BlockKind::SpecialSymbol(symbol) = child.kind {
            let next = children.get(index + 1).map(|block| &block.kind);
            if needs_escape(symbol, next) {
                out.push('~');
            }
        }
        out.push_str(&source(child));
    }
    out
}

fn needs_escape(symbol: char, next: Option<&BlockKind>) -> bool {
    if symbol == '~' {
        return true;
    }
    let doubled = matches!(next, Some(BlockKind::SpecialSymbol(next)) if *next == symbol);
    doubled && matches!(symbol, '*' | '/' | '_' | '-' | '#' | '{' | '[')
}

fn list(block: &Block, prefix: &str) -> String {
    let ordered = matches!(block.kind, BlockKind::List { ordered: true });
    let prefix = format!("{}{}", prefix, if ordered { "1" } else { "*" });
    let marker = if ordered {
        format!("{}.", prefix)
    } else {
        prefix.clone()
    };

    let mut lines = Vec::new();
    for item in &block.children {
        let (nested, content): (Vec<&Block>, Vec<&Block>) = item
            .children
            .iter()
            .partition(|child| matches!(child.kind, BlockKind::List { .. }));
        let content: Vec<Block> = content.into_iter().cloned().collect();
        lines.push(format!("{} {}", marker, inline(&content)));
        for nested in nested {
            lines.push(list(nested, &prefix));
        }
    }
    lines.join("\n")
}

fn format_marker(format: Format) -> &'static str {
    match format {
        Format::Bold => "**",
        Format::Italic => "//",
        Format::Underline => "__",
        Format::Strikeout => "--",
        Format::Monospace => "##",
        Format::None => "",
    }
}

fn style(parameters: &Parameters) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = parameters
        .iter()
        .map(|(name, value)| format!("{}=\"{}\"", name, value.replace('"', "~\"")))
        .collect();
    format!("(% {} %)", pairs.join(" "))
}
