use std::io::{self, Write};

use crate::block::{Block, BlockKind, Format, MacroCall, Parameters};
use crate::renderer::BlockRenderer;
use crate::syntax::Syntax;

/// One line per listener event (`beginParagraph`, `onWord [x]`, ...).
/// Mostly useful in tests to compare tree shapes.
#[derive(Debug, Default, Clone, Copy)]
pub struct EventRenderer;

impl BlockRenderer for EventRenderer {
    fn syntax(&self) -> Syntax {
        Syntax::Event10
    }

    fn render(&self, xdom: &Block, out: &mut dyn Write) -> io::Result<()> {
        EventPrinter { out }.block(xdom)
    }
}

struct EventPrinter<'a> {
    out: &'a mut dyn Write,
}

impl EventPrinter<'_> {
    fn block(&mut self, block: &Block) -> io::Result<()> {
        let params = parameters(&block.parameters);
        match &block.kind {
            BlockKind::Word(word) => writeln!(self.out, "onWord [{}]", word),
            BlockKind::Space => writeln!(self.out, "onSpace"),
            BlockKind::SpecialSymbol(symbol) => writeln!(self.out, "onSpecialSymbol [{}]", symbol),
            BlockKind::NewLine => writeln!(self.out, "onNewLine"),
            BlockKind::EmptyLines(count) => writeln!(self.out, "onEmptyLines [{}]", count),
            BlockKind::HorizontalLine => writeln!(self.out, "onHorizontalLine{}", params),
            BlockKind::Verbatim { content, inline } => writeln!(
                self.out,
                "onVerbatim{} [{}]{}",
                placement(*inline),
                content,
                params
            ),
            BlockKind::Raw { syntax, content } => {
                writeln!(self.out, "onRawText [{}] [{}]", content, syntax)
            }
            BlockKind::Macro(call) => {
                writeln!(self.out, "onMacro{} {}", placement(call.inline), macro_call(call))
            }
            BlockKind::Composite => self.children(block),
            kind => {
                let (name, detail) = container(kind);
                writeln!(self.out, "begin{}{}{}", name, detail, params)?;
                self.children(block)?;
                writeln!(self.out, "end{}{}{}", name, detail, params)
            }
        }
    }

    fn children(&mut self, block: &Block) -> io::Result<()> {
        for child in &block.children {
            self.block(child)?;
        }
        Ok(())
    }
}

/// Event name and bracketed detail for blocks with begin/end events.
fn container(kind: &BlockKind) -> (&'static str, String) {
    match kind {
        BlockKind::Document => ("Document", String::new()),
        BlockKind::Paragraph => ("Paragraph", String::new()),
        BlockKind::Header { level } => ("Header", format!(" [{}]", level)),
        BlockKind::List { ordered } => (
            "List",
            if *ordered { " [NUMBERED]" } else { " [BULLETED]" }.to_string(),
        ),
        BlockKind::ListItem => ("ListItem", String::new()),
        BlockKind::Format(format) => ("Format", format!(" [{}]", format_name(*format))),
        BlockKind::Group => ("Group", String::new()),
        BlockKind::Link { reference } => ("Link", format!(" [{}]", reference)),
        BlockKind::MacroMarker(call) if call.inline => {
            ("MacroMarkerInline", format!(" {}", macro_call(call)))
        }
        BlockKind::MacroMarker(call) => ("MacroMarkerStandalone", format!(" {}", macro_call(call))),
        BlockKind::MetaData => ("MetaData", String::new()),
        _ => ("Block", String::new()),
    }
}

fn format_name(format: Format) -> &'static str {
    match format {
        Format::Bold => "BOLD",
        Format::Italic => "ITALIC",
        Format::Underline => "UNDERLINED",
        Format::Strikeout => "STRIKEDOUT",
        Format::Monospace => "MONOSPACE",
        Format::None => "NONE",
    }
}

fn placement(inline: bool) -> &'static str {
    if inline { "Inline" } else { "Standalone" }
}

fn macro_call(call: &MacroCall) -> String {
    let params = call
        .parameters
        .iter()
        .map(|(name, value)| format!("{}={}", name, value))
        .collect::<Vec<_>>()
        .join("|");
    match &call.content {
        Some(content) => format!("[{}] [{}] [{}]", call.id, params, content),
        None => format!("[{}] [{}]", call.id, params),
    }
}

fn parameters(parameters: &Parameters) -> String {
    if parameters.is_empty() {
        return String::new();
    }
    let pairs: String = parameters
        .iter()
        .map(|(name, value)| format!("[{}]=[{}]", name, value))
        .collect();
    format!(" [{}]", pairs)
}
