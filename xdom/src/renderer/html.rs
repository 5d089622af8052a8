use std::io::{self, Write};

use html_escape::{encode_double_quoted_attribute, encode_text};

use crate::block::{Block, BlockKind, Format, Parameters};
use crate::renderer::BlockRenderer;
use crate::syntax::Syntax;

/// XHTML 1.0 fragment output.
#[derive(Debug, Default, Clone, Copy)]
pub struct HtmlRenderer;

impl BlockRenderer for HtmlRenderer {
    fn syntax(&self) -> Syntax {
        Syntax::Xhtml10
    }

    fn render(&self, xdom: &Block, out: &mut dyn Write) -> io::Result<()> {
        HtmlPrinter { out }.block(xdom)
    }
}

struct HtmlPrinter<'a> {
    out: &'a mut dyn Write,
}

impl HtmlPrinter<'_> {
    fn block(&mut self, block: &Block) -> io::Result<()> {
        let attrs = attributes(&block.parameters);
        match &block.kind {
            BlockKind::Document
            | BlockKind::Composite
            | BlockKind::MetaData
            | BlockKind::MacroMarker(_) => self.children(block),
            BlockKind::Paragraph => self.element("p", &attrs, block),
            BlockKind::Header { level } => {
                let id = block.anchor();
                write!(self.out, "<h{} id=\"{}\"{}><span>", level, id, attrs)?;
                self.children(block)?;
                write!(self.out, "</span></h{}>", level)
            }
            BlockKind::List { ordered } => {
                self.element(if *ordered { "ol" } else { "ul" }, &attrs, block)
            }
            BlockKind::ListItem => self.element("li", &attrs, block),
            BlockKind::Format(format) => self.element(format_tag(*format), &attrs, block),
            BlockKind::Group => self.element("div", &attrs, block),
            BlockKind::Word(word) => write!(self.out, "{}", encode_text(word)),
            BlockKind::Space => write!(self.out, " "),
            BlockKind::SpecialSymbol(symbol) => {
                write!(self.out, "{}", encode_text(&symbol.to_string()))
            }
            BlockKind::NewLine => write!(self.out, "<br/>"),
            BlockKind::EmptyLines(count) => {
                for _ in 0..*count {
                    write!(self.out, "<div class=\"wikimodel-emptyline\"></div>")?;
                }
                Ok(())
            }
            BlockKind::HorizontalLine => write!(self.out, "<hr{}/>", attrs),
            BlockKind::Verbatim { content, inline: true } => write!(
                self.out,
                "<tt class=\"wikimodel-verbatim\"{}>{}</tt>",
                attrs,
                encode_text(content)
            ),
            BlockKind::Verbatim { content, inline: false } => {
                write!(self.out, "<pre{}>{}</pre>", attrs, encode_text(content))
            }
            BlockKind::Raw { syntax, content } => {
                if *syntax == Syntax::Xhtml10 {
                    write!(self.out, "{}", content)?;
                }
                Ok(())
            }
            BlockKind::Link { reference } => {
                write!(
                    self.out,
                    "<span class=\"wikilink\"><a href=\"{}\"{}>",
                    encode_double_quoted_attribute(reference),
                    attrs
                )?;
                if block.children.is_empty() {
                    write!(self.out, "{}", encode_text(reference))?;
                } else {
                    self.children(block)?;
                }
                write!(self.out, "</a></span>")
            }
            // Calls left unexpanded produce no output.
            BlockKind::Macro(_) => Ok(()),
        }
    }

    fn element(&mut self, tag: &str, attrs: &str, block: &Block) -> io::Result<()> {
        write!(self.out, "<{}{}>", tag, attrs)?;
        self.children(block)?;
        write!(self.out, "</{}>", tag)
    }

    fn children(&mut self, block: &Block) -> io::Result<()> {
        for child in &block.children {
            self.block(child)?;
        }
        Ok(())
    }
}

fn format_tag(format: Format) -> &'static str {
    match format {
        Format::Bold => "strong",
        Format::Italic => "em",
        Format::Underline => "ins",
        Format::Strikeout => "del",
        Format::Monospace => "tt",
        Format::None => "span",
    }
}

fn attributes(parameters: &Parameters) -> String {
    parameters
        .iter()
        .map(|(name, value)| format!(" {}=\"{}\"", name, encode_double_quoted_attribute(value)))
        .collect()
}
