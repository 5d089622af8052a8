use pulldown_cmark::{
    CodeBlockKind, Event, HeadingLevel, Options, Parser as CmarkParser, Tag, TagEnd,
};

use crate::block::text::split_text;
use crate::block::{Block, BlockKind, Format, MacroCall};
use crate::parser::error::ParseError;
use crate::parser::Parser;
use crate::syntax::Syntax;

/// Parser for CommonMark documents. Fenced code blocks become `code` macro
/// calls so they go through the macro pipeline like xwiki code blocks.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownParser;

impl Parser for MarkdownParser {
    fn syntax(&self) -> Syntax {
        Syntax::Markdown12
    }

    fn parse(&self, source: &str, _file_id: usize) -> Result<Block, Vec<ParseError>> {
        let options = Options::ENABLE_STRIKETHROUGH;
        let mut state = ParseState::new();
        for event in CmarkParser::new_ext(source, options) {
            state.process_event(event);
        }
        Ok(state.finalize())
    }
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState {
    /// Blocks being built. The bottom entry is the document.
    stack: Vec<Block>,
    /// Fenced or indented code being collected.
    code: Option<CodeBuffer>,
}

struct CodeBuffer {
    language: Option<String>,
    text: String,
}

impl ParseState {
    fn new() -> Self {
        ParseState {
            stack: vec![Block::document(Vec::new())],
            code: None,
        }
    }

    fn push(&mut self, block: Block) {
        if let Some(parent) = self.stack.last_mut() {
            parent.children.push(block);
        }
    }

    fn close(&mut self) {
        if self.stack.len() < 2 {
            return;
        }
        let Some(block) = self.stack.pop() else {
            return;
        };
        if block.kind == BlockKind::Composite {
            // Transparent containers (images, tables) keep only their text.
            for child in block.children {
                self.push(child);
            }
        } else {
            self.push(block);
        }
    }

    fn process_event(&mut self, event: Event<'_>) {
        match event {
            Event::Start(Tag::CodeBlock(kind)) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split_whitespace()
                        .next()
                        .map(str::to_string),
                    CodeBlockKind::Indented => None,
                };
                self.code = Some(CodeBuffer {
                    language,
                    text: String::new(),
                });
            }
            Event::End(TagEnd::CodeBlock) => {
                if let Some(code) = self.code.take() {
                    let mut call = MacroCall::new("code")
                        .with_content(code.text.strip_suffix('\n').unwrap_or(&code.text));
                    if let Some(language) = code.language {
                        call = call.with_parameter("language", language);
                    }
                    self.push(Block::macro_call(call));
                }
            }
            Event::Start(Tag::HtmlBlock) | Event::End(TagEnd::HtmlBlock) => {}
            Event::Start(tag) => {
                let block = match tag {
                    Tag::Paragraph => Block::paragraph(Vec::new()),
                    Tag::Heading { level, .. } => Block::header(heading_level_to_u8(level), Vec::new()),
                    Tag::List(start) => Block::list(start.is_some(), Vec::new()),
                    Tag::Item => Block::list_item(Vec::new()),
                    Tag::Emphasis => Block::format(Format::Italic, Vec::new()),
                    Tag::Strong => Block::format(Format::Bold, Vec::new()),
                    Tag::Strikethrough => Block::format(Format::Strikeout, Vec::new()),
                    Tag::BlockQuote(_) => {
                        Block::group(Vec::new()).with_parameter("class", "blockquote")
                    }
                    Tag::Link { dest_url, .. } => Block::link(dest_url.to_string(), Vec::new()),
                    _ => Block::composite(Vec::new()),
                };
                self.stack.push(block);
            }
            Event::End(_) => self.close(),
            Event::Text(text) => match self.code.as_mut() {
                Some(code) => code.text.push_str(&text),
                None => {
                    for block in split_text(&text) {
                        self.push(block);
                    }
                }
            },
            Event::Code(code) => {
                self.push(Block::format(
                    Format::Monospace,
                    vec![Block::verbatim(code.to_string(), true)],
                ));
            }
            Event::Html(html) | Event::InlineHtml(html) => {
                self.push(Block::raw(Syntax::Xhtml10, html.to_string()));
            }
            Event::SoftBreak => self.push(Block::space()),
            Event::HardBreak => self.push(Block::new_line()),
            Event::Rule => self.push(Block::horizontal_line()),
            _ => {}
        }
    }

    fn finalize(mut self) -> Block {
        while self.stack.len() > 1 {
            self.close();
        }
        self.stack
            .pop()
            .unwrap_or_else(|| Block::document(Vec::new()))
    }
}

fn heading_level_to_u8(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}
