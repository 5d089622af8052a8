pub mod macro_call;
pub mod placement;
pub mod text;

use std::collections::BTreeMap;

use crate::syntax::Syntax;

pub use macro_call::MacroCall;
pub use placement::PlacementError;

/// Block parameters (HTML-like attributes such as `class`), kept sorted so
/// renderers produce stable output.
pub type Parameters = BTreeMap<String, String>;

/// Parameter names used by `MetaData` blocks.
pub const META_SOURCE: &str = "source";
pub const META_SYNTAX: &str = "syntax";
pub const META_AUTHOR: &str = "author";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Bold,
    Italic,
    Underline,
    Strikeout,
    Monospace,
    None,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BlockKind {
    /// Root of a parsed document.
    Document,
    Paragraph,
    Header { level: u8 },
    List { ordered: bool },
    ListItem,
    Format(Format),
    Group,
    Word(String),
    Space,
    SpecialSymbol(char),
    NewLine,
    EmptyLines(usize),
    HorizontalLine,
    Verbatim { content: String, inline: bool },
    /// Content already in a target syntax, passed through untouched by
    /// renderers of that syntax.
    Raw { syntax: Syntax, content: String },
    Link { reference: String },
    /// An unexpanded macro call.
    Macro(MacroCall),
    /// The result of an expanded macro call. Children hold the output (or
    /// the error blocks); the call is kept for renderers that print source.
    MacroMarker(MacroCall),
    /// Invisible wrapper carrying provenance (source document, syntax,
    /// author) for the content below it.
    MetaData,
    Composite,
}

/// A node of the document tree. Children are owned, so the tree is acyclic
/// and every node has at most one parent.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub kind: BlockKind,
    pub children: Vec<Block>,
    pub parameters: Parameters,
}

impl Block {
    pub fn new(kind: BlockKind) -> Self {
        Block {
            kind,
            children: Vec::new(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_children(kind: BlockKind, children: Vec<Block>) -> Self {
        Block {
            kind,
            children,
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_parameters(mut self, parameters: Parameters) -> Self {
        self.parameters = parameters;
        self
    }

    // -----------------------------------------------------------------------
    // Constructors
    // -----------------------------------------------------------------------

    pub fn document(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Document, children)
    }

    pub fn paragraph(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Paragraph, children)
    }

    pub fn header(level: u8, children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Header { level }, children)
    }

    pub fn list(ordered: bool, items: Vec<Block>) -> Self {
        Block::with_children(BlockKind::List { ordered }, items)
    }

    pub fn list_item(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::ListItem, children)
    }

    pub fn format(format: Format, children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Format(format), children)
    }

    pub fn group(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Group, children)
    }

    pub fn word(text: impl Into<String>) -> Self {
        Block::new(BlockKind::Word(text.into()))
    }

    pub fn space() -> Self {
        Block::new(BlockKind::Space)
    }

    pub fn symbol(symbol: char) -> Self {
        Block::new(BlockKind::SpecialSymbol(symbol))
    }

    pub fn new_line() -> Self {
        Block::new(BlockKind::NewLine)
    }

    pub fn horizontal_line() -> Self {
        Block::new(BlockKind::HorizontalLine)
    }

    pub fn verbatim(content: impl Into<String>, inline: bool) -> Self {
        Block::new(BlockKind::Verbatim {
            content: content.into(),
            inline,
        })
    }

    pub fn raw(syntax: Syntax, content: impl Into<String>) -> Self {
        Block::new(BlockKind::Raw {
            syntax,
            content: content.into(),
        })
    }

    pub fn link(reference: impl Into<String>, label: Vec<Block>) -> Self {
        Block::with_children(
            BlockKind::Link {
                reference: reference.into(),
            },
            label,
        )
    }

    pub fn macro_call(call: MacroCall) -> Self {
        Block::new(BlockKind::Macro(call))
    }

    pub fn macro_marker(call: MacroCall, children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::MacroMarker(call), children)
    }

    pub fn metadata(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::MetaData, children)
    }

    pub fn composite(children: Vec<Block>) -> Self {
        Block::with_children(BlockKind::Composite, children)
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Whether this block may appear inside inline-only content (paragraphs,
    /// headers, formats). Metadata and composite wrappers take the placement
    /// of their children.
    pub fn is_inline(&self) -> bool {
        match &self.kind {
            BlockKind::Word(_)
            | BlockKind::Space
            | BlockKind::SpecialSymbol(_)
            | BlockKind::NewLine
            | BlockKind::Format(_)
            | BlockKind::Link { .. }
            | BlockKind::Raw { .. } => true,
            BlockKind::Verbatim { inline, .. } => *inline,
            BlockKind::Macro(call) | BlockKind::MacroMarker(call) => call.inline,
            BlockKind::MetaData | BlockKind::Composite => {
                self.children.iter().all(Block::is_inline)
            }
            BlockKind::Document
            | BlockKind::Paragraph
            | BlockKind::Header { .. }
            | BlockKind::List { .. }
            | BlockKind::ListItem
            | BlockKind::Group
            | BlockKind::EmptyLines(_)
            | BlockKind::HorizontalLine => false,
        }
    }

    /// Whether every child of this block must be inline.
    pub fn requires_inline_children(&self) -> bool {
        match &self.kind {
            BlockKind::Paragraph
            | BlockKind::Header { .. }
            | BlockKind::Format(_)
            | BlockKind::Link { .. } => true,
            BlockKind::MacroMarker(call) => call.inline,
            _ => false,
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(String::as_str)
    }

    pub fn as_macro_call(&self) -> Option<&MacroCall> {
        match &self.kind {
            BlockKind::Macro(call) => Some(call),
            _ => None,
        }
    }

    /// Short name of the block kind, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            BlockKind::Document => "document",
            BlockKind::Paragraph => "paragraph",
            BlockKind::Header { .. } => "header",
            BlockKind::List { .. } => "list",
            BlockKind::ListItem => "list item",
            BlockKind::Format(_) => "format",
            BlockKind::Group => "group",
            BlockKind::Word(_) => "word",
            BlockKind::Space => "space",
            BlockKind::SpecialSymbol(_) => "special symbol",
            BlockKind::NewLine => "new line",
            BlockKind::EmptyLines(_) => "empty lines",
            BlockKind::HorizontalLine => "horizontal line",
            BlockKind::Verbatim { .. } => "verbatim",
            BlockKind::Raw { .. } => "raw",
            BlockKind::Link { .. } => "link",
            BlockKind::Macro(_) => "macro",
            BlockKind::MacroMarker(_) => "macro marker",
            BlockKind::MetaData => "metadata",
            BlockKind::Composite => "composite",
        }
    }

    /// Plain text of the words, spaces and symbols below this block.
    pub fn text_content(&self) -> String {
        let mut text = String::new();
        for block in self.descendants() {
            match &block.kind {
                BlockKind::Word(word) => text.push_str(word),
                BlockKind::Space => text.push(' '),
                BlockKind::SpecialSymbol(symbol) => text.push(*symbol),
                BlockKind::NewLine => text.push('\n'),
                BlockKind::Verbatim { content, .. } => text.push_str(content),
                _ => {}
            }
        }
        text
    }

    /// Anchor of a header: `H` followed by the alphanumeric characters of
    /// its text. Shared by the HTML renderer and tables of contents.
    pub fn anchor(&self) -> String {
        let text: String = self
            .text_content()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        format!("H{}", text)
    }

    // -----------------------------------------------------------------------
    // Navigation
    // -----------------------------------------------------------------------

    /// Follow a path of child indices from this block.
    pub fn node_at(&self, path: &[usize]) -> Option<&Block> {
        let mut node = self;
        for &index in path {
            node = node.children.get(index)?;
        }
        Some(node)
    }

    pub fn node_at_mut(&mut self, path: &[usize]) -> Option<&mut Block> {
        let mut node = self;
        for &index in path {
            node = node.children.get_mut(index)?;
        }
        Some(node)
    }

    /// Pre-order iterator over this block and everything below it.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }

    /// Unexpanded macro calls below this block, in document order.
    pub fn macro_calls(&self) -> Vec<&MacroCall> {
        self.descendants().filter_map(Block::as_macro_call).collect()
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Block>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Block;

    fn next(&mut self) -> Option<Self::Item> {
        let block = self.stack.pop()?;
        self.stack.extend(block.children.iter().rev());
        Some(block)
    }
}
