//! Block tree (XDOM), syntax parsers and renderers for wiki markup.

pub mod block;
pub mod parser;
pub mod renderer;
pub mod syntax;

pub use block::{Block, BlockKind, Format, MacroCall, Parameters};
pub use parser::{ParseError, Parser, parser_for};
pub use renderer::{BlockRenderer, render_to_string, renderer_for};
pub use syntax::Syntax;

/// Parse `source` with the parser registered for `syntax`.
pub fn parse(source: &str, syntax: Syntax, file_id: usize) -> Option<Result<Block, Vec<ParseError>>> {
    parser_for(syntax).map(|parser| parser.parse(source, file_id))
}
