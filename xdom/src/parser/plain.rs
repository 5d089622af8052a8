use crate::block::text::split_text;
use crate::block::Block;
use crate::parser::error::ParseError;
use crate::parser::Parser;
use crate::syntax::Syntax;

/// Plain text: blank lines separate paragraphs, nothing else is markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextParser;

impl Parser for PlainTextParser {
    fn syntax(&self) -> Syntax {
        Syntax::Plain10
    }

    fn parse(&self, source: &str, _file_id: usize) -> Result<Block, Vec<ParseError>> {
        let mut paragraphs = Vec::new();
        let mut current: Vec<&str> = Vec::new();

        for line in source.lines() {
            if line.trim().is_empty() {
                if !current.is_empty() {
                    paragraphs.push(Block::paragraph(split_text(&current.join("\n"))));
                    current.clear();
                }
            } else {
                current.push(line);
            }
        }
        if !current.is_empty() {
            paragraphs.push(Block::paragraph(split_text(&current.join("\n"))));
        }
        Ok(Block::document(paragraphs))
    }
}
