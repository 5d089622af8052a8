use std::ops::Range;

use crate::block::text::is_word_char;
use crate::block::{Block, Format};
use crate::parser::error::ParseError;
use crate::parser::macro_syntax;

const FORMAT_MARKERS: [(&str, Format); 5] = [
    ("**", Format::Bold),
    ("//", Format::Italic),
    ("__", Format::Underline),
    ("--", Format::Strikeout),
    ("##", Format::Monospace),
];

/// Parse the inline content found in `range` of `source` (a paragraph, a
/// header title, a list item or a link label).
pub(crate) fn parse_inline(
    source: &str,
    range: Range<usize>,
    file_id: usize,
) -> Result<Vec<Block>, ParseError> {
    let mut parser = InlineParser {
        source,
        end: range.end,
        pos: range.start,
        file_id,
        stack: vec![(None, Vec::new())],
        word: String::new(),
    };
    parser.run()?;
    Ok(parser.finish())
}

struct InlineParser<'a> {
    source: &'a str,
    end: usize,
    pos: usize,
    file_id: usize,
    /// Open formats, innermost last. The bottom entry has no format.
    stack: Vec<(Option<Format>, Vec<Block>)>,
    word: String,
}

impl<'a> InlineParser<'a> {
    fn rest(&self) -> &'a str {
        let source: &'a str = self.source;
        &source[self.pos..self.end]
    }

    fn run(&mut self) -> Result<(), ParseError> {
        while self.pos < self.end {
            let rest = self.rest();

            if rest.starts_with('~') {
                self.escape();
            } else if rest.starts_with("{{{") {
                self.verbatim()?;
            } else if rest.starts_with("{{") && self.macro_call()? {
                // consumed
            } else if rest.starts_with("[[") && self.link()? {
                // consumed
            } else if let Some(format) = format_marker(rest) {
                self.flush_word();
                self.toggle(format);
                self.pos += 2;
            } else {
                let Some(c) = rest.chars().next() else { break };
                self.pos += c.len_utf8();
                self.text_char(c);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> Vec<Block> {
        self.flush_word();
        // Formats left open wrap everything up to the end of the content.
        while self.stack.len() > 1 {
            self.close_top();
        }
        self.stack.pop().map(|(_, blocks)| blocks).unwrap_or_default()
    }

    fn push(&mut self, block: Block) {
        if let Some((_, blocks)) = self.stack.last_mut() {
            blocks.push(block);
        }
    }

    fn flush_word(&mut self) {
        if !self.word.is_empty() {
            let word = std::mem::take(&mut self.word);
            self.push(Block::word(word));
        }
    }

    fn text_char(&mut self, c: char) {
        if is_word_char(c) {
            self.word.push(c);
            return;
        }
        self.flush_word();
        match c {
            '\n' => self.push(Block::new_line()),
            '\r' => {}
            c if c.is_whitespace() => self.push(Block::space()),
            c => self.push(Block::symbol(c)),
        }
    }

    /// `~x` produces `x` literally.
    fn escape(&mut self) {
        self.pos += 1;
        match self.rest().chars().next() {
            Some(c) => {
                self.pos += c.len_utf8();
                if is_word_char(c) {
                    self.word.push(c);
                } else {
                    self.flush_word();
                    self.push(Block::symbol(c));
                }
            }
            None => {
                self.flush_word();
                self.push(Block::symbol('~'));
            }
        }
    }

    fn verbatim(&mut self) -> Result<(), ParseError> {
        self.flush_word();
        let start = self.pos;
        let body_start = start + 3;
        match self.source[body_start..self.end].find("}}}") {
            Some(offset) => {
                let content = &self.source[body_start..body_start + offset];
                self.push(Block::verbatim(content, true));
                self.pos = body_start + offset + 3;
                Ok(())
            }
            None => Err(ParseError::error(
                "unterminated verbatim block",
                start..self.end,
                self.file_id,
            )
            .with_note("verbatim text must end with }}}")),
        }
    }

    fn macro_call(&mut self) -> Result<bool, ParseError> {
        let Some(found) = macro_syntax::parse_macro(self.source, self.pos, self.file_id)? else {
            return Ok(false);
        };
        if found.end > self.end {
            return Ok(false);
        }
        self.flush_word();
        self.push(Block::macro_call(found.call.inline(true)));
        self.pos = found.end;
        Ok(true)
    }

    /// `[[label>>reference]]` or `[[reference]]`.
    fn link(&mut self) -> Result<bool, ParseError> {
        let inner_start = self.pos + 2;
        let Some(offset) = self.source[inner_start..self.end].find("]]") else {
            return Ok(false);
        };
        let inner_end = inner_start + offset;
        let inner = &self.source[inner_start..inner_end];

        self.flush_word();
        let link = match inner.find(">>") {
            Some(split) => {
                let label = parse_inline(self.source, inner_start..inner_start + split, self.file_id)?;
                Block::link(inner[split + 2..].trim(), label)
            }
            None => Block::link(inner.trim(), Vec::new()),
        };
        self.push(link);
        self.pos = inner_end + 2;
        Ok(true)
    }

    /// Open a format, or close it (and anything opened inside it) when it is
    /// already open.
    fn toggle(&mut self, format: Format) {
        let open = self
            .stack
            .iter()
            .rposition(|(open, _)| *open == Some(format));
        match open {
            Some(index) => {
                while self.stack.len() > index {
                    self.close_top();
                }
            }
            None => self.stack.push((Some(format), Vec::new())),
        }
    }

    fn close_top(&mut self) {
        if let Some((Some(format), children)) = self.stack.pop() {
            self.push(Block::format(format, children));
        }
    }
}

fn format_marker(rest: &str) -> Option<Format> {
    FORMAT_MARKERS
        .iter()
        .find(|(marker, _)| rest.starts_with(marker))
        .map(|(_, format)| *format)
}
