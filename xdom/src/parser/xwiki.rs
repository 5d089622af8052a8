use tracing::debug;

use crate::block::{Block, BlockKind};
use crate::parser::error::ParseError;
use crate::parser::inline::parse_inline;
use crate::parser::macro_syntax;
use crate::parser::Parser;
use crate::syntax::Syntax;

/// Parser for the xwiki/2.1 markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct XWikiParser;

impl Parser for XWikiParser {
    fn syntax(&self) -> Syntax {
        Syntax::XWiki21
    }

    fn parse(&self, source: &str, file_id: usize) -> Result<Block, Vec<ParseError>> {
        let mut state = ParseState::new(source, file_id);
        state.parse_blocks();
        state.finalize()
    }
}

// ---------------------------------------------------------------------------
// Parse state
// ---------------------------------------------------------------------------

struct ParseState<'a> {
    source: &'a str,
    file_id: usize,
    pos: usize,
    blocks: Vec<Block>,
    errors: Vec<ParseError>,
}

struct ListLine {
    level: usize,
    ordered: bool,
    content: Vec<Block>,
}

impl<'a> ParseState<'a> {
    fn new(source: &'a str, file_id: usize) -> Self {
        ParseState {
            source,
            file_id,
            pos: 0,
            blocks: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn finalize(self) -> Result<Block, Vec<ParseError>> {
        if !self.errors.is_empty() {
            debug!(errors = self.errors.len(), "xwiki parse failed");
            return Err(self.errors);
        }
        Ok(Block::document(self.blocks))
    }

    /// The line starting at `pos` (without its line break) and the offset of
    /// the following line.
    fn line_at(&self, pos: usize) -> (&'a str, usize) {
        let source: &'a str = self.source;
        match source[pos..].find('\n') {
            Some(offset) => (&source[pos..pos + offset], pos + offset + 1),
            None => (&source[pos..], source.len()),
        }
    }

    fn parse_blocks(&mut self) {
        let mut blank_lines = 0usize;

        while self.pos < self.source.len() {
            let (line, next) = self.line_at(self.pos);
            if line.trim().is_empty() {
                blank_lines += 1;
                self.pos = next;
                continue;
            }
            if blank_lines > 1 && !self.blocks.is_empty() {
                self.blocks
                    .push(Block::new(BlockKind::EmptyLines(blank_lines - 1)));
            }
            blank_lines = 0;

            if let Err(error) = self.block(line, next) {
                self.errors.push(error);
                self.pos = next;
            }
        }
    }

    fn block(&mut self, line: &'a str, next: usize) -> Result<(), ParseError> {
        if let Some((level, title)) = header(line) {
            let range = self.pos + title.start..self.pos + title.end;
            let title = parse_inline(self.source, range, self.file_id)?;
            self.blocks.push(Block::header(level, title));
            self.pos = next;
            return Ok(());
        }
        if is_horizontal_line(line) {
            self.blocks.push(Block::horizontal_line());
            self.pos = next;
            return Ok(());
        }
        if list_marker(line).is_some() {
            return self.list();
        }
        if line.starts_with("{{{") && self.standalone_verbatim()? {
            return Ok(());
        }
        if line.starts_with("{{") && self.standalone_macro()? {
            return Ok(());
        }
        self.paragraph()
    }

    /// A verbatim block alone on its lines. Returns false when the `{{{`
    /// turns out to open inline verbatim text.
    fn standalone_verbatim(&mut self) -> Result<bool, ParseError> {
        let start = self.pos;
        let body_start = start + 3;
        let Some(offset) = self.source[body_start..].find("}}}") else {
            return Err(ParseError::error(
                "unterminated verbatim block",
                start..body_start,
                self.file_id,
            )
            .with_note("verbatim text must end with }}}"));
        };
        let body_end = body_start + offset;
        let (rest, next) = self.line_at(body_end + 3);
        if !rest.trim().is_empty() {
            return Ok(false);
        }
        let content = &self.source[body_start..body_end];
        let content = content.strip_prefix('\n').unwrap_or(content);
        let content = content.strip_suffix('\n').unwrap_or(content);
        self.blocks.push(Block::verbatim(content, false));
        self.pos = next;
        Ok(true)
    }

    /// A macro call alone on its lines.
    fn standalone_macro(&mut self) -> Result<bool, ParseError> {
        let Some(found) = macro_syntax::parse_macro(self.source, self.pos, self.file_id)? else {
            return Ok(false);
        };
        let (rest, next) = self.line_at(found.end);
        if !rest.trim().is_empty() {
            return Ok(false);
        }
        self.blocks.push(Block::macro_call(found.call));
        self.pos = next;
        Ok(true)
    }

    fn paragraph(&mut self) -> Result<(), ParseError> {
        let end = self.paragraph_end(self.pos)?;
        let content = parse_inline(self.source, self.pos..end, self.file_id)?;
        self.blocks.push(Block::paragraph(content));
        self.pos = (end + 1).min(self.source.len());
        Ok(())
    }

    /// A paragraph runs until a blank line or a line opening another
    /// structural block. Verbatim text and macro calls may span lines.
    fn paragraph_end(&self, start: usize) -> Result<usize, ParseError> {
        let source = self.source;
        let mut i = start;
        loop {
            while i < source.len() && source.as_bytes()[i] != b'\n' {
                let rest = &source[i..];
                if rest.starts_with('~') {
                    i += 1;
                    if let Some(c) = source[i..].chars().next() {
                        i += c.len_utf8();
                    }
                    continue;
                }
                if rest.starts_with("{{{") {
                    match source[i + 3..].find("}}}") {
                        Some(offset) => i += 3 + offset + 3,
                        None => {
                            return Err(ParseError::error(
                                "unterminated verbatim block",
                                i..i + 3,
                                self.file_id,
                            )
                            .with_note("verbatim text must end with }}}"));
                        }
                    }
                    continue;
                }
                if rest.starts_with("{{") {
                    if let Some(found) = macro_syntax::parse_macro(source, i, self.file_id)? {
                        i = found.end;
                        continue;
                    }
                }
                i += rest.chars().next().map_or(1, char::len_utf8);
            }

            if i >= source.len() {
                return Ok(source.len());
            }
            let (next_line, _) = self.line_at(i + 1);
            if i + 1 >= source.len()
                || next_line.trim().is_empty()
                || header(next_line).is_some()
                || is_horizontal_line(next_line)
                || list_marker(next_line).is_some()
            {
                return Ok(i);
            }
            i += 1;
        }
    }

    fn list(&mut self) -> Result<(), ParseError> {
        let mut lines = Vec::new();
        while self.pos < self.source.len() {
            let (line, next) = self.line_at(self.pos);
            let Some((level, ordered, offset)) = list_marker(line) else {
                break;
            };
            let range = self.pos + offset..self.pos + line.len();
            let content = parse_inline(self.source, range, self.file_id)?;
            lines.push(ListLine {
                level,
                ordered,
                content,
            });
            self.pos = next;
        }
        let mut index = 0;
        while index < lines.len() {
            self.blocks.push(build_list(&mut lines, &mut index, 1));
        }
        Ok(())
    }
}

fn build_list(lines: &mut [ListLine], index: &mut usize, level: usize) -> Block {
    let ordered = lines[*index].ordered;
    let mut items: Vec<Block> = Vec::new();

    while *index < lines.len() {
        let line_level = lines[*index].level;
        if line_level < level {
            break;
        }
        if line_level > level {
            let nested = build_list(lines, index, level + 1);
            match items.last_mut() {
                Some(item) => item.children.push(nested),
                None => items.push(Block::list_item(vec![nested])),
            }
            continue;
        }
        items.push(Block::list_item(std::mem::take(&mut lines[*index].content)));
        *index += 1;
    }
    Block::list(ordered, items)
}

// ---------------------------------------------------------------------------
// Line classification
// ---------------------------------------------------------------------------

/// `== Title ==` gives the level and the byte range of the title in the line.
fn header(line: &str) -> Option<(u8, std::ops::Range<usize>)> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = &line[indent..];
    let level = trimmed.chars().take_while(|c| *c == '=').count();
    if level == 0 || level > 6 {
        return None;
    }
    let after = &trimmed[level..];
    if !after.starts_with(' ') && !after.starts_with('\t') {
        return None;
    }
    let title_start = indent + level + (after.len() - after.trim_start().len());
    let title_end = indent + trimmed.trim_end().trim_end_matches('=').trim_end().len();
    Some((level as u8, title_start..title_end.max(title_start)))
}

fn is_horizontal_line(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() >= 4 && trimmed.chars().all(|c| c == '-')
}

/// `*`, `**`, `1.`, `11.` followed by a space: level, ordered, and the
/// offset of the item content.
fn list_marker(line: &str) -> Option<(usize, bool, usize)> {
    let indent = line.len() - line.trim_start().len();
    let trimmed = &line[indent..];

    let stars = trimmed.chars().take_while(|c| *c == '*').count();
    let (level, ordered, marker_len) = if stars > 0 {
        (stars, false, stars)
    } else {
        let ones = trimmed.chars().take_while(|c| *c == '1').count();
        if ones == 0 || !trimmed[ones..].starts_with('.') {
            return None;
        }
        (ones, true, ones + 1)
    };

    let after = &trimmed[marker_len..];
    if !after.starts_with(' ') {
        return None;
    }
    let content_offset = indent + marker_len + (after.len() - after.trim_start().len());
    Some((level, ordered, content_offset))
}
