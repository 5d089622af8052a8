//! Reading and writing the `{{id param="value"}}content{{/id}}` macro call
//! syntax shared by the xwiki parser and renderer.

use std::collections::BTreeMap;
use std::fmt::Write;

use crate::block::MacroCall;
use crate::parser::error::ParseError;

/// A macro call read from the source, ending at byte offset `end`.
#[derive(Debug, Clone, PartialEq)]
pub struct MacroMatch {
    pub call: MacroCall,
    pub end: usize,
}

struct Head {
    id: String,
    parameters: BTreeMap<String, String>,
    self_closing: bool,
    end: usize,
}

/// Read a macro call starting at `start`.
///
/// Returns `Ok(None)` when the text at `start` is not a well-formed macro
/// opening (it is then ordinary text), and an error when the opening is
/// well-formed but the matching closing tag is missing.
pub fn parse_macro(
    source: &str,
    start: usize,
    file_id: usize,
) -> Result<Option<MacroMatch>, ParseError> {
    let Some(head) = parse_head(source, start) else {
        return Ok(None);
    };

    if head.self_closing {
        return Ok(Some(MacroMatch {
            call: MacroCall {
                id: head.id,
                parameters: head.parameters,
                content: None,
                inline: false,
            },
            end: head.end,
        }));
    }

    let Some((close_start, close_end)) = find_close(source, &head.id, head.end) else {
        return Err(ParseError::error(
            format!("unclosed macro [{}]", head.id),
            start..head.end,
            file_id,
        )
        .with_note(format!(
            "close it with {{{{/{}}}}} or write it as {{{{{}/}}}}",
            head.id, head.id
        )));
    };

    Ok(Some(MacroMatch {
        call: MacroCall {
            id: head.id,
            parameters: head.parameters,
            content: Some(trim_content(&source[head.end..close_start]).to_string()),
            inline: false,
        },
        end: close_end,
    }))
}

/// Print a call back in xwiki syntax.
pub fn print_macro(call: &MacroCall) -> String {
    let mut out = format!("{{{{{}", call.id);
    for (name, value) in &call.parameters {
        let _ = write!(out, " {}=\"{}\"", name, escape_value(value));
    }
    match &call.content {
        None => out.push_str("/}}"),
        Some(content) => {
            out.push_str("}}");
            let multiline = !call.inline && content.contains('\n');
            if multiline {
                out.push('\n');
            }
            out.push_str(content);
            if multiline {
                out.push('\n');
            }
            let _ = write!(out, "{{{{/{}}}}}", call.id);
        }
    }
    out
}

fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if c == '~' || c == '"' {
            escaped.push('~');
        }
        escaped.push(c);
    }
    escaped
}

/// Content keeps everything between the tags except one leading and one
/// trailing line break.
fn trim_content(content: &str) -> &str {
    let content = content
        .strip_prefix("\r\n")
        .or_else(|| content.strip_prefix('\n'))
        .unwrap_or(content);
    content
        .strip_suffix("\r\n")
        .or_else(|| content.strip_suffix('\n'))
        .unwrap_or(content)
}

// ---------------------------------------------------------------------------
// Head and closing tag
// ---------------------------------------------------------------------------

fn parse_head(source: &str, start: usize) -> Option<Head> {
    let rest = source.get(start..)?;
    if !rest.starts_with("{{") || rest.starts_with("{{{") || rest.starts_with("{{/") {
        return None;
    }

    let mut cursor = Cursor {
        source,
        pos: start + 2,
    };
    cursor.skip_whitespace();
    let id = cursor.take_identifier()?;
    let mut parameters = BTreeMap::new();

    loop {
        let spaced = cursor.skip_whitespace();
        if cursor.eat("/}}") {
            return Some(Head {
                id,
                parameters,
                self_closing: true,
                end: cursor.pos,
            });
        }
        if cursor.eat("}}") {
            return Some(Head {
                id,
                parameters,
                self_closing: false,
                end: cursor.pos,
            });
        }
        if !spaced {
            return None;
        }
        let name = cursor.take_identifier()?;
        cursor.skip_whitespace();
        if !cursor.eat("=") {
            return None;
        }
        cursor.skip_whitespace();
        let value = cursor.take_value()?;
        parameters.insert(name, value);
    }
}

/// Find the closing tag matching an opening tag that ended at `from`,
/// skipping nested non-self-closing calls of the same macro.
fn find_close(source: &str, id: &str, from: usize) -> Option<(usize, usize)> {
    let closing = format!("{{{{/{}}}}}", id);
    let mut depth = 0usize;
    let mut pos = from;

    while let Some(offset) = source[pos..].find("{{") {
        let at = pos + offset;
        if source[at..].starts_with(&closing) {
            if depth == 0 {
                return Some((at, at + closing.len()));
            }
            depth -= 1;
            pos = at + closing.len();
            continue;
        }
        if let Some(head) = parse_head(source, at) {
            if head.id == id && !head.self_closing {
                depth += 1;
            }
            pos = head.end;
            continue;
        }
        pos = at + 2;
    }
    None
}

struct Cursor<'a> {
    source: &'a str,
    pos: usize,
}

impl Cursor<'_> {
    fn rest(&self) -> &str {
        &self.source[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn eat(&mut self, token: &str) -> bool {
        if self.rest().starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    /// Returns whether any whitespace was skipped.
    fn skip_whitespace(&mut self) -> bool {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
        self.pos > start
    }

    fn take_identifier(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() => {}
            _ => return None,
        }
        while let Some(c) = self.peek() {
            if !(c.is_alphanumeric() || c == '_' || c == '-' || c == '.') {
                break;
            }
            self.pos += c.len_utf8();
        }
        Some(self.source[start..self.pos].to_string())
    }

    fn take_value(&mut self) -> Option<String> {
        let mut value = String::new();
        if self.eat("\"") {
            loop {
                let c = self.peek()?;
                self.pos += c.len_utf8();
                match c {
                    '"' => return Some(value),
                    '~' => {
                        let escaped = self.peek()?;
                        self.pos += escaped.len_utf8();
                        value.push(escaped);
                    }
                    c => value.push(c),
                }
            }
        }

        while let Some(c) = self.peek() {
            if c.is_whitespace() || self.rest().starts_with("}}") || self.rest().starts_with("/}}")
            {
                break;
            }
            self.pos += c.len_utf8();
            value.push(c);
        }
        if value.is_empty() { None } else { Some(value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(source: &str) -> MacroCall {
        parse_macro(source, 0, 0).unwrap().unwrap().call
    }

    #[test]
    fn self_closing_with_parameters() {
        let call = call(r#"{{toc start="2" depth=3/}}"#);
        assert_eq!(call.id, "toc");
        assert_eq!(call.parameter("start"), Some("2"));
        assert_eq!(call.parameter("DEPTH"), Some("3"));
        assert_eq!(call.content, None);
    }

    #[test]
    fn content_drops_surrounding_line_breaks() {
        let call = call("{{code}}\nfn main() {}\n{{/code}}");
        assert_eq!(call.content.as_deref(), Some("fn main() {}"));
    }

    #[test]
    fn nested_same_macro_is_matched() {
        let call = call("{{box}}a{{box}}b{{/box}}c{{/box}}");
        assert_eq!(call.content.as_deref(), Some("a{{box}}b{{/box}}c"));
    }

    #[test]
    fn escaped_quote_in_value() {
        let call = call(r#"{{x title="say ~"hi~""/}}"#);
        assert_eq!(call.parameter("title"), Some(r#"say "hi""#));
    }

    #[test]
    fn not_a_macro_is_text() {
        assert!(parse_macro("{{ 42 }}", 0, 0).unwrap().is_none());
        assert!(parse_macro("{{{verbatim}}}", 0, 0).unwrap().is_none());
    }

    #[test]
    fn unclosed_macro_is_an_error() {
        let error = parse_macro("{{info}}never closed", 0, 0).unwrap_err();
        assert!(error.message.contains("unclosed macro [info]"));
        assert_eq!(error.span, 0..8);
    }

    #[test]
    fn printing_quotes_and_escapes() {
        let call = MacroCall::new("x")
            .with_parameter("title", "a \"b\"")
            .with_content("body")
            .inline(true);
        assert_eq!(print_macro(&call), r#"{{x title="a ~"b~""}}body{{/x}}"#);
        assert_eq!(print_macro(&MacroCall::new("toc")), "{{toc/}}");
    }
}
