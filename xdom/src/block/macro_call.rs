use std::collections::BTreeMap;

/// A macro invocation as written in the source: identifier, parameters and
/// optional raw content. The content stays an opaque string until the macro
/// decides how to parse it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroCall {
    pub id: String,
    pub parameters: BTreeMap<String, String>,
    pub content: Option<String>,
    /// True when the call sits inside a paragraph rather than on its own lines.
    pub inline: bool,
}

impl MacroCall {
    pub fn new(id: impl Into<String>) -> Self {
        MacroCall {
            id: id.into(),
            parameters: BTreeMap::new(),
            content: None,
            inline: false,
        }
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn inline(mut self, inline: bool) -> Self {
        self.inline = inline;
        self
    }

    /// Parameter names are case-insensitive. Exact match wins.
    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters
            .get(name)
            .or_else(|| {
                self.parameters
                    .iter()
                    .find(|(key, _)| key.eq_ignore_ascii_case(name))
                    .map(|(_, value)| value)
            })
            .map(String::as_str)
    }
}
