use std::error::Error as StdError;
use std::sync::Arc;

use xdom::{Block, Format, MacroCall};

use crate::error::MacroError;

pub const ERROR_CLASS: &str = "xwikirenderingerror";
pub const ERROR_DESCRIPTION_CLASS: &str = "xwikirenderingerrordescription hidden";

const CLICK_FOR_DETAILS: &str = " Click on this message for details.";

/// Looks up message patterns by id, e.g. for translations. Patterns use
/// `{0}`, `{1}`... placeholders.
pub trait MessageResolver: Send + Sync {
    fn resolve(&self, id: &str) -> Option<String>;
}

/// One error to turn into blocks.
#[derive(Debug, Clone, Copy)]
pub struct ErrorMessage<'a> {
    pub inline: bool,
    /// Key for the message resolver. `<id>.description` keys the
    /// description and `<id>.restricted` the message in restricted frames.
    pub id: Option<&'a str>,
    pub message: &'a str,
    pub description: Option<&'a str>,
    pub arguments: &'a [String],
    pub cause: Option<&'a (dyn StdError + 'static)>,
}

/// Builds the visible error blocks that replace a failed macro call: a
/// message block followed, outside restricted frames, by a hidden detail
/// block.
#[derive(Clone, Default)]
pub struct ErrorBlockGenerator {
    resolver: Option<Arc<dyn MessageResolver>>,
}

impl ErrorBlockGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn MessageResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn generate(&self, restricted: bool, error: &ErrorMessage<'_>) -> Vec<Block> {
        let pattern = self.pattern(error.id, restricted, error.message);
        let mut message = substitute(&pattern, error.arguments);
        if let Some(cause) = error.cause {
            message.push_str(&format!(". Cause: [{}]", cause));
        }
        message.push('.');

        let details = if restricted {
            None
        } else {
            match (error.description, error.cause) {
                (Some(description), _) => {
                    let key = error.id.map(|id| format!("{}.description", id));
                    let pattern = key
                        .and_then(|key| self.resolve(&key))
                        .unwrap_or_else(|| description.to_string());
                    Some(substitute(&pattern, error.arguments))
                }
                (None, Some(cause)) => Some(cause_chain(cause)),
                (None, None) => None,
            }
        };
        if details.is_some() {
            message.push_str(CLICK_FOR_DETAILS);
        }

        let mut blocks = vec![container(error.inline, vec![Block::word(message)], ERROR_CLASS)];
        if let Some(details) = details {
            blocks.push(container(
                error.inline,
                vec![Block::verbatim(details, error.inline)],
                ERROR_DESCRIPTION_CLASS,
            ));
        }
        blocks
    }

    /// Standard error blocks for a failed macro call.
    pub fn for_macro_error(
        &self,
        restricted: bool,
        error: &MacroError,
        call: &MacroCall,
    ) -> Vec<Block> {
        let arguments = [call.id.clone()];
        let message = match error {
            MacroError::UnknownMacro(_) => ErrorMessage {
                inline: call.inline,
                id: Some("rendering.macro.error.unknown"),
                message: "Unknown macro: {0}",
                description: Some(
                    "The \"{0}\" macro is not in the list of registered macros. Verify the spelling or contact your administrator.",
                ),
                arguments: &arguments,
                cause: None,
            },
            MacroError::InlineNotSupported(_) => ErrorMessage {
                inline: call.inline,
                id: Some("rendering.macro.error.inline"),
                message: "The [{0}] macro is a standalone macro and it cannot be used inline",
                description: Some(
                    "This macro generates standalone content. Make sure it is separated from the content before and after it by an empty line, so that it sits on lines of its own.",
                ),
                arguments: &arguments,
                cause: None,
            },
            MacroError::NestingTooDeep(_) | MacroError::TooManyExecutions(_) => ErrorMessage {
                inline: call.inline,
                id: Some("rendering.macro.error.recursion"),
                message: "Maximum macro recursion reached while executing the [{0}] macro",
                description: None,
                arguments: &arguments,
                cause: Some(error),
            },
            _ => ErrorMessage {
                inline: call.inline,
                id: Some("rendering.macro.error.failure"),
                message: "Failed to execute the [{0}] macro",
                description: None,
                arguments: &arguments,
                cause: Some(error),
            },
        };
        self.generate(restricted, &message)
    }

    fn resolve(&self, id: &str) -> Option<String> {
        self.resolver.as_ref()?.resolve(id)
    }

    fn pattern(&self, id: Option<&str>, restricted: bool, fallback: &str) -> String {
        let Some(id) = id else {
            return fallback.to_string();
        };
        restricted
            .then(|| self.resolve(&format!("{}.restricted", id)))
            .flatten()
            .or_else(|| self.resolve(id))
            .unwrap_or_else(|| fallback.to_string())
    }
}

fn container(inline: bool, children: Vec<Block>, class: &str) -> Block {
    let block = if inline {
        Block::format(Format::None, children)
    } else {
        Block::group(children)
    };
    block.with_parameter("class", class)
}

fn substitute(pattern: &str, arguments: &[String]) -> String {
    arguments
        .iter()
        .enumerate()
        .fold(pattern.to_string(), |text, (index, argument)| {
            text.replace(&format!("{{{}}}", index), argument)
        })
}

fn cause_chain(cause: &(dyn StdError + 'static)) -> String {
    let mut lines = vec![cause.to_string()];
    let mut source = cause.source();
    while let Some(error) = source {
        lines.push(format!("Caused by: {}", error));
        source = error.source();
    }
    lines.join("\n")
}
