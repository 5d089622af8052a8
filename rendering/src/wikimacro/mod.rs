//! Macros defined by wiki documents rather than code.

mod definition;
mod manager;

use xdom::block::text::split_text;
use xdom::block::{META_AUTHOR, META_SOURCE, META_SYNTAX};
use xdom::{Block, BlockKind, MacroCall, Syntax, parser_for};

pub use definition::{WikiMacroDefinition, WikiMacroVisibility, split_front_matter};
pub use manager::{WikiMacroManager, WikiMacroState};

use crate::descriptor::{MacroDescriptor, MacroParameters};
use crate::error::{MacroError, RegistrationError};
use crate::macros::{CONTENT_PLACEHOLDER, Macro, PARAMETER_PLACEHOLDER};
use crate::model::DocumentReference;
use crate::transformation::{MacroTransformationContext, placement};

/// A macro whose output is the body of a wiki document, with the call's
/// content and parameters substituted for the placeholder macros.
///
/// The output is wrapped in provenance metadata, so macros in the body expand
/// in later passes in the body's syntax and with the rights of the macro's
/// author, not the caller's.
pub struct WikiMacro {
    descriptor: MacroDescriptor,
    reference: DocumentReference,
    author: Option<String>,
    syntax: Syntax,
    body: Vec<Block>,
}

impl WikiMacro {
    /// Prepare a macro from its definition. The body is parsed once, here.
    pub fn new(
        definition: WikiMacroDefinition,
        reference: DocumentReference,
        author: Option<String>,
    ) -> Result<Self, RegistrationError> {
        let id = definition.descriptor.id.clone();
        let parser = parser_for(definition.syntax).ok_or_else(|| {
            let reason = format!("no parser for syntax {}", definition.syntax);
            RegistrationError::Malformed(id.clone(), reason)
        })?;
        let body = parser.parse(&definition.body, 0).map_err(|errors| {
            let reasons: Vec<String> = errors.iter().map(ToString::to_string).collect();
            RegistrationError::Malformed(id, reasons.join("; "))
        })?;
        Ok(WikiMacro {
            descriptor: definition.descriptor,
            reference,
            author,
            syntax: definition.syntax,
            body: body.children,
        })
    }

    pub fn reference(&self) -> &DocumentReference {
        &self.reference
    }

    pub fn author(&self) -> Option<&str> {
        self.author.as_deref()
    }
}

impl Macro for WikiMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let content = match content {
            Some(content) if uses_content(&self.body) => {
                // The caller's content keeps the caller's syntax and rights;
                // an empty author stands for a guest.
                let blocks = context.parse_content_as(content, context.syntax())?;
                let mut caller = Block::metadata(blocks)
                    .with_parameter(META_SYNTAX, context.syntax().id())
                    .with_parameter(META_AUTHOR, context.author().unwrap_or_default());
                if let Some(source) = context.sources().last() {
                    caller = caller.with_parameter(META_SOURCE, source.to_string());
                }
                Some(caller)
            }
            _ => None,
        };

        let body = substitute(self.body.clone(), parameters, content.as_ref());
        let mut output = Block::metadata(body)
            .with_parameter(META_SOURCE, self.reference.to_string())
            .with_parameter(META_SYNTAX, self.syntax.id());
        if let Some(author) = &self.author {
            output = output.with_parameter(META_AUTHOR, author.clone());
        }
        Ok(vec![output])
    }
}

fn is_placeholder(call: &MacroCall, id: &str) -> bool {
    call.id == id
}

fn uses_content(body: &[Block]) -> bool {
    body.iter().any(|block| {
        block
            .descendants()
            .filter_map(Block::as_macro_call)
            .any(|call| is_placeholder(call, CONTENT_PLACEHOLDER))
    })
}

/// Replace the placeholder calls of `blocks` with the call's content and
/// parameter values, fitted to where each placeholder sits.
fn substitute(
    blocks: Vec<Block>,
    parameters: &MacroParameters,
    content: Option<&Block>,
) -> Vec<Block> {
    blocks
        .into_iter()
        .flat_map(|block| match &block.kind {
            BlockKind::Macro(call) if is_placeholder(call, CONTENT_PLACEHOLDER) => {
                let replacement = content.cloned().into_iter().collect();
                placement::place(replacement, call.inline)
            }
            BlockKind::Macro(call) if is_placeholder(call, PARAMETER_PLACEHOLDER) => {
                let value = call
                    .parameter("name")
                    .and_then(|name| parameters.get(name))
                    .unwrap_or_default();
                placement::place(split_text(value), call.inline)
            }
            _ => {
                let Block {
                    kind,
                    children,
                    parameters: block_parameters,
                } = block;
                let children = substitute(children, parameters, content);
                vec![Block::with_children(kind, children).with_parameters(block_parameters)]
            }
        })
        .collect()
}
