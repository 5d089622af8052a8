use std::sync::Arc;

use tracing::debug;
use xdom::Block;
use xdom::block::{META_AUTHOR, META_SOURCE, META_SYNTAX};

use crate::context::Frame;
use crate::descriptor::{
    ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor, ParameterType,
};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::model::DocumentReference;
use crate::security::{GUEST, Right};
use crate::store::DocumentStore;
use crate::transformation::MacroTransformationContext;

/// `include`: the content of another document.
///
/// With `context="current"` (the default) the included blocks are returned
/// as they are and their macros expand in later passes, as if written in the
/// including document. With `context="new"` they are transformed right away
/// under a frame of their own, secured by the included document and its
/// author.
pub struct IncludeMacro {
    descriptor: MacroDescriptor,
    store: Arc<dyn DocumentStore>,
}

impl IncludeMacro {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let descriptor = MacroDescriptor::new("include", "Include")
            .description("Includes the content of another document.")
            .parameter(
                ParameterDescriptor::new("reference")
                    .description("Document to include, as wiki:Space.Page.")
                    .mandatory(),
            )
            .parameter(
                ParameterDescriptor::new("context")
                    .kind(ParameterType::Choice(vec!["current".to_string(), "new".to_string()]))
                    .default_value("current"),
            )
            .content(ContentDescriptor::None);
        IncludeMacro { descriptor, store }
    }
}

impl Macro for IncludeMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        _content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let value = parameters.get("reference").unwrap_or_default();
        let reference = DocumentReference::parse(value, context.rendering().wiki()).ok_or_else(|| {
            MacroError::InvalidParameter {
                parameter: "reference".to_string(),
                value: value.to_string(),
                expected: "a document reference".to_string(),
            }
        })?;

        if context.sources().contains(&reference) {
            return Err(MacroError::execution(format!(
                "Found recursive inclusion of document [{}]",
                reference
            )));
        }
        let user = context.rendering().user();
        if !context
            .authorization()
            .has_access(Right::View, user, Some(&reference))
        {
            return Err(MacroError::execution(format!(
                "Current user [{}] doesn't have view rights on document [{}]",
                user.unwrap_or(GUEST),
                reference
            )));
        }
        let document = self.store.get(&reference).ok_or_else(|| {
            MacroError::execution(format!("Document [{}] does not exist", reference))
        })?;
        debug!(%reference, syntax = %document.syntax, "including document");

        let mut blocks = context.parse_content_as(&document.content, document.syntax)?;
        if parameters
            .get("context")
            .is_some_and(|mode| mode.eq_ignore_ascii_case("new"))
        {
            let frame = match context.rendering().current() {
                Some(current) => current.nested(document.syntax),
                None => Frame::new(document.syntax),
            }
            .secure(Some(reference.clone()), document.author.clone());
            let mut xdom = Block::document(blocks);
            context.transform_nested(&mut xdom, frame)?;
            blocks = xdom.children;
        }

        let mut metadata = Block::metadata(blocks)
            .with_parameter(META_SOURCE, reference.to_string())
            .with_parameter(META_SYNTAX, document.syntax.id());
        if let Some(author) = document.author {
            metadata = metadata.with_parameter(META_AUTHOR, author);
        }
        Ok(vec![metadata])
    }
}
