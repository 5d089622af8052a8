//! Macros whose content is a script run by an external evaluator.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tinytemplate::TinyTemplate;
use xdom::Block;

use crate::descriptor::{
    ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor, ParameterType,
};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::security::Right;
use crate::transformation::MacroTransformationContext;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ScriptError {
    pub message: String,
}

impl ScriptError {
    pub fn new(message: impl Into<String>) -> Self {
        ScriptError {
            message: message.into(),
        }
    }
}

/// Values a script can read.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScriptBindings {
    /// The macro parameters, by lowercase name.
    #[serde(flatten)]
    pub parameters: BTreeMap<String, String>,
    /// The document the script was written in.
    pub doc: Option<String>,
    /// The user the page is rendered for.
    pub user: Option<String>,
}

pub enum ScriptOutput {
    /// Wiki markup, parsed in the syntax of the calling document.
    Text(String),
    Blocks(Vec<Block>),
}

pub trait ScriptEvaluator: Send + Sync {
    fn evaluate(&self, script: &str, bindings: &ScriptBindings) -> Result<ScriptOutput, ScriptError>;
}

/// Runs its content through a [`ScriptEvaluator`]. The author of the call
/// needs `required_right`; restricted frames refuse it.
pub struct ScriptMacro {
    descriptor: MacroDescriptor,
    evaluator: Arc<dyn ScriptEvaluator>,
}

impl ScriptMacro {
    pub fn new(id: &str, evaluator: Arc<dyn ScriptEvaluator>, required_right: Right) -> Self {
        let descriptor = MacroDescriptor::new(id, id)
            .description(format!("Evaluates the content as a {} script.", id))
            .parameter(
                ParameterDescriptor::new("output")
                    .description("Whether the script output is shown.")
                    .kind(ParameterType::Boolean)
                    .default_value("true"),
            )
            .content(ContentDescriptor::Mandatory)
            .inline(true)
            .requires(required_right);
        ScriptMacro {
            descriptor,
            evaluator,
        }
    }
}

impl Macro for ScriptMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let mut values = parameters.to_map();
        values.remove("output");
        let bindings = ScriptBindings {
            parameters: values,
            doc: context.sources().last().map(ToString::to_string),
            user: context.rendering().user().map(str::to_string),
        };

        let output = self
            .evaluator
            .evaluate(content.unwrap_or_default(), &bindings)
            .map_err(|error| {
                MacroError::with_source(
                    format!("Failed to evaluate the [{}] script", self.descriptor.id),
                    error,
                )
            })?;
        if parameters.get_bool("output") == Some(false) {
            return Ok(Vec::new());
        }
        match output {
            ScriptOutput::Text(text) => context.parse_content(&text),
            ScriptOutput::Blocks(blocks) => Ok(blocks),
        }
    }
}

/// Evaluates `tinytemplate` templates: `{name}` prints a binding,
/// `{{ if doc }}...{{ endif }}` tests one. Output is not escaped, it is
/// wiki markup.
#[derive(Debug, Default, Clone, Copy)]
pub struct TemplateEvaluator;

const TEMPLATE_NAME: &str = "content";

impl ScriptEvaluator for TemplateEvaluator {
    fn evaluate(&self, script: &str, bindings: &ScriptBindings) -> Result<ScriptOutput, ScriptError> {
        let mut template = TinyTemplate::new();
        template.set_default_formatter(&tinytemplate::format_unescaped);
        template
            .add_template(TEMPLATE_NAME, script)
            .map_err(|error| ScriptError::new(error.to_string()))?;
        template
            .render(TEMPLATE_NAME, bindings)
            .map(ScriptOutput::Text)
            .map_err(|error| ScriptError::new(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(script: &str, bindings: &ScriptBindings) -> String {
        match TemplateEvaluator.evaluate(script, bindings).unwrap() {
            ScriptOutput::Text(text) => text,
            ScriptOutput::Blocks(_) => panic!("expected text output"),
        }
    }

    #[test]
    fn parameters_are_bound_by_name() {
        let bindings = ScriptBindings {
            parameters: BTreeMap::from([("name".to_string(), "World".to_string())]),
            ..Default::default()
        };
        assert_eq!(render("Hello **{name}**", &bindings), "Hello **World**");
    }

    #[test]
    fn output_is_not_escaped() {
        let bindings = ScriptBindings {
            user: Some("<alice>".to_string()),
            ..Default::default()
        };
        assert_eq!(render("{user}", &bindings), "<alice>");
    }

    #[test]
    fn unknown_binding_is_an_error() {
        assert!(TemplateEvaluator
            .evaluate("{missing}", &ScriptBindings::default())
            .is_err());
    }
}
