use serde::Deserialize;
use xdom::Syntax;

use crate::descriptor::{
    ContentDescriptor, DEFAULT_PRIORITY, MacroDescriptor, ParameterDescriptor, ParameterType,
};
use crate::error::RegistrationError;

/// Split a document into its `---` delimited front matter and the rest.
/// Returns `None` when the document has no front matter.
pub fn split_front_matter(content: &str) -> Option<(&str, &str)> {
    let content = content.trim_start_matches('\u{feff}');
    let after_open = content.strip_prefix("---")?;
    let after_open = after_open
        .strip_prefix('\n')
        .or_else(|| after_open.strip_prefix("\r\n"))?;

    let close = after_open.find("\n---")?;
    let front_matter = after_open[..close].trim_end_matches('\r');
    let rest = &after_open[close + 4..];
    let body = rest
        .strip_prefix("\r\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    Some((front_matter, body))
}

/// Who may call a wiki macro.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WikiMacroVisibility {
    /// Only the author of the defining document.
    #[default]
    User,
    /// Every user of the defining document's wiki.
    Wiki,
    Global,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
enum ParameterKind {
    #[default]
    String,
    Integer,
    Boolean,
    Choice,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ParameterDefinition {
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    mandatory: bool,
    default: Option<String>,
    #[serde(rename = "type", default)]
    kind: ParameterKind,
    /// Allowed values of a `choice` parameter.
    #[serde(default)]
    values: Vec<String>,
}

fn default_content() -> ContentDescriptor {
    ContentDescriptor::Optional
}

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct FrontMatter {
    id: String,
    name: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    visibility: WikiMacroVisibility,
    #[serde(default)]
    inline: bool,
    #[serde(default = "default_content")]
    content: ContentDescriptor,
    #[serde(default = "default_priority")]
    priority: i32,
    /// Syntax of the body; `xwiki/2.1` when absent.
    syntax: Option<Syntax>,
    #[serde(default)]
    parameters: Vec<ParameterDefinition>,
}

/// A wiki macro as written in a document: TOML front matter describing the
/// macro, then the body in wiki markup.
///
/// ```text
/// ---
/// id = "greet"
/// visibility = "wiki"
/// inline = true
///
/// [[parameters]]
/// name = "name"
/// mandatory = true
/// ---
/// Hello **{{wikimacroparameter name="name"/}}**!
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct WikiMacroDefinition {
    pub descriptor: MacroDescriptor,
    pub visibility: WikiMacroVisibility,
    pub syntax: Syntax,
    pub body: String,
}

impl WikiMacroDefinition {
    pub fn parse(content: &str) -> Result<Self, RegistrationError> {
        let (front_matter, body) = split_front_matter(content).ok_or_else(|| {
            RegistrationError::Malformed(
                "<unknown>".to_string(),
                "missing --- front matter".to_string(),
            )
        })?;
        let front_matter: FrontMatter = toml::from_str(front_matter).map_err(|error| {
            RegistrationError::Malformed("<unknown>".to_string(), error.message().to_string())
        })?;

        let id = front_matter.id.trim().to_string();
        if id.is_empty() || id.contains(char::is_whitespace) {
            return Err(RegistrationError::Malformed(
                front_matter.id,
                "the id must be a single non-empty word".to_string(),
            ));
        }

        let mut descriptor = MacroDescriptor::new(&id, front_matter.name.unwrap_or_else(|| id.clone()))
            .description(front_matter.description)
            .content(front_matter.content)
            .inline(front_matter.inline)
            .priority(front_matter.priority);
        for parameter in front_matter.parameters {
            descriptor = descriptor.parameter(parameter_descriptor(&id, parameter)?);
        }

        Ok(WikiMacroDefinition {
            descriptor,
            visibility: front_matter.visibility,
            syntax: front_matter.syntax.unwrap_or(Syntax::XWiki21),
            body: body.to_string(),
        })
    }
}

fn parameter_descriptor(
    id: &str,
    parameter: ParameterDefinition,
) -> Result<ParameterDescriptor, RegistrationError> {
    let kind = match parameter.kind {
        ParameterKind::String => ParameterType::String,
        ParameterKind::Integer => ParameterType::Integer,
        ParameterKind::Boolean => ParameterType::Boolean,
        ParameterKind::Choice if parameter.values.is_empty() => {
            return Err(RegistrationError::Malformed(
                id.to_string(),
                format!("choice parameter [{}] has no values", parameter.name),
            ));
        }
        ParameterKind::Choice => ParameterType::Choice(parameter.values),
    };
    let mut descriptor = ParameterDescriptor::new(parameter.name)
        .description(parameter.description)
        .kind(kind);
    if parameter.mandatory {
        descriptor = descriptor.mandatory();
    }
    if let Some(default) = parameter.default {
        descriptor = descriptor.default_value(default);
    }
    Ok(descriptor)
}
