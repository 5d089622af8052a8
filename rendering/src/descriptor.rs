use std::collections::BTreeMap;

use serde::Deserialize;
use xdom::MacroCall;

use crate::error::MacroError;
use crate::security::Right;

/// Priority of macros that don't declare one. Lower priorities run first.
pub const DEFAULT_PRIORITY: i32 = 1000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParameterType {
    String,
    Integer,
    Boolean,
    /// One of a fixed set of values, compared case-insensitively.
    Choice(Vec<String>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    pub kind: ParameterType,
    pub mandatory: bool,
    pub default: Option<String>,
}

impl ParameterDescriptor {
    pub fn new(name: impl Into<String>) -> Self {
        ParameterDescriptor {
            name: name.into(),
            description: String::new(),
            kind: ParameterType::String,
            mandatory: false,
            default: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn kind(mut self, kind: ParameterType) -> Self {
        self.kind = kind;
        self
    }

    pub fn mandatory(mut self) -> Self {
        self.mandatory = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.default = Some(value.into());
        self
    }

    fn check(&self, value: &str) -> Result<(), MacroError> {
        let valid = match &self.kind {
            ParameterType::String => true,
            ParameterType::Integer => value.trim().parse::<i64>().is_ok(),
            ParameterType::Boolean => parse_bool(value).is_some(),
            ParameterType::Choice(choices) => {
                choices.iter().any(|choice| choice.eq_ignore_ascii_case(value.trim()))
            }
        };
        if valid {
            return Ok(());
        }
        let expected = match &self.kind {
            ParameterType::String => "a string".to_string(),
            ParameterType::Integer => "an integer".to_string(),
            ParameterType::Boolean => "true or false".to_string(),
            ParameterType::Choice(choices) => format!("one of {}", choices.join(", ")),
        };
        Err(MacroError::InvalidParameter {
            parameter: self.name.clone(),
            value: value.to_string(),
            expected,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentDescriptor {
    None,
    Optional,
    Mandatory,
}

/// What a macro declares about itself. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDescriptor {
    pub id: String,
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    pub content: ContentDescriptor,
    pub supports_inline: bool,
    pub priority: i32,
    /// Right the executing author must hold.
    pub required_right: Option<Right>,
}

impl MacroDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        MacroDescriptor {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            parameters: Vec::new(),
            content: ContentDescriptor::Optional,
            supports_inline: false,
            priority: DEFAULT_PRIORITY,
            required_right: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn parameter(mut self, parameter: ParameterDescriptor) -> Self {
        self.parameters.push(parameter);
        self
    }

    pub fn content(mut self, content: ContentDescriptor) -> Self {
        self.content = content;
        self
    }

    pub fn inline(mut self, supports_inline: bool) -> Self {
        self.supports_inline = supports_inline;
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn requires(mut self, right: Right) -> Self {
        self.required_right = Some(right);
        self
    }

    /// Validate the call's parameters against the declared ones and fill in
    /// defaults. Undeclared parameters are passed through untouched.
    pub fn prepare_parameters(&self, call: &MacroCall) -> Result<MacroParameters, MacroError> {
        let mut values: BTreeMap<String, String> = call
            .parameters
            .iter()
            .map(|(name, value)| (name.to_ascii_lowercase(), value.clone()))
            .collect();

        for parameter in &self.parameters {
            let key = parameter.name.to_ascii_lowercase();
            match values.get(&key) {
                Some(value) => parameter.check(value)?,
                None => match &parameter.default {
                    Some(default) => {
                        values.insert(key, default.clone());
                    }
                    None if parameter.mandatory => {
                        return Err(MacroError::ParameterMissing {
                            parameter: parameter.name.clone(),
                        });
                    }
                    None => {}
                },
            }
        }
        Ok(MacroParameters { values })
    }

    pub fn check_content(&self, content: Option<&str>) -> Result<(), MacroError> {
        let missing = content.is_none_or(|content| content.trim().is_empty());
        if self.content == ContentDescriptor::Mandatory && missing {
            return Err(MacroError::ContentMissing);
        }
        Ok(())
    }
}

/// Validated parameters handed to a macro. Names are case-insensitive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MacroParameters {
    values: BTreeMap<String, String>,
}

impl MacroParameters {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(parse_bool)
    }

    pub fn get_usize(&self, name: &str) -> Option<usize> {
        self.get(name).and_then(|value| value.trim().parse().ok())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.values
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.values.clone()
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Some(true),
        "false" | "no" | "0" => Some(false),
        _ => None,
    }
}
