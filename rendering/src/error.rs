use std::error::Error as StdError;
use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use xdom::{ParseError, Syntax};

/// Why a single macro call could not produce its output. Every variant is
/// local to the call: the engine turns it into error blocks and carries on.
#[derive(Debug, Error)]
pub enum MacroError {
    #[error("Unknown macro: {0}")]
    UnknownMacro(String),

    #[error("The required parameter [{parameter}] is missing")]
    ParameterMissing { parameter: String },

    #[error("Invalid value [{value}] for parameter [{parameter}], expected {expected}")]
    InvalidParameter {
        parameter: String,
        value: String,
        expected: String,
    },

    #[error("The required content is missing")]
    ContentMissing,

    #[error("The [{0}] macro is a standalone macro and it cannot be used inline")]
    InlineNotSupported(String),

    #[error(
        "The execution of the [{0}] macro is not allowed. Check the rights of its last author or the parameters if it's rendered from another script."
    )]
    NotAllowed(String),

    #[error("Maximum macro nesting depth of [{0}] exceeded")]
    NestingTooDeep(usize),

    #[error("Maximum number of macro executions [{0}] exceeded")]
    TooManyExecutions(usize),

    #[error("{message}")]
    Execution {
        message: String,
        #[source]
        source: Option<Box<dyn StdError + Send + Sync>>,
    },

    #[error("The macro panicked: {0}")]
    Panicked(String),
}

impl MacroError {
    pub fn execution(message: impl Into<String>) -> Self {
        MacroError::Execution {
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        message: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        MacroError::Execution {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    pub fn kind(&self) -> MacroErrorKind {
        match self {
            MacroError::UnknownMacro(_) => MacroErrorKind::UnknownMacro,
            MacroError::ParameterMissing { .. } => MacroErrorKind::ParameterMissing,
            MacroError::InvalidParameter { .. } => MacroErrorKind::InvalidParameter,
            MacroError::ContentMissing => MacroErrorKind::ContentMissing,
            MacroError::InlineNotSupported(_) => MacroErrorKind::InlineNotSupported,
            MacroError::NotAllowed(_) => MacroErrorKind::NotAllowed,
            MacroError::NestingTooDeep(_) | MacroError::TooManyExecutions(_) => {
                MacroErrorKind::RecursionLimit
            }
            MacroError::Execution { .. } | MacroError::Panicked(_) => MacroErrorKind::Execution,
        }
    }
}

impl From<Vec<ParseError>> for MacroError {
    fn from(errors: Vec<ParseError>) -> Self {
        let message = errors
            .iter()
            .map(|error| error.message.as_str())
            .collect::<Vec<_>>()
            .join("; ");
        MacroError::execution(format!("Failed to parse content: {}", message))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MacroErrorKind {
    UnknownMacro,
    ParameterMissing,
    InvalidParameter,
    ContentMissing,
    InlineNotSupported,
    NotAllowed,
    RecursionLimit,
    Execution,
}

impl MacroErrorKind {
    pub const ALL: [MacroErrorKind; 8] = [
        MacroErrorKind::UnknownMacro,
        MacroErrorKind::ParameterMissing,
        MacroErrorKind::InvalidParameter,
        MacroErrorKind::ContentMissing,
        MacroErrorKind::InlineNotSupported,
        MacroErrorKind::NotAllowed,
        MacroErrorKind::RecursionLimit,
        MacroErrorKind::Execution,
    ];

    pub fn name(self) -> &'static str {
        match self {
            MacroErrorKind::UnknownMacro => "unknown-macro",
            MacroErrorKind::ParameterMissing => "parameter-missing",
            MacroErrorKind::InvalidParameter => "invalid-parameter",
            MacroErrorKind::ContentMissing => "content-missing",
            MacroErrorKind::InlineNotSupported => "inline-not-supported",
            MacroErrorKind::NotAllowed => "not-allowed",
            MacroErrorKind::RecursionLimit => "recursion-limit",
            MacroErrorKind::Execution => "execution",
        }
    }
}

impl fmt::Display for MacroErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for MacroErrorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MacroErrorKind::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| format!("unknown macro error kind '{}'", s))
    }
}

/// A macro failure recorded during a transformation, returned next to the
/// transformed tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDiagnostic {
    pub macro_id: String,
    pub kind: MacroErrorKind,
    pub message: String,
    /// Nesting depth of the failed call (0 for calls written in the source).
    pub depth: usize,
}

impl fmt::Display for MacroDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] macro {}: {}", self.macro_id, self.kind, self.message)
    }
}

/// Failures that stop a whole transformation, as opposed to one macro.
#[derive(Debug, Error)]
pub enum TransformationError {
    #[error("no parser available for syntax {0}")]
    UnsupportedSyntax(Syntax),

    #[error("no rendering context frame is active")]
    NoActiveFrame,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("user [{user}] is not allowed to register a macro with {visibility} visibility")]
    NotAuthorized { user: String, visibility: String },

    #[error("macro [{0}] is malformed: {1}")]
    Malformed(String, String),
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to parse the document")]
    Parse(Vec<ParseError>),

    #[error("no parser available for syntax {0}")]
    NoParser(Syntax),

    #[error("no renderer available for syntax {0}")]
    NoRenderer(Syntax),

    #[error(transparent)]
    Transformation(#[from] TransformationError),

    #[error("failed to write output: {0}")]
    Io(#[from] std::io::Error),
}
