//! Macro transformation and rendering of wiki documents.
//!
//! A document is parsed into a block tree (see the `xdom` crate), its macro
//! calls are expanded by [`MacroTransformation`] using the macros of a
//! [`MacroRegistry`], and the result is written by a renderer.

pub mod config;
pub mod context;
pub mod descriptor;
pub mod error;
pub mod error_block;
pub mod macros;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod security;
pub mod store;
pub mod transformation;
pub mod wikimacro;

pub use config::{ConfigError, RenderingConfig};
pub use context::{Frame, FrameGuard, RenderingContext};
pub use descriptor::{
    ContentDescriptor, DEFAULT_PRIORITY, MacroDescriptor, MacroParameters, ParameterDescriptor,
    ParameterType,
};
pub use error::{
    MacroDiagnostic, MacroError, MacroErrorKind, PipelineError, RegistrationError,
    TransformationError,
};
pub use error_block::{ErrorBlockGenerator, ErrorMessage, MessageResolver};
pub use macros::{Macro, builtin_macros, register_builtin_macros};
pub use model::DocumentReference;
pub use pipeline::RenderingPipeline;
pub use registry::{MacroRegistry, Visibility};
pub use security::{AllowAll, AuthorizationManager, Right, RightsTable};
pub use store::{DirectoryStore, DocumentStore, MemoryStore, StoredDocument};
pub use transformation::{MacroTransformation, MacroTransformationContext, TransformationLimits};
pub use wikimacro::{WikiMacro, WikiMacroManager, WikiMacroState};
