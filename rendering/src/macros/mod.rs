//! The `Macro` trait and the macros shipped with the rendering core.

mod code;
mod container;
mod html;
mod include;
mod message;
mod placeholder;
pub mod script;
mod toc;

use std::sync::Arc;

use xdom::Block;

pub use code::CodeMacro;
pub use container::BoxMacro;
pub use html::HtmlMacro;
pub use include::IncludeMacro;
pub use message::MessageMacro;
pub use placeholder::{CONTENT_PLACEHOLDER, PARAMETER_PLACEHOLDER, PlaceholderMacro};
pub use script::{ScriptEvaluator, ScriptMacro, TemplateEvaluator};
pub use toc::TocMacro;

use crate::descriptor::{MacroDescriptor, MacroParameters};
use crate::error::MacroError;
use crate::registry::{MacroRegistry, Visibility};
use crate::security::Right;
use crate::store::DocumentStore;
use crate::transformation::MacroTransformationContext;

/// A macro implementation. Implementations are shared between concurrent
/// renderings and keep no per-call state.
pub trait Macro: Send + Sync {
    fn descriptor(&self) -> &MacroDescriptor;

    /// Produce the blocks replacing the call. Parameters are already
    /// validated against the descriptor and mandatory content is present.
    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError>;
}

/// Every built-in macro. `include` reads documents from `store`.
pub fn builtin_macros(store: Arc<dyn DocumentStore>) -> Vec<Arc<dyn Macro>> {
    vec![
        Arc::new(MessageMacro::info()),
        Arc::new(MessageMacro::warning()),
        Arc::new(MessageMacro::error()),
        Arc::new(MessageMacro::success()),
        Arc::new(BoxMacro::new()),
        Arc::new(CodeMacro::new()),
        Arc::new(HtmlMacro::new()),
        Arc::new(TocMacro::new()),
        Arc::new(IncludeMacro::new(store)),
        Arc::new(ScriptMacro::new(
            "template",
            Arc::new(TemplateEvaluator),
            Right::Script,
        )),
        Arc::new(PlaceholderMacro::content()),
        Arc::new(PlaceholderMacro::parameter()),
    ]
}

/// Register the built-in macros with global visibility.
pub fn register_builtin_macros(registry: &MacroRegistry, store: Arc<dyn DocumentStore>) {
    for implementation in builtin_macros(store) {
        let id = implementation.descriptor().id.clone();
        registry.register(id, implementation, Visibility::Global);
    }
}
