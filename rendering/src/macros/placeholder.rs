use xdom::Block;

use crate::descriptor::{ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// Stands for the content of the wiki macro call in a wiki macro body.
pub const CONTENT_PLACEHOLDER: &str = "wikimacrocontent";
/// Stands for a parameter of the wiki macro call in a wiki macro body.
pub const PARAMETER_PLACEHOLDER: &str = "wikimacroparameter";

/// Wiki macros replace these calls before their body is expanded, so any
/// call left for the engine was written outside a wiki macro.
pub struct PlaceholderMacro {
    descriptor: MacroDescriptor,
}

impl PlaceholderMacro {
    pub fn content() -> Self {
        let descriptor = MacroDescriptor::new(CONTENT_PLACEHOLDER, "Wiki Macro Content")
            .description("Inserts the content of the wiki macro call.")
            .content(ContentDescriptor::None)
            .inline(true);
        PlaceholderMacro { descriptor }
    }

    pub fn parameter() -> Self {
        let descriptor = MacroDescriptor::new(PARAMETER_PLACEHOLDER, "Wiki Macro Parameter")
            .description("Inserts a parameter of the wiki macro call.")
            .parameter(ParameterDescriptor::new("name").mandatory())
            .content(ContentDescriptor::None)
            .inline(true);
        PlaceholderMacro { descriptor }
    }
}

impl Macro for PlaceholderMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        _parameters: &MacroParameters,
        _content: Option<&str>,
        _context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        Err(MacroError::execution(format!(
            "The [{}] macro can only be used in the body of a wiki macro",
            self.descriptor.id
        )))
    }
}
