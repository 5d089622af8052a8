use xdom::{Block, Syntax};

use crate::descriptor::{ContentDescriptor, MacroDescriptor, MacroParameters};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// `html`: the content passed through as raw XHTML. Restricted frames get it
/// as escaped verbatim text instead.
pub struct HtmlMacro {
    descriptor: MacroDescriptor,
}

impl Default for HtmlMacro {
    fn default() -> Self {
        HtmlMacro::new()
    }
}

impl HtmlMacro {
    pub fn new() -> Self {
        let descriptor = MacroDescriptor::new("html", "HTML")
            .description("Inserts XHTML into the rendered page.")
            .content(ContentDescriptor::Mandatory)
            .inline(true);
        HtmlMacro { descriptor }
    }
}

impl Macro for HtmlMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        _parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let content = content.unwrap_or_default();
        if context.is_restricted() {
            return Ok(vec![Block::verbatim(content, context.is_inline())]);
        }
        Ok(vec![Block::raw(Syntax::Xhtml10, content)])
    }
}
