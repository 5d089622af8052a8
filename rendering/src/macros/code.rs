use xdom::{Block, Format};

use crate::descriptor::{
    ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor,
};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// `code`: the content as preformatted text.
pub struct CodeMacro {
    descriptor: MacroDescriptor,
}

impl Default for CodeMacro {
    fn default() -> Self {
        CodeMacro::new()
    }
}

impl CodeMacro {
    pub fn new() -> Self {
        let descriptor = MacroDescriptor::new("code", "Code")
            .description("Shows a code snippet verbatim.")
            .parameter(ParameterDescriptor::new("language").description("Language of the snippet."))
            .content(ContentDescriptor::Mandatory)
            .inline(true);
        CodeMacro { descriptor }
    }
}

impl Macro for CodeMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let content = content.unwrap_or_default();
        let inline = context.is_inline();
        let verbatim = Block::verbatim(content, inline);
        let mut block = if inline {
            Block::format(Format::Monospace, vec![verbatim])
        } else {
            Block::group(vec![verbatim])
        }
        .with_parameter("class", "code");
        if let Some(language) = parameters.get("language") {
            block = block.with_parameter("data-language", language);
        }
        Ok(vec![block])
    }
}
