use xdom::block::text::split_text;
use xdom::{Block, Format};

use crate::descriptor::{
    ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor,
};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// `box`: the content in a bordered box, with an optional title.
pub struct BoxMacro {
    descriptor: MacroDescriptor,
}

impl Default for BoxMacro {
    fn default() -> Self {
        BoxMacro::new()
    }
}

impl BoxMacro {
    pub fn new() -> Self {
        let descriptor = MacroDescriptor::new("box", "Box")
            .description("Draws a box around the content.")
            .parameter(ParameterDescriptor::new("cssClass").description("Extra CSS classes."))
            .parameter(ParameterDescriptor::new("title"))
            .content(ContentDescriptor::Optional)
            .inline(true);
        BoxMacro { descriptor }
    }
}

impl Macro for BoxMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let class = match parameters.get("cssClass") {
            Some(extra) if !extra.trim().is_empty() => format!("box {}", extra.trim()),
            _ => "box".to_string(),
        };
        let mut children = match content {
            Some(content) => context.parse_content(content)?,
            None => Vec::new(),
        };
        let title = parameters.get("title").map(split_text);

        let block = if context.is_inline() {
            if let Some(title) = title {
                children.insert(0, Block::format(Format::Bold, title));
                children.insert(1, Block::space());
            }
            Block::format(Format::None, children)
        } else {
            if let Some(title) = title {
                let title = Block::group(vec![Block::paragraph(title)])
                    .with_parameter("class", "box-title");
                children.insert(0, title);
            }
            Block::group(children)
        };
        Ok(vec![block.with_parameter("class", class)])
    }
}
