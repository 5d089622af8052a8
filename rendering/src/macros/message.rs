use xdom::block::text::split_text;
use xdom::{Block, Format};

use crate::descriptor::{
    ContentDescriptor, MacroDescriptor, MacroParameters, ParameterDescriptor,
};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// `info`, `warning`, `error` and `success`: the content in a styled box.
pub struct MessageMacro {
    descriptor: MacroDescriptor,
    class: &'static str,
}

impl MessageMacro {
    fn new(id: &str, name: &str, class: &'static str) -> Self {
        let descriptor = MacroDescriptor::new(id, name)
            .description(format!("Displays the content in a {} message box.", id))
            .parameter(ParameterDescriptor::new("title").description("Title shown above the message."))
            .content(ContentDescriptor::Mandatory)
            .inline(true);
        MessageMacro { descriptor, class }
    }

    pub fn info() -> Self {
        MessageMacro::new("info", "Info Message", "box infomessage")
    }

    pub fn warning() -> Self {
        MessageMacro::new("warning", "Warning Message", "box warningmessage")
    }

    pub fn error() -> Self {
        MessageMacro::new("error", "Error Message", "box errormessage")
    }

    pub fn success() -> Self {
        MessageMacro::new("success", "Success Message", "box successmessage")
    }
}

impl Macro for MessageMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let mut children = context.parse_content(content.unwrap_or_default())?;
        let block = if context.is_inline() {
            Block::format(Format::None, children)
        } else {
            if let Some(title) = parameters.get("title") {
                let title = Block::format(Format::Bold, split_text(title));
                children.insert(0, Block::paragraph(vec![title]));
            }
            Block::group(children)
        };
        Ok(vec![block.with_parameter("class", self.class)])
    }
}
