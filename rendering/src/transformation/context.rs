use std::sync::Arc;

use xdom::{Block, BlockKind, MacroCall, Syntax, parser_for};

use crate::context::{Frame, RenderingContext};
use crate::error::MacroError;
use crate::model::DocumentReference;
use crate::registry::MacroRegistry;
use crate::security::AuthorizationManager;
use crate::transformation::{CallSite, MacroTransformation, TransformationState};

/// What a macro sees of the transformation running it.
pub struct MacroTransformationContext<'a> {
    pub(crate) transformation: &'a MacroTransformation,
    pub(crate) rendering: &'a mut RenderingContext,
    pub(crate) state: &'a mut TransformationState,
    pub(crate) xdom: &'a Block,
    pub(crate) site: &'a CallSite,
}

impl MacroTransformationContext<'_> {
    pub fn call(&self) -> &MacroCall {
        &self.site.call
    }

    pub fn is_inline(&self) -> bool {
        self.site.call.inline
    }

    /// The tree being transformed, as it was at the start of the current
    /// pass.
    pub fn xdom(&self) -> &Block {
        self.xdom
    }

    /// Syntax of the call's content: the syntax of the document (or wiki
    /// macro) the call was written in.
    pub fn syntax(&self) -> Syntax {
        self.site.syntax
    }

    pub fn depth(&self) -> usize {
        self.site.depth
    }

    /// Documents the call was pulled in from, outermost first.
    pub fn sources(&self) -> &[DocumentReference] {
        &self.site.sources
    }

    /// Author whose rights apply to the call.
    pub fn author(&self) -> Option<&str> {
        self.site.author.as_deref()
    }

    pub fn rendering(&self) -> &RenderingContext {
        self.rendering
    }

    pub fn is_restricted(&self) -> bool {
        self.rendering.is_restricted()
    }

    pub fn authorization(&self) -> &dyn AuthorizationManager {
        self.transformation.authorization()
    }

    pub fn registry(&self) -> &Arc<MacroRegistry> {
        self.transformation.registry()
    }

    /// Parse wiki content in the call's syntax and return the top-level
    /// blocks. Inline calls get the content of a single top-level paragraph.
    pub fn parse_content(&self, content: &str) -> Result<Vec<Block>, MacroError> {
        let blocks = self.parse_content_as(content, self.syntax())?;
        match <[Block; 1]>::try_from(blocks) {
            Ok([paragraph]) if self.is_inline() && paragraph.kind == BlockKind::Paragraph => {
                Ok(paragraph.children)
            }
            Ok([block]) => Ok(vec![block]),
            Err(blocks) => Ok(blocks),
        }
    }

    pub fn parse_content_as(&self, content: &str, syntax: Syntax) -> Result<Vec<Block>, MacroError> {
        let parser = parser_for(syntax).ok_or_else(|| {
            MacroError::execution(format!("No parser available for syntax [{}]", syntax))
        })?;
        Ok(parser.parse(content, 0)?.children)
    }

    /// Transform `xdom` under `frame` one level deeper than the current call,
    /// sharing this transformation's execution budget and diagnostics. The
    /// frame is popped again before returning.
    pub fn transform_nested(&mut self, xdom: &mut Block, mut frame: Frame) -> Result<(), MacroError> {
        if frame.xdom.is_none() {
            frame.xdom = Some(Arc::new(xdom.clone()));
        }
        let transformation = self.transformation;
        let depth = self.site.depth + 1;
        let mut rendering = self.rendering.push(frame);
        transformation
            .run(xdom, &mut rendering, depth, self.state)
            .map_err(|error| MacroError::with_source("Failed to transform nested content", error))
    }
}
