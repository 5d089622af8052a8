#![allow(dead_code)]

use std::sync::Arc;

use rendering::{
    AllowAll, AuthorizationManager, ContentDescriptor, Frame, MacroDescriptor, MacroDiagnostic,
    MacroError, MacroParameters, MacroRegistry, MacroTransformation, MacroTransformationContext,
    MemoryStore, RenderingContext, Visibility, register_builtin_macros,
};
use xdom::renderer::{EventRenderer, HtmlRenderer};
use xdom::{Block, Parser, Syntax, render_to_string};

type Body = dyn Fn(&MacroParameters, Option<&str>, &mut MacroTransformationContext<'_>) -> Result<Vec<Block>, MacroError>
    + Send
    + Sync;

/// A macro whose behavior is a closure.
pub struct FnMacro {
    descriptor: MacroDescriptor,
    body: Box<Body>,
}

impl FnMacro {
    pub fn new(
        descriptor: MacroDescriptor,
        body: impl Fn(&MacroParameters, Option<&str>, &mut MacroTransformationContext<'_>) -> Result<Vec<Block>, MacroError>
        + Send
        + Sync
        + 'static,
    ) -> Arc<Self> {
        Arc::new(FnMacro {
            descriptor,
            body: Box::new(body),
        })
    }

    /// A macro returning the given words as a paragraph.
    pub fn words(id: &str, text: &str) -> Arc<Self> {
        let text = text.to_string();
        FnMacro::new(
            MacroDescriptor::new(id, id)
                .inline(true)
                .content(ContentDescriptor::None),
            move |_, _, _| Ok(vec![Block::paragraph(xdom::block::text::split_text(&text))]),
        )
    }

    /// A macro whose output is its content, parsed as wiki markup.
    pub fn wiki(id: &str) -> Arc<Self> {
        FnMacro::new(MacroDescriptor::new(id, id).inline(true), |_, content, context| {
            context.parse_content(content.unwrap_or_default())
        })
    }
}

impl rendering::Macro for FnMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        (self.body)(parameters, content, context)
    }
}

pub fn parse(source: &str) -> Block {
    match xdom::parser::XWikiParser.parse(source, 0) {
        Ok(xdom) => xdom,
        Err(errors) => panic!("parse errors: {:?}", errors),
    }
}

pub fn html(xdom: &Block) -> String {
    render_to_string(&HtmlRenderer, xdom)
}

pub fn events(xdom: &Block) -> String {
    render_to_string(&EventRenderer, xdom)
}

pub fn registry(macros: Vec<Arc<FnMacro>>) -> Arc<MacroRegistry> {
    let registry = Arc::new(MacroRegistry::new());
    for implementation in macros {
        let id = rendering::Macro::descriptor(implementation.as_ref()).id.clone();
        registry.register(id, implementation, Visibility::Global);
    }
    registry
}

pub fn registry_with_builtins(store: Arc<MemoryStore>) -> Arc<MacroRegistry> {
    let registry = Arc::new(MacroRegistry::new());
    register_builtin_macros(&registry, store);
    registry
}

pub fn transformation(registry: Arc<MacroRegistry>) -> MacroTransformation {
    MacroTransformation::new(registry, Arc::new(AllowAll))
}

pub fn transformation_with(
    registry: Arc<MacroRegistry>,
    authorization: Arc<dyn AuthorizationManager>,
) -> MacroTransformation {
    MacroTransformation::new(registry, authorization)
}

/// Parse and transform `source` as xwiki/2.1 with a fresh context.
pub fn transform(transformation: &MacroTransformation, source: &str) -> (Block, Vec<MacroDiagnostic>) {
    transform_with(transformation, source, Frame::new(Syntax::XWiki21))
}

pub fn transform_with(
    transformation: &MacroTransformation,
    source: &str,
    frame: Frame,
) -> (Block, Vec<MacroDiagnostic>) {
    let mut xdom = parse(source);
    let mut context = RenderingContext::default();
    let diagnostics = transformation
        .transform(&mut xdom, &mut context, frame)
        .unwrap();
    assert_eq!(context.depth(), 0);
    (xdom, diagnostics)
}
