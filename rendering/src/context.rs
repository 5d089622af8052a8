use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use xdom::{Block, Syntax};

use crate::model::{DEFAULT_WIKI, DocumentReference};

/// State of one (possibly nested) rendering: which transformation runs, on
/// which tree, in which syntax, with which rights.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name of the running transformation (e.g. `macro`).
    pub transformation: Option<String>,
    /// Identifies the rendering for caches and unique ids.
    pub transformation_id: Option<String>,
    /// The tree being transformed, as it was when the frame was pushed.
    pub xdom: Option<Arc<Block>>,
    pub default_syntax: Syntax,
    pub target_syntax: Option<Syntax>,
    pub restricted: bool,
    /// Document whose rights apply to the content being rendered.
    pub secure_document: Option<DocumentReference>,
    /// Author whose rights apply to the content being rendered.
    pub secure_author: Option<String>,
}

impl Frame {
    pub fn new(default_syntax: Syntax) -> Self {
        Frame {
            transformation: None,
            transformation_id: None,
            xdom: None,
            default_syntax,
            target_syntax: None,
            restricted: false,
            secure_document: None,
            secure_author: None,
        }
    }

    pub fn transformation_id(mut self, id: impl Into<String>) -> Self {
        self.transformation_id = Some(id.into());
        self
    }

    pub fn xdom(mut self, xdom: Arc<Block>) -> Self {
        self.xdom = Some(xdom);
        self
    }

    pub fn target_syntax(mut self, syntax: Syntax) -> Self {
        self.target_syntax = Some(syntax);
        self
    }

    pub fn restricted(mut self, restricted: bool) -> Self {
        self.restricted = restricted;
        self
    }

    pub fn secure(mut self, document: Option<DocumentReference>, author: Option<String>) -> Self {
        self.secure_document = document;
        self.secure_author = author;
        self
    }

    /// A frame for content nested in `self`, keeping its target syntax,
    /// restriction and security settings.
    pub fn nested(&self, default_syntax: Syntax) -> Frame {
        Frame {
            transformation: self.transformation.clone(),
            transformation_id: self.transformation_id.clone(),
            xdom: None,
            default_syntax,
            target_syntax: self.target_syntax,
            restricted: self.restricted,
            secure_document: self.secure_document.clone(),
            secure_author: self.secure_author.clone(),
        }
    }
}

/// Stack of rendering frames for one call chain, plus the request-wide user
/// and wiki. Never shared between concurrent renderings.
#[derive(Debug)]
pub struct RenderingContext {
    frames: Vec<Frame>,
    user: Option<String>,
    wiki: String,
}

impl Default for RenderingContext {
    fn default() -> Self {
        RenderingContext::new(None, DEFAULT_WIKI)
    }
}

impl RenderingContext {
    pub fn new(user: Option<String>, wiki: impl Into<String>) -> Self {
        RenderingContext {
            frames: Vec::new(),
            user,
            wiki: wiki.into(),
        }
    }

    /// Push a frame; it is popped when the returned guard is dropped, even
    /// while unwinding. A frame pushed under a restricted one is restricted.
    pub fn push(&mut self, mut frame: Frame) -> FrameGuard<'_> {
        if self.is_restricted() {
            frame.restricted = true;
        }
        self.frames.push(frame);
        let depth = self.frames.len();
        FrameGuard {
            context: self,
            depth,
        }
    }

    /// Pop the current frame.
    ///
    /// # Panics
    ///
    /// When no frame is pushed.
    pub fn pop(&mut self) -> Frame {
        match self.frames.pop() {
            Some(frame) => frame,
            None => panic!("RenderingContext::pop called without a matching push"),
        }
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn wiki(&self) -> &str {
        &self.wiki
    }

    pub fn transformation_id(&self) -> Option<&str> {
        self.current()?.transformation_id.as_deref()
    }

    pub fn xdom(&self) -> Option<&Arc<Block>> {
        self.current()?.xdom.as_ref()
    }

    pub fn default_syntax(&self) -> Option<Syntax> {
        self.current().map(|frame| frame.default_syntax)
    }

    pub fn target_syntax(&self) -> Option<Syntax> {
        self.current()?.target_syntax
    }

    pub fn is_restricted(&self) -> bool {
        self.current().is_some_and(|frame| frame.restricted)
    }

    pub fn secure_document(&self) -> Option<&DocumentReference> {
        self.current()?.secure_document.as_ref()
    }

    pub fn secure_author(&self) -> Option<&str> {
        self.current()?.secure_author.as_deref()
    }
}

/// Keeps a frame pushed for its lifetime.
pub struct FrameGuard<'a> {
    context: &'a mut RenderingContext,
    depth: usize,
}

impl Deref for FrameGuard<'_> {
    type Target = RenderingContext;

    fn deref(&self) -> &RenderingContext {
        self.context
    }
}

impl DerefMut for FrameGuard<'_> {
    fn deref_mut(&mut self) -> &mut RenderingContext {
        self.context
    }
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        debug_assert_eq!(
            self.context.depth(),
            self.depth,
            "rendering frames popped out of order"
        );
        self.context.pop();
    }
}
