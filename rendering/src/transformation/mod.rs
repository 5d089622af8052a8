//! The macro transformation: expands every macro call of a tree, lowest
//! priority first, until none is left.

mod context;
pub mod placement;

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use tracing::{debug, info, trace};
use xdom::block::{META_AUTHOR, META_SOURCE, META_SYNTAX};
use xdom::{Block, BlockKind, MacroCall, Syntax, parser_for};

pub use context::MacroTransformationContext;

use crate::config::RenderingConfig;
use crate::context::{Frame, RenderingContext};
use crate::descriptor::DEFAULT_PRIORITY;
use crate::error::{MacroDiagnostic, MacroError, TransformationError};
use crate::error_block::ErrorBlockGenerator;
use crate::macros::Macro;
use crate::model::DocumentReference;
use crate::registry::MacroRegistry;
use crate::security::{AuthorizationManager, Right};

/// Bounds on one transformation, nested transformations included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransformationLimits {
    pub max_nesting_depth: usize,
    pub max_macro_executions: usize,
}

impl Default for TransformationLimits {
    fn default() -> Self {
        TransformationLimits {
            max_nesting_depth: 100,
            max_macro_executions: 1000,
        }
    }
}

impl From<&RenderingConfig> for TransformationLimits {
    fn from(config: &RenderingConfig) -> Self {
        TransformationLimits {
            max_nesting_depth: config.max_nesting_depth,
            max_macro_executions: config.max_macro_executions,
        }
    }
}

/// Shared by a transformation and every transformation nested in it.
#[derive(Debug, Default)]
pub(crate) struct TransformationState {
    executions: usize,
    diagnostics: Vec<MacroDiagnostic>,
}

/// A macro call found by a scan, with what its ancestors say about it.
#[derive(Debug, Clone)]
pub(crate) struct CallSite {
    pub(crate) path: Vec<usize>,
    pub(crate) call: MacroCall,
    /// Number of expanded macros the call sits in, plus the base depth of
    /// the transformation.
    pub(crate) depth: usize,
    /// Syntax the call's content is written in.
    pub(crate) syntax: Syntax,
    /// Documents the call comes from, outermost first.
    pub(crate) sources: Vec<DocumentReference>,
    /// Author whose rights apply to the call.
    pub(crate) author: Option<String>,
}

#[derive(Debug, Clone)]
struct Scope {
    depth: usize,
    syntax: Syntax,
    sources: Vec<DocumentReference>,
    author: Option<String>,
    wiki: String,
}

impl Scope {
    fn root(context: &RenderingContext, frame: &Frame, depth: usize) -> Scope {
        let mut sources: Vec<DocumentReference> = Vec::new();
        let documents = context
            .frames()
            .iter()
            .filter_map(|frame| frame.secure_document.as_ref());
        for document in documents {
            if sources.last() != Some(document) {
                sources.push(document.clone());
            }
        }
        Scope {
            depth,
            syntax: frame.default_syntax,
            sources,
            author: frame.secure_author.clone(),
            wiki: context.wiki().to_string(),
        }
    }

    fn enter(&self, block: &Block) -> Option<Scope> {
        match &block.kind {
            BlockKind::MacroMarker(_) => {
                let mut scope = self.clone();
                scope.depth += 1;
                Some(scope)
            }
            BlockKind::MetaData => {
                let mut scope = self.clone();
                if let Some(syntax) = block
                    .parameter(META_SYNTAX)
                    .and_then(|id| id.parse::<Syntax>().ok())
                {
                    scope.syntax = syntax;
                }
                if let Some(source) = block
                    .parameter(META_SOURCE)
                    .and_then(|source| DocumentReference::parse(source, &self.wiki))
                {
                    scope.sources.push(source);
                }
                if let Some(author) = block.parameter(META_AUTHOR) {
                    scope.author = (!author.is_empty()).then(|| author.to_string());
                }
                Some(scope)
            }
            _ => None,
        }
    }
}

/// Pre-order scan for unexpanded calls. Call content is opaque text and is
/// never searched.
fn collect_call_sites(xdom: &Block, scope: &Scope) -> Vec<CallSite> {
    fn visit(block: &Block, scope: &Scope, path: &mut Vec<usize>, sites: &mut Vec<CallSite>) {
        if let BlockKind::Macro(call) = &block.kind {
            sites.push(CallSite {
                path: path.clone(),
                call: call.clone(),
                depth: scope.depth,
                syntax: scope.syntax,
                sources: scope.sources.clone(),
                author: scope.author.clone(),
            });
            return;
        }
        let entered = scope.enter(block);
        let scope = entered.as_ref().unwrap_or(scope);
        for (index, child) in block.children.iter().enumerate() {
            path.push(index);
            visit(child, scope, path, sites);
            path.pop();
        }
    }

    let mut sites = Vec::new();
    visit(xdom, scope, &mut Vec::new(), &mut sites);
    sites
}

/// Expands macro calls using the macros of a registry.
pub struct MacroTransformation {
    registry: Arc<MacroRegistry>,
    authorization: Arc<dyn AuthorizationManager>,
    errors: ErrorBlockGenerator,
    limits: TransformationLimits,
}

impl MacroTransformation {
    /// Transformation name recorded on the frames it pushes.
    pub const NAME: &'static str = "macro";

    pub fn new(registry: Arc<MacroRegistry>, authorization: Arc<dyn AuthorizationManager>) -> Self {
        MacroTransformation {
            registry,
            authorization,
            errors: ErrorBlockGenerator::new(),
            limits: TransformationLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: TransformationLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_error_generator(mut self, errors: ErrorBlockGenerator) -> Self {
        self.errors = errors;
        self
    }

    pub fn registry(&self) -> &Arc<MacroRegistry> {
        &self.registry
    }

    pub fn authorization(&self) -> &dyn AuthorizationManager {
        self.authorization.as_ref()
    }

    pub fn limits(&self) -> TransformationLimits {
        self.limits
    }

    /// Expand every macro call in `xdom`, in place, under `frame`.
    ///
    /// Failing calls are replaced by error blocks and reported in the
    /// returned diagnostics; only problems with the setup itself are errors.
    /// The frame is popped again before returning, on every path.
    pub fn transform(
        &self,
        xdom: &mut Block,
        rendering: &mut RenderingContext,
        mut frame: Frame,
    ) -> Result<Vec<MacroDiagnostic>, TransformationError> {
        if parser_for(frame.default_syntax).is_none() {
            return Err(TransformationError::UnsupportedSyntax(frame.default_syntax));
        }
        frame
            .transformation
            .get_or_insert_with(|| Self::NAME.to_string());
        if frame.xdom.is_none() {
            frame.xdom = Some(Arc::new(xdom.clone()));
        }

        let mut rendering = rendering.push(frame);
        let mut state = TransformationState::default();
        self.run(xdom, &mut rendering, 0, &mut state)?;

        info!(
            executions = state.executions,
            failures = state.diagnostics.len(),
            "macro transformation finished"
        );
        Ok(state.diagnostics)
    }

    /// Expansion loop under the current frame. Nested transformations call
    /// this again with a deeper base depth and the same state.
    pub(crate) fn run(
        &self,
        xdom: &mut Block,
        rendering: &mut RenderingContext,
        base_depth: usize,
        state: &mut TransformationState,
    ) -> Result<(), TransformationError> {
        let frame = rendering
            .current()
            .ok_or(TransformationError::NoActiveFrame)?;
        let scope = Scope::root(rendering, frame, base_depth);

        for pass in 0.. {
            let sites = collect_call_sites(xdom, &scope);
            if sites.is_empty() {
                break;
            }

            let resolved: Vec<(CallSite, Option<Arc<dyn Macro>>)> = sites
                .into_iter()
                .map(|site| {
                    let implementation = self.registry.resolve(&site.call.id, rendering);
                    (site, implementation)
                })
                .collect();
            let Some(tier) = resolved
                .iter()
                .map(|(_, implementation)| priority(implementation.as_deref()))
                .min()
            else {
                break;
            };
            trace!(pass, tier, calls = resolved.len(), "macro transformation pass");

            let current: &Block = xdom;
            let replacements: Vec<(Vec<usize>, Block)> = resolved
                .iter()
                .filter(|(_, implementation)| priority(implementation.as_deref()) == tier)
                .map(|(site, implementation)| {
                    let marker = self.expand(site, implementation.as_deref(), current, rendering, state);
                    (site.path.clone(), marker)
                })
                .collect();

            for (path, marker) in replacements {
                if let Some(node) = xdom.node_at_mut(&path) {
                    *node = marker;
                }
            }
        }

        debug_assert!(
            xdom.check_placement().is_ok(),
            "macro transformation broke block placement"
        );
        Ok(())
    }

    /// Run one call and wrap its output, or its error blocks, in a marker.
    fn expand(
        &self,
        site: &CallSite,
        implementation: Option<&dyn Macro>,
        xdom: &Block,
        rendering: &mut RenderingContext,
        state: &mut TransformationState,
    ) -> Block {
        let result = if state.executions >= self.limits.max_macro_executions {
            Err(MacroError::TooManyExecutions(self.limits.max_macro_executions))
        } else if site.depth >= self.limits.max_nesting_depth {
            Err(MacroError::NestingTooDeep(self.limits.max_nesting_depth))
        } else {
            state.executions += 1;
            self.execute(site, implementation, xdom, rendering, state)
        };
        let result = result.and_then(|output| {
            let marker = Block::macro_marker(
                site.call.clone(),
                placement::place(output, site.call.inline),
            );
            match marker.check_placement() {
                Ok(()) => Ok(marker.children),
                Err(error) => Err(MacroError::with_source(
                    format!("The [{}] macro produced misplaced blocks", site.call.id),
                    error,
                )),
            }
        });

        let children = match result {
            Ok(children) => children,
            Err(error) => {
                debug!(
                    macro_id = %site.call.id,
                    kind = %error.kind(),
                    depth = site.depth,
                    %error,
                    "macro failed"
                );
                state.diagnostics.push(MacroDiagnostic {
                    macro_id: site.call.id.clone(),
                    kind: error.kind(),
                    message: error.to_string(),
                    depth: site.depth,
                });
                self.errors
                    .for_macro_error(rendering.is_restricted(), &error, &site.call)
            }
        };
        Block::macro_marker(site.call.clone(), children)
    }

    fn execute(
        &self,
        site: &CallSite,
        implementation: Option<&dyn Macro>,
        xdom: &Block,
        rendering: &mut RenderingContext,
        state: &mut TransformationState,
    ) -> Result<Vec<Block>, MacroError> {
        let implementation =
            implementation.ok_or_else(|| MacroError::UnknownMacro(site.call.id.clone()))?;
        let descriptor = implementation.descriptor();
        if site.call.inline && !descriptor.supports_inline {
            return Err(MacroError::InlineNotSupported(site.call.id.clone()));
        }
        self.check_rights(descriptor.required_right, site, rendering)?;
        let parameters = descriptor.prepare_parameters(&site.call)?;
        let content = site.call.content.as_deref();
        descriptor.check_content(content)?;

        trace!(macro_id = %site.call.id, depth = site.depth, "executing macro");
        let mut context = MacroTransformationContext {
            transformation: self,
            rendering,
            state,
            xdom,
            site,
        };
        panic::catch_unwind(AssertUnwindSafe(|| {
            implementation.execute(&parameters, content, &mut context)
        }))
        .unwrap_or_else(|payload| Err(MacroError::Panicked(panic_message(payload.as_ref()))))
    }

    fn check_rights(
        &self,
        required: Option<Right>,
        site: &CallSite,
        rendering: &RenderingContext,
    ) -> Result<(), MacroError> {
        let Some(right) = required else {
            return Ok(());
        };
        let restricted = rendering.is_restricted() && right >= Right::Script;
        let granted = !restricted
            && self
                .authorization
                .has_access(right, site.author.as_deref(), site.sources.last());
        if granted {
            Ok(())
        } else {
            Err(MacroError::NotAllowed(site.call.id.clone()))
        }
    }
}

fn priority(implementation: Option<&dyn Macro>) -> i32 {
    implementation.map_or(DEFAULT_PRIORITY, |implementation| {
        implementation.descriptor().priority
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
