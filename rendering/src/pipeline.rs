use std::io::Write;

use tracing::debug;
use xdom::{Block, Syntax, parser_for, renderer_for};

use crate::context::{Frame, RenderingContext};
use crate::error::{MacroDiagnostic, PipelineError};
use crate::transformation::MacroTransformation;

/// Parse, transform and render a document.
pub struct RenderingPipeline {
    transformation: MacroTransformation,
}

impl RenderingPipeline {
    pub fn new(transformation: MacroTransformation) -> Self {
        RenderingPipeline { transformation }
    }

    pub fn transformation(&self) -> &MacroTransformation {
        &self.transformation
    }

    /// Parse `source` as `input` and expand its macros under `frame`.
    pub fn transform(
        &self,
        source: &str,
        file_id: usize,
        input: Syntax,
        rendering: &mut RenderingContext,
        frame: Frame,
    ) -> Result<(Block, Vec<MacroDiagnostic>), PipelineError> {
        let parser = parser_for(input).ok_or(PipelineError::NoParser(input))?;
        let mut xdom = parser.parse(source, file_id).map_err(PipelineError::Parse)?;
        let diagnostics = self.transformation.transform(&mut xdom, rendering, frame)?;
        Ok((xdom, diagnostics))
    }

    /// Render `source` from `input` to `output`. Macro failures do not stop
    /// the rendering; they show as error blocks in the output and are
    /// returned as diagnostics.
    #[allow(clippy::too_many_arguments)]
    pub fn render(
        &self,
        source: &str,
        file_id: usize,
        input: Syntax,
        output: Syntax,
        rendering: &mut RenderingContext,
        frame: Frame,
        out: &mut dyn Write,
    ) -> Result<Vec<MacroDiagnostic>, PipelineError> {
        let renderer = renderer_for(output).ok_or(PipelineError::NoRenderer(output))?;
        let frame = frame.target_syntax(output);
        let (xdom, diagnostics) = self.transform(source, file_id, input, rendering, frame)?;
        debug!(%input, %output, failures = diagnostics.len(), "rendering document");
        renderer.render(&xdom, out)?;
        Ok(diagnostics)
    }
}
