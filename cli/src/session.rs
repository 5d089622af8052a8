use std::path::{Path, PathBuf};
use std::sync::Arc;

use rendering::{
    AllowAll, AuthorizationManager, DocumentReference, DocumentStore, Frame, MacroRegistry,
    MacroTransformation, RenderingConfig, RenderingContext, RenderingPipeline, TransformationLimits,
    WikiMacroManager, WikiMacroState, register_builtin_macros,
};
use tracing::{debug, warn};
use xdom::Syntax;

/// Everything needed to render documents: the registry with the built-in
/// macros, the wiki macro manager and a pipeline over both.
pub struct Session {
    pub config: RenderingConfig,
    pub registry: Arc<MacroRegistry>,
    pub manager: WikiMacroManager,
    pub pipeline: RenderingPipeline,
}

impl Session {
    pub fn new(config: RenderingConfig, store: Arc<dyn DocumentStore>) -> Self {
        let registry = Arc::new(MacroRegistry::new());
        register_builtin_macros(&registry, store);

        // Without a [users] table nobody would hold any right, which makes
        // every script macro fail; treat that as a trusted local setup.
        let authorization: Arc<dyn AuthorizationManager> = if config.users.is_empty() {
            Arc::new(AllowAll)
        } else {
            Arc::new(config.rights_table())
        };

        let manager = WikiMacroManager::new(registry.clone(), authorization.clone());
        let transformation = MacroTransformation::new(registry.clone(), authorization)
            .with_limits(TransformationLimits::from(&config));
        Session {
            config,
            registry,
            manager,
            pipeline: RenderingPipeline::new(transformation),
        }
    }

    /// Register the wiki macros defined by the files of `dir`, laid out as
    /// `<Space>/<Page>.<ext>`. Returns the state of every file looked at.
    pub fn load_macros(&self, dir: &Path) -> Vec<(DocumentReference, WikiMacroState)> {
        let mut states = Vec::new();
        for (reference, path) in wiki_files(dir, &self.config.wiki) {
            let content = match std::fs::read_to_string(&path) {
                Ok(content) => content,
                Err(error) => {
                    warn!(path = %path.display(), %error, "cannot read macro definition");
                    continue;
                }
            };
            let author = self.config.default_author.as_deref();
            let state = self.manager.on_document_saved(&reference, author, &content);
            debug!(%reference, ?state, "loaded macro definition");
            states.push((reference, state));
        }
        states
    }

    pub fn context(&self, user: Option<String>) -> RenderingContext {
        RenderingContext::new(user, self.config.wiki.clone())
    }

    /// Frame for rendering `document` on behalf of `author`.
    pub fn frame(
        &self,
        syntax: Syntax,
        document: Option<DocumentReference>,
        author: Option<String>,
        restricted: bool,
    ) -> Frame {
        Frame::new(syntax)
            .restricted(restricted || self.config.restricted)
            .secure(document, author)
    }
}

/// Files of a `<Space>/<Page>.<ext>` tree with a known syntax extension,
/// sorted by reference.
fn wiki_files(dir: &Path, wiki: &str) -> Vec<(DocumentReference, PathBuf)> {
    let mut files = Vec::new();
    let Ok(spaces) = std::fs::read_dir(dir) else {
        warn!(path = %dir.display(), "cannot read directory");
        return files;
    };
    for space in spaces.flatten() {
        let space_path = space.path();
        if !space_path.is_dir() {
            continue;
        }
        let Some(space_name) = space_path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let Ok(pages) = std::fs::read_dir(&space_path) else {
            continue;
        };
        for page in pages.flatten() {
            let path = page.path();
            let known = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(Syntax::from_extension)
                .is_some();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if known && path.is_file() {
                files.push((DocumentReference::new(wiki, space_name, stem), path));
            }
        }
    }
    files.sort();
    files
}
