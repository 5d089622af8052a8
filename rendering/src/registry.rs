use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use crate::context::RenderingContext;
use crate::macros::Macro;
use crate::security::Right;

/// Who can see a registered macro.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Visibility {
    /// Only the named user.
    User(String),
    /// Everyone in the named wiki.
    Wiki(String),
    /// Everyone.
    Global,
}

impl Visibility {
    /// Right needed to register a wiki-authored macro with this visibility.
    pub fn required_right(&self) -> Right {
        match self {
            Visibility::User(_) => Right::Script,
            Visibility::Wiki(_) => Right::Admin,
            Visibility::Global => Right::Programming,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Visibility::User(user) => write!(f, "user [{}]", user),
            Visibility::Wiki(wiki) => write!(f, "wiki [{}]", wiki),
            Visibility::Global => f.write_str("global"),
        }
    }
}

#[derive(Clone, Default)]
struct Snapshot {
    scopes: HashMap<Visibility, HashMap<String, Arc<dyn Macro>>>,
}

impl Snapshot {
    fn get(&self, id: &str, visibility: &Visibility) -> Option<Arc<dyn Macro>> {
        self.scopes.get(visibility)?.get(id).cloned()
    }
}

/// Registered macros by id and visibility.
///
/// Lookups read an immutable snapshot; every mutation copies the snapshot,
/// changes the copy and swaps it in. Writers are serialized, readers never
/// observe a half-applied change.
pub struct MacroRegistry {
    snapshot: RwLock<Arc<Snapshot>>,
    writer: Mutex<()>,
}

impl Default for MacroRegistry {
    fn default() -> Self {
        MacroRegistry::new()
    }
}

impl MacroRegistry {
    pub fn new() -> Self {
        MacroRegistry {
            snapshot: RwLock::new(Arc::new(Snapshot::default())),
            writer: Mutex::new(()),
        }
    }

    fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn update<R>(&self, change: impl FnOnce(&mut Snapshot) -> R) -> R {
        let _writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next = Snapshot::clone(&self.snapshot());
        let result = change(&mut next);
        *self.snapshot.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(next);
        result
    }

    /// Register `implementation` under `id`, replacing (and returning) any
    /// macro registered with the same id and visibility.
    pub fn register(
        &self,
        id: impl Into<String>,
        implementation: Arc<dyn Macro>,
        visibility: Visibility,
    ) -> Option<Arc<dyn Macro>> {
        let id = id.into();
        debug!(macro_id = %id, %visibility, "registering macro");
        self.update(|snapshot| {
            snapshot
                .scopes
                .entry(visibility)
                .or_default()
                .insert(id, implementation)
        })
    }

    /// Remove a registration. Returns false, changing nothing, when there is
    /// no such registration.
    pub fn unregister(&self, id: &str, visibility: &Visibility) -> bool {
        let removed = self.update(|snapshot| {
            let Some(scope) = snapshot.scopes.get_mut(visibility) else {
                return false;
            };
            let removed = scope.remove(id).is_some();
            if scope.is_empty() {
                snapshot.scopes.remove(visibility);
            }
            removed
        });
        debug!(macro_id = %id, %visibility, removed, "unregistering macro");
        removed
    }

    /// The macro visible to the context's user, preferring the narrowest
    /// scope: the user's own macros, then the wiki's, then global ones.
    pub fn resolve(&self, id: &str, context: &RenderingContext) -> Option<Arc<dyn Macro>> {
        self.resolve_for(id, context.user(), context.wiki())
    }

    pub fn resolve_for(&self, id: &str, user: Option<&str>, wiki: &str) -> Option<Arc<dyn Macro>> {
        let snapshot = self.snapshot();
        search_order(user, wiki)
            .iter()
            .find_map(|visibility| snapshot.get(id, visibility))
    }

    /// Exact lookup in one scope.
    pub fn get(&self, id: &str, visibility: &Visibility) -> Option<Arc<dyn Macro>> {
        self.snapshot().get(id, visibility)
    }

    /// Every macro visible to the context's user, sorted by id, with the
    /// visibility it resolves from.
    pub fn macros(&self, context: &RenderingContext) -> Vec<(String, Visibility, Arc<dyn Macro>)> {
        let snapshot = self.snapshot();
        let mut visible: BTreeMap<String, (Visibility, Arc<dyn Macro>)> = BTreeMap::new();
        // Widest scope first so narrower ones overwrite it.
        for visibility in search_order(context.user(), context.wiki()).iter().rev() {
            if let Some(scope) = snapshot.scopes.get(visibility) {
                for (id, implementation) in scope {
                    visible.insert(id.clone(), (visibility.clone(), implementation.clone()));
                }
            }
        }
        visible
            .into_iter()
            .map(|(id, (visibility, implementation))| (id, visibility, implementation))
            .collect()
    }
}

fn search_order(user: Option<&str>, wiki: &str) -> Vec<Visibility> {
    let mut order = Vec::with_capacity(3);
    if let Some(user) = user {
        order.push(Visibility::User(user.to_string()));
    }
    order.push(Visibility::Wiki(wiki.to_string()));
    order.push(Visibility::Global);
    order
}
