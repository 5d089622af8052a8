use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, info};

use crate::error::RegistrationError;
use crate::macros::Macro;
use crate::model::DocumentReference;
use crate::registry::{MacroRegistry, Visibility};
use crate::security::{AuthorizationManager, GUEST};
use crate::wikimacro::definition::{WikiMacroDefinition, WikiMacroVisibility, split_front_matter};
use crate::wikimacro::WikiMacro;

/// Registration state of the macro defined by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WikiMacroState {
    /// The document defines no registered macro.
    Unregistered,
    Registered { id: String, visibility: Visibility },
    /// The document defines a macro that could not be registered.
    Failed(String),
}

struct Registration {
    id: String,
    visibility: Visibility,
    implementation: Arc<dyn Macro>,
}

/// Keeps the registry in sync with the documents defining wiki macros.
pub struct WikiMacroManager {
    registry: Arc<MacroRegistry>,
    authorization: Arc<dyn AuthorizationManager>,
    /// Held while the registry and `registrations` are changed together.
    lifecycle: Mutex<()>,
    registrations: Mutex<HashMap<DocumentReference, Registration>>,
    failures: Mutex<HashMap<DocumentReference, String>>,
}

impl WikiMacroManager {
    pub fn new(registry: Arc<MacroRegistry>, authorization: Arc<dyn AuthorizationManager>) -> Self {
        WikiMacroManager {
            registry,
            authorization,
            lifecycle: Mutex::new(()),
            registrations: Mutex::new(HashMap::new()),
            failures: Mutex::new(HashMap::new()),
        }
    }

    /// Register the macro defined by `content`, replacing the macro the
    /// document defined before. The author needs the right matching the
    /// macro's visibility: script for user macros, admin for wiki macros and
    /// programming for global ones. On failure the previous registration, if
    /// any, is left in place.
    pub fn register_wiki_macro(
        &self,
        reference: &DocumentReference,
        author: Option<&str>,
        content: &str,
    ) -> Result<(), RegistrationError> {
        let registration = self.prepare(reference, author, content)?;
        let _lifecycle = self.lock_lifecycle();
        self.remove_registration(reference);
        self.insert_registration(reference, registration);
        self.lock_failures().remove(reference);
        Ok(())
    }

    /// Remove the macro registered from `reference`. Returns false when the
    /// document has no registered macro.
    pub fn unregister_wiki_macro(&self, reference: &DocumentReference) -> bool {
        let _lifecycle = self.lock_lifecycle();
        self.remove_registration(reference)
    }

    /// React to a saved document: drop the macro it defined and register the
    /// one it defines now. Failures are logged and kept as the document's
    /// state, never returned.
    pub fn on_document_saved(
        &self,
        reference: &DocumentReference,
        author: Option<&str>,
        content: &str,
    ) -> WikiMacroState {
        let prepared = split_front_matter(content)
            .is_some()
            .then(|| self.prepare(reference, author, content));

        let _lifecycle = self.lock_lifecycle();
        self.remove_registration(reference);
        self.lock_failures().remove(reference);
        match prepared {
            None => {}
            Some(Ok(registration)) => self.insert_registration(reference, registration),
            Some(Err(error)) => {
                debug!(%reference, %error, "failed to register wiki macro");
                self.lock_failures().insert(reference.clone(), error.to_string());
            }
        }
        self.state(reference)
    }

    pub fn on_document_deleted(&self, reference: &DocumentReference) {
        let _lifecycle = self.lock_lifecycle();
        self.remove_registration(reference);
        self.lock_failures().remove(reference);
    }

    /// Parse the definition and check the author's right for its visibility.
    fn prepare(
        &self,
        reference: &DocumentReference,
        author: Option<&str>,
        content: &str,
    ) -> Result<Registration, RegistrationError> {
        let definition = WikiMacroDefinition::parse(content).map_err(|error| match error {
            RegistrationError::Malformed(_, reason) => {
                RegistrationError::Malformed(reference.to_string(), reason)
            }
            error => error,
        })?;

        let visibility = match definition.visibility {
            WikiMacroVisibility::User => Visibility::User(
                author
                    .ok_or_else(|| RegistrationError::NotAuthorized {
                        user: GUEST.to_string(),
                        visibility: "user".to_string(),
                    })?
                    .to_string(),
            ),
            WikiMacroVisibility::Wiki => Visibility::Wiki(reference.wiki.clone()),
            WikiMacroVisibility::Global => Visibility::Global,
        };
        let right = visibility.required_right();
        if !self.authorization.has_access(right, author, Some(reference)) {
            return Err(RegistrationError::NotAuthorized {
                user: author.unwrap_or(GUEST).to_string(),
                visibility: visibility.to_string(),
            });
        }

        let id = definition.descriptor.id.clone();
        let implementation: Arc<dyn Macro> = Arc::new(WikiMacro::new(
            definition,
            reference.clone(),
            author.map(str::to_string),
        )?);
        Ok(Registration {
            id,
            visibility,
            implementation,
        })
    }

    // Callers hold the lifecycle lock.
    fn insert_registration(&self, reference: &DocumentReference, registration: Registration) {
        self.registry.register(
            registration.id.clone(),
            registration.implementation.clone(),
            registration.visibility.clone(),
        );
        info!(%reference, macro_id = %registration.id, visibility = %registration.visibility, "registered wiki macro");
        self.lock_registrations()
            .insert(reference.clone(), registration);
    }

    // Callers hold the lifecycle lock.
    fn remove_registration(&self, reference: &DocumentReference) -> bool {
        let Some(registration) = self.lock_registrations().remove(reference) else {
            return false;
        };
        // Another document may have registered the same id since.
        let current = self.registry.get(&registration.id, &registration.visibility);
        if current.is_some_and(|current| Arc::ptr_eq(&current, &registration.implementation)) {
            self.registry
                .unregister(&registration.id, &registration.visibility);
        }
        debug!(%reference, macro_id = %registration.id, "unregistered wiki macro");
        true
    }

    pub fn state(&self, reference: &DocumentReference) -> WikiMacroState {
        if let Some(registration) = self.lock_registrations().get(reference) {
            return WikiMacroState::Registered {
                id: registration.id.clone(),
                visibility: registration.visibility.clone(),
            };
        }
        match self.lock_failures().get(reference) {
            Some(reason) => WikiMacroState::Failed(reason.clone()),
            None => WikiMacroState::Unregistered,
        }
    }

    fn lock_registrations(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<DocumentReference, Registration>> {
        self.registrations
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_lifecycle(&self) -> std::sync::MutexGuard<'_, ()> {
        self.lifecycle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_failures(&self) -> std::sync::MutexGuard<'_, HashMap<DocumentReference, String>> {
        self.failures.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
