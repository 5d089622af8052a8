mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::{html, registry_with_builtins, transform_with, transformation_with};
use rendering::{
    AuthorizationManager, DocumentReference, Frame, MacroDiagnostic, MacroErrorKind,
    MacroRegistry, MemoryStore, RegistrationError, RenderingContext, Right, RightsTable,
    Visibility, WikiMacroManager, WikiMacroState,
};
use xdom::Syntax;

const GREET: &str = r#"---
id = "greet"
visibility = "wiki"
inline = true
content = "none"

[[parameters]]
name = "name"
mandatory = true
---
Hello **{{wikimacroparameter name="name"/}}**!"#;

const NOTE: &str = r#"---
id = "note"
visibility = "wiki"
---
Before

{{wikimacrocontent/}}

After"#;

fn rights() -> Arc<RightsTable> {
    Arc::new(
        RightsTable::new()
            .grant("root", Right::Programming)
            .grant("alice", Right::Admin)
            .grant("bob", Right::Script)
            .grant("carol", Right::Edit),
    )
}

fn setup() -> (Arc<MacroRegistry>, WikiMacroManager) {
    let registry = registry_with_builtins(Arc::new(MemoryStore::new()));
    let manager = WikiMacroManager::new(registry.clone(), rights());
    (registry, manager)
}

fn page(name: &str) -> DocumentReference {
    DocumentReference::new("xwiki", "Macros", name)
}

fn render_with_diagnostics(
    registry: &Arc<MacroRegistry>,
    author: &str,
    source: &str,
) -> (String, Vec<MacroDiagnostic>) {
    let transformation = transformation_with(registry.clone(), rights());
    let frame = Frame::new(Syntax::XWiki21).secure(
        Some(DocumentReference::new("xwiki", "Main", "Caller")),
        Some(author.to_string()),
    );
    let (xdom, diagnostics) = transform_with(&transformation, source, frame);
    (html(&xdom), diagnostics)
}

fn render_as(registry: &Arc<MacroRegistry>, author: &str, source: &str) -> (String, Vec<MacroErrorKind>) {
    let (output, diagnostics) = render_with_diagnostics(registry, author, source);
    (output, diagnostics.into_iter().map(|d| d.kind).collect())
}

fn wiki_macro(id: &str, body: &str) -> String {
    format!("---\nid = \"{}\"\nvisibility = \"wiki\"\n---\n{}", id, body)
}

fn error_blocks(html: &str) -> usize {
    html.matches("class=\"xwikirenderingerror\"").count()
}

/// Lets every caller through once `parties` of them are checking at the
/// same time.
struct Rendezvous(Barrier);

impl AuthorizationManager for Rendezvous {
    fn has_access(&self, _right: Right, _user: Option<&str>, _document: Option<&DocumentReference>) -> bool {
        self.0.wait();
        true
    }
}

#[test]
fn test_saved_definition_is_registered_and_callable() {
    let (registry, manager) = setup();
    let state = manager.on_document_saved(&page("Greet"), Some("alice"), GREET);

    assert_eq!(
        state,
        WikiMacroState::Registered {
            id: "greet".to_string(),
            visibility: Visibility::Wiki("xwiki".to_string()),
        }
    );
    let (output, failures) = render_as(&registry, "carol", "Say: {{greet name=\"Bob\"/}}");
    assert!(failures.is_empty());
    assert_eq!(output, "<p>Say: Hello <strong>Bob</strong>!</p>");
}

#[test]
fn test_saving_again_replaces_the_macro() {
    let (registry, manager) = setup();
    manager.on_document_saved(&page("Greet"), Some("alice"), GREET);
    let updated = GREET.replace("Hello", "Goodbye");
    manager.on_document_saved(&page("Greet"), Some("alice"), &updated);

    let (output, _) = render_as(&registry, "carol", "{{greet name=\"Bob\"/}}");
    assert_eq!(output, "<p>Goodbye <strong>Bob</strong>!</p>");
}

#[test]
fn test_removing_the_definition_unregisters_the_macro() {
    let (registry, manager) = setup();
    let reference = page("Greet");
    manager.on_document_saved(&reference, Some("alice"), GREET);

    let state = manager.on_document_saved(&reference, Some("alice"), "Just a page now.");
    assert_eq!(state, WikiMacroState::Unregistered);
    let context = RenderingContext::default();
    assert!(registry.resolve("greet", &context).is_none());

    manager.on_document_saved(&reference, Some("alice"), GREET);
    manager.on_document_deleted(&reference);
    assert_eq!(manager.state(&reference), WikiMacroState::Unregistered);
    assert!(registry.resolve("greet", &context).is_none());
    assert!(!manager.unregister_wiki_macro(&reference));
}

#[test]
fn test_concurrent_saves_leave_nothing_behind_after_delete() {
    let reference = page("Greet");
    let goodbye = GREET.replace("Hello", "Goodbye");

    for _ in 0..200 {
        let registry = registry_with_builtins(Arc::new(MemoryStore::new()));
        let manager = WikiMacroManager::new(registry.clone(), Arc::new(Rendezvous(Barrier::new(2))));

        thread::scope(|scope| {
            for content in [GREET, goodbye.as_str()] {
                let manager = &manager;
                let reference = &reference;
                scope.spawn(move || manager.on_document_saved(reference, Some("alice"), content));
            }
        });
        assert!(matches!(manager.state(&reference), WikiMacroState::Registered { .. }));

        manager.on_document_deleted(&reference);
        assert_eq!(manager.state(&reference), WikiMacroState::Unregistered);
        assert!(registry.get("greet", &Visibility::Wiki("xwiki".to_string())).is_none());
    }
}

#[test]
fn test_registration_requires_the_right_for_the_visibility() {
    let (_, manager) = setup();
    let global = GREET.replace("visibility = \"wiki\"", "visibility = \"global\"");
    let user = GREET.replace("visibility = \"wiki\"", "visibility = \"user\"");

    let error = manager
        .register_wiki_macro(&page("Global"), Some("alice"), &global)
        .unwrap_err();
    assert!(matches!(
        error,
        RegistrationError::NotAuthorized { ref user, .. } if user == "alice"
    ));
    assert!(manager.register_wiki_macro(&page("Global"), Some("root"), &global).is_ok());

    assert!(manager.register_wiki_macro(&page("Wiki"), Some("bob"), GREET).is_err());
    assert!(manager.register_wiki_macro(&page("Wiki"), Some("alice"), GREET).is_ok());

    assert!(manager.register_wiki_macro(&page("Mine"), Some("carol"), &user).is_err());
    assert!(manager.register_wiki_macro(&page("Mine"), None, &user).is_err());
    assert_eq!(
        manager.on_document_saved(&page("Mine"), Some("bob"), &user),
        WikiMacroState::Registered {
            id: "greet".to_string(),
            visibility: Visibility::User("bob".to_string()),
        }
    );
}

#[test]
fn test_failures_are_reported_as_state() {
    let (registry, manager) = setup();
    let reference = page("Broken");

    let state = manager.on_document_saved(&reference, Some("bob"), GREET);
    assert!(matches!(state, WikiMacroState::Failed(ref reason) if reason.contains("not allowed")));

    let malformed = "---\nid = \"broken\"\nvisibility = \"wiki\"\n---\n{{unclosed}}\ntext";
    let state = manager.on_document_saved(&reference, Some("alice"), malformed);
    assert!(matches!(state, WikiMacroState::Failed(ref reason) if reason.contains("unclosed macro")));
    assert_eq!(manager.state(&reference), state);
    assert!(registry.resolve("broken", &RenderingContext::default()).is_none());
}

#[test]
fn test_failed_registration_keeps_the_previous_macro() {
    let (registry, manager) = setup();
    let reference = page("Greet");
    manager
        .register_wiki_macro(&reference, Some("alice"), GREET)
        .unwrap();

    assert!(manager.register_wiki_macro(&reference, Some("alice"), "---\nid = \n---\n").is_err());
    assert!(registry.resolve("greet", &RenderingContext::default()).is_some());
}

#[test]
fn test_content_is_substituted_for_the_placeholder() {
    let (registry, manager) = setup();
    manager.on_document_saved(&page("Note"), Some("alice"), NOTE);

    let (output, failures) = render_as(&registry, "carol", "{{note}}**inner**{{/note}}");
    assert!(failures.is_empty());
    assert_eq!(output, "<p>Before</p><p><strong>inner</strong></p><p>After</p>");
}

#[test]
fn test_mandatory_parameter_of_a_wiki_macro() {
    let (registry, manager) = setup();
    manager.on_document_saved(&page("Greet"), Some("alice"), GREET);

    let (_, failures) = render_as(&registry, "carol", "{{greet/}}");
    assert_eq!(failures, vec![MacroErrorKind::ParameterMissing]);
}

#[test]
fn test_body_runs_with_the_rights_of_the_macro_author() {
    let (registry, manager) = setup();
    let scripted = "---\nid = \"scripted\"\nvisibility = \"wiki\"\n---\n{{template}}from the body{{/template}}\n\n{{wikimacrocontent/}}";
    manager.on_document_saved(&page("Scripted"), Some("alice"), scripted);

    let (output, failures) = render_as(&registry, "carol", "{{scripted/}}");
    assert!(failures.is_empty());
    assert_eq!(output, "<p>from the body</p>");

    // Content written by the caller keeps the caller's rights.
    let (_, failures) = render_as(
        &registry,
        "carol",
        "{{scripted}}{{template}}from the caller{{/template}}{{/scripted}}",
    );
    assert_eq!(failures, vec![MacroErrorKind::NotAllowed]);

    let (_, failures) = render_as(&registry, "carol", "{{template}}direct{{/template}}");
    assert_eq!(failures, vec![MacroErrorKind::NotAllowed]);
}

#[test]
fn test_placeholders_outside_a_wiki_macro_are_errors() {
    let (registry, _) = setup();
    let (output, failures) = render_as(&registry, "carol", "{{wikimacrocontent/}}");

    assert_eq!(failures, vec![MacroErrorKind::Execution]);
    assert!(output.contains(
        "Failed to execute the [wikimacrocontent] macro. Cause: [The [wikimacrocontent] macro can only be used in the body of a wiki macro]."
    ));
}

#[test]
fn test_self_calling_wiki_macro_stops_at_the_nesting_limit() {
    let (registry, manager) = setup();
    manager.on_document_saved(&page("Loop"), Some("alice"), &wiki_macro("loop", "{{loop/}}"));

    let (output, diagnostics) = render_with_diagnostics(&registry, "carol", "{{loop/}}\n\nafter");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, MacroErrorKind::RecursionLimit);
    assert_eq!(diagnostics[0].macro_id, "loop");
    assert_eq!(diagnostics[0].depth, 100);
    assert_eq!(error_blocks(&output), 1);
    assert!(output.ends_with("<p>after</p>"));
}

#[test]
fn test_wiki_macros_calling_each_other_stop_at_the_nesting_limit() {
    let (registry, manager) = setup();
    manager.on_document_saved(&page("Ping"), Some("alice"), &wiki_macro("ping", "{{pong/}}"));
    manager.on_document_saved(&page("Pong"), Some("alice"), &wiki_macro("pong", "{{ping/}}"));

    let (output, diagnostics) = render_with_diagnostics(&registry, "carol", "{{ping/}}");
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, MacroErrorKind::RecursionLimit);
    assert_eq!(diagnostics[0].macro_id, "ping");
    assert_eq!(diagnostics[0].depth, 100);
    assert_eq!(error_blocks(&output), 1);
}
