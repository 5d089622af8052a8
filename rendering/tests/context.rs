mod common;

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use common::{FnMacro, registry, transform_with, transformation};
use rendering::{DocumentReference, Frame, MacroDescriptor, MacroError, RenderingContext};
use xdom::{Block, Syntax};

#[test]
fn test_frames_are_popped_in_reverse_order() {
    let mut context = RenderingContext::new(Some("alice".to_string()), "dev");
    assert!(context.current().is_none());
    assert_eq!(context.user(), Some("alice"));
    assert_eq!(context.wiki(), "dev");

    {
        let mut outer = context.push(Frame::new(Syntax::XWiki21).transformation_id("outer"));
        assert_eq!(outer.transformation_id(), Some("outer"));
        {
            let inner = outer.push(
                Frame::new(Syntax::Markdown12)
                    .transformation_id("inner")
                    .target_syntax(Syntax::Event10),
            );
            assert_eq!(inner.depth(), 2);
            assert_eq!(inner.transformation_id(), Some("inner"));
            assert_eq!(inner.default_syntax(), Some(Syntax::Markdown12));
            assert_eq!(inner.target_syntax(), Some(Syntax::Event10));
        }
        assert_eq!(outer.depth(), 1);
        assert_eq!(outer.transformation_id(), Some("outer"));
        assert_eq!(outer.default_syntax(), Some(Syntax::XWiki21));
    }
    assert_eq!(context.depth(), 0);
}

#[test]
fn test_explicit_pop_returns_the_frame() {
    let mut context = RenderingContext::default();
    std::mem::forget(context.push(Frame::new(Syntax::Plain10).transformation_id("manual")));
    let frame = context.pop();
    assert_eq!(frame.transformation_id.as_deref(), Some("manual"));
    assert_eq!(context.depth(), 0);
}

#[test]
#[should_panic(expected = "without a matching push")]
fn test_pop_without_push_panics() {
    RenderingContext::default().pop();
}

#[test]
fn test_frame_is_popped_while_unwinding() {
    let mut context = RenderingContext::default();
    let result = panic::catch_unwind(AssertUnwindSafe(|| {
        let _guard = context.push(Frame::new(Syntax::XWiki21));
        panic!("boom");
    }));
    assert!(result.is_err());
    assert_eq!(context.depth(), 0);
}

#[test]
fn test_restriction_is_inherited_by_nested_frames() {
    let mut context = RenderingContext::default();
    let mut restricted = context.push(Frame::new(Syntax::XWiki21).restricted(true));
    let nested = restricted.push(Frame::new(Syntax::XWiki21).restricted(false));
    assert!(nested.is_restricted());
    assert!(nested.current().unwrap().restricted);
}

#[test]
fn test_nested_frame_keeps_security_settings() {
    let document = DocumentReference::new("xwiki", "Main", "Home");
    let frame = Frame::new(Syntax::XWiki21)
        .target_syntax(Syntax::Xhtml10)
        .restricted(true)
        .secure(Some(document.clone()), Some("alice".to_string()));
    let nested = frame.nested(Syntax::Markdown12);

    assert_eq!(nested.default_syntax, Syntax::Markdown12);
    assert_eq!(nested.target_syntax, Some(Syntax::Xhtml10));
    assert!(nested.restricted);
    assert_eq!(nested.secure_document, Some(document));
    assert_eq!(nested.secure_author.as_deref(), Some("alice"));
    assert!(nested.xdom.is_none());
}

#[test]
fn test_context_is_restored_after_failing_and_panicking_macros() {
    let depths = Arc::new(std::sync::Mutex::new(Vec::new()));
    let record = depths.clone();
    let failing = FnMacro::new(MacroDescriptor::new("failing", "failing"), move |_, _, context| {
        record.lock().unwrap().push(context.rendering().depth());
        let mut xdom = Block::document(vec![Block::macro_call(xdom::MacroCall::new("panicking"))]);
        context.transform_nested(&mut xdom, Frame::new(Syntax::XWiki21))?;
        Err(MacroError::execution("failed after nesting"))
    });
    let panicking = FnMacro::new(MacroDescriptor::new("panicking", "panicking"), |_, _, _| {
        panic!("nested panic")
    });
    let transformation = transformation(registry(vec![failing, panicking]));

    // `transform_with` also checks that no frame is left behind.
    let (_, diagnostics) = transform_with(
        &transformation,
        "{{failing/}}\n\n{{failing/}}",
        Frame::new(Syntax::XWiki21),
    );
    assert_eq!(*depths.lock().unwrap(), vec![1, 1]);
    let messages: Vec<&str> = diagnostics.iter().map(|d| d.message.as_str()).collect();
    assert_eq!(
        messages,
        vec![
            "The macro panicked: nested panic",
            "failed after nesting",
            "The macro panicked: nested panic",
            "failed after nesting",
        ]
    );
}
