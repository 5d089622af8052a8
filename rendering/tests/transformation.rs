mod common;

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use common::{FnMacro, html, parse, registry, transform, transform_with, transformation};
use rendering::{
    ContentDescriptor, Frame, MacroDescriptor, MacroError, MacroErrorKind, ParameterDescriptor,
    RenderingContext, TransformationError, TransformationLimits,
};
use xdom::block::{META_SYNTAX, Block, BlockKind, Format, MacroCall};
use xdom::Syntax;

fn recording(id: &str, priority: i32, log: &Arc<Mutex<Vec<String>>>) -> Arc<FnMacro> {
    let log = log.clone();
    let name = id.to_string();
    FnMacro::new(
        MacroDescriptor::new(id, id).priority(priority),
        move |_, _, _| {
            log.lock().unwrap().push(name.clone());
            Ok(vec![Block::paragraph(vec![Block::word(name.clone())])])
        },
    )
}

fn error_blocks(xdom: &Block) -> usize {
    xdom.descendants()
        .filter(|block| block.parameter("class") == Some("xwikirenderingerror"))
        .count()
}

#[test]
fn test_unknown_macro_is_replaced_by_error_blocks() {
    let transformation = transformation(registry(vec![]));
    let (xdom, diagnostics) = transform(&transformation, "{{nope/}}");

    assert_eq!(
        html(&xdom),
        "<div class=\"xwikirenderingerror\">Unknown macro: nope. Click on this message for details.</div>\
         <div class=\"xwikirenderingerrordescription hidden\"><pre>The \"nope\" macro is not in the list of registered macros. \
         Verify the spelling or contact your administrator.</pre></div>"
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].macro_id, "nope");
    assert_eq!(diagnostics[0].kind, MacroErrorKind::UnknownMacro);
    assert!(matches!(&xdom.children[0].kind, BlockKind::MacroMarker(call) if call.id == "nope"));
}

#[test]
fn test_transformation_is_idempotent() {
    let transformation = transformation(registry(vec![
        FnMacro::words("hello", "Hello world"),
        FnMacro::wiki("wiki"),
    ]));
    let (mut xdom, diagnostics) = transform(
        &transformation,
        "{{hello/}}\n\n{{wiki}}a {{hello/}} b{{/wiki}}\n\n{{missing/}}",
    );
    assert_eq!(diagnostics.len(), 1);

    let once = xdom.clone();
    let mut context = RenderingContext::default();
    let again = transformation
        .transform(&mut xdom, &mut context, Frame::new(Syntax::XWiki21))
        .unwrap();
    assert!(again.is_empty());
    assert_eq!(xdom, once);
}

#[test]
fn test_lower_priority_runs_first() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let transformation = transformation(registry(vec![
        recording("a", 20, &log),
        recording("b", 10, &log),
        recording("c", 30, &log),
    ]));
    let (xdom, _) = transform(&transformation, "{{a/}}\n\n{{b/}}\n\n{{c/}}");

    assert_eq!(*log.lock().unwrap(), vec!["b", "a", "c"]);
    assert_eq!(html(&xdom), "<p>a</p><p>b</p><p>c</p>");
}

#[test]
fn test_equal_priorities_keep_document_order_around_a_lower_one() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let transformation = transformation(registry(vec![
        recording("a", 10, &log),
        recording("b", 5, &log),
        recording("c", 10, &log),
    ]));
    let (xdom, diagnostics) = transform(&transformation, "{{a/}}\n\n{{b/}}\n\n{{c/}}");

    assert!(diagnostics.is_empty());
    assert_eq!(*log.lock().unwrap(), vec!["b", "a", "c"]);
    assert_eq!(html(&xdom), "<p>a</p><p>b</p><p>c</p>");
}

#[test]
fn test_same_priority_runs_in_document_order() {
    let log = Arc::new(Mutex::new(Vec::new()));
    let transformation = transformation(registry(vec![
        recording("first", 5, &log),
        recording("second", 5, &log),
    ]));
    transform(&transformation, "{{second/}}\n\n{{first/}}\n\n{{second/}}");

    assert_eq!(*log.lock().unwrap(), vec!["second", "first", "second"]);
}

#[test]
fn test_output_of_a_tier_waits_for_the_next_pass() {
    // `late` has a lower priority than `early`, but only appears once
    // `early` has run, so it runs after it.
    let log = Arc::new(Mutex::new(Vec::new()));
    let early_log = log.clone();
    let early = FnMacro::new(MacroDescriptor::new("early", "early").priority(50), move |_, _, _| {
        early_log.lock().unwrap().push("early".to_string());
        Ok(vec![Block::macro_call(MacroCall::new("late"))])
    });
    let transformation = transformation(registry(vec![early, recording("late", 1, &log)]));
    let (xdom, diagnostics) = transform(&transformation, "{{early/}}");

    assert!(diagnostics.is_empty());
    assert_eq!(*log.lock().unwrap(), vec!["early", "late"]);
    assert_eq!(html(&xdom), "<p>late</p>");
}

#[test]
fn test_one_failure_does_not_affect_other_calls() {
    let boom = FnMacro::new(MacroDescriptor::new("boom", "boom"), |_, _, _| {
        Err(MacroError::execution("it broke"))
    });
    let transformation = transformation(registry(vec![FnMacro::words("ok", "fine"), boom]));
    let (xdom, diagnostics) = transform(&transformation, "{{ok/}}\n\n{{boom/}}\n\n{{ok/}}");

    assert_eq!(
        html(&xdom),
        "<p>fine</p>\
         <div class=\"xwikirenderingerror\">Failed to execute the [boom] macro. Cause: [it broke]. Click on this message for details.</div>\
         <div class=\"xwikirenderingerrordescription hidden\"><pre>it broke</pre></div>\
         <p>fine</p>"
    );
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, MacroErrorKind::Execution);
    assert_eq!(diagnostics[0].message, "it broke");
}

#[test]
fn test_missing_mandatory_parameter_skips_execution() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let chart = FnMacro::new(
        MacroDescriptor::new("chart", "Chart").parameter(ParameterDescriptor::new("type").mandatory()),
        move |_, _, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        },
    );
    let transformation = transformation(registry(vec![chart]));
    let (xdom, diagnostics) = transform(&transformation, "{{chart width=\"3\"/}}");

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(diagnostics[0].kind, MacroErrorKind::ParameterMissing);
    assert_eq!(error_blocks(&xdom), 1);
    assert!(xdom.text_content().contains("The required parameter [type] is missing"));
}

#[test]
fn test_missing_mandatory_content_skips_execution() {
    let ran = Arc::new(AtomicBool::new(false));
    let flag = ran.clone();
    let quote = FnMacro::new(
        MacroDescriptor::new("quote", "Quote").content(ContentDescriptor::Mandatory),
        move |_, _, _| {
            flag.store(true, Ordering::SeqCst);
            Ok(Vec::new())
        },
    );
    let transformation = transformation(registry(vec![quote]));
    let (_, diagnostics) = transform(&transformation, "{{quote}}  {{/quote}}");

    assert!(!ran.load(Ordering::SeqCst));
    assert_eq!(diagnostics[0].kind, MacroErrorKind::ContentMissing);
}

#[test]
fn test_recursion_stops_at_the_nesting_limit() {
    let executions = Arc::new(AtomicUsize::new(0));
    let counter = executions.clone();
    let again = FnMacro::new(MacroDescriptor::new("again", "again"), move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(vec![Block::macro_call(MacroCall::new("again"))])
    });
    let transformation = transformation(registry(vec![again]));
    let (xdom, diagnostics) = transform(&transformation, "{{again/}}");

    assert_eq!(executions.load(Ordering::SeqCst), 100);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, MacroErrorKind::RecursionLimit);
    assert_eq!(diagnostics[0].depth, 100);
    assert_eq!(error_blocks(&xdom), 1);
    assert!(xdom.text_content().starts_with(
        "Maximum macro recursion reached while executing the [again] macro. Cause: [Maximum macro nesting depth of [100] exceeded]."
    ));
    assert!(xdom.macro_calls().is_empty());
}

#[test]
fn test_execution_budget_is_shared_by_the_whole_tree() {
    let transformation = transformation(registry(vec![FnMacro::words("w", "x")])).with_limits(
        TransformationLimits {
            max_nesting_depth: 100,
            max_macro_executions: 3,
        },
    );
    let (_, diagnostics) = transform(&transformation, "{{w/}}\n\n{{w/}}\n\n{{w/}}\n\n{{w/}}\n\n{{w/}}");

    assert_eq!(diagnostics.len(), 2);
    assert!(diagnostics.iter().all(|d| d.kind == MacroErrorKind::RecursionLimit));
}

#[test]
fn test_inline_call_output_is_flattened() {
    let list = FnMacro::new(MacroDescriptor::new("list", "list").inline(true), |_, _, _| {
        Ok(vec![
            Block::paragraph(vec![Block::word("a")]),
            Block::list(false, vec![
                Block::list_item(vec![Block::word("b")]),
                Block::list_item(vec![Block::word("c")]),
            ]),
            Block::horizontal_line(),
            Block::group(vec![Block::paragraph(vec![Block::word("d")])]).with_parameter("class", "g"),
        ])
    });
    let transformation = transformation(registry(vec![FnMacro::words("pair", "one two"), list]));
    let (xdom, diagnostics) = transform(&transformation, "x {{pair/}} y {{list/}}");

    assert!(diagnostics.is_empty());
    assert_eq!(
        html(&xdom),
        "<p>x one two y a b c <span class=\"g\">d</span></p>"
    );
    assert!(xdom.check_placement().is_ok());
}

#[test]
fn test_nested_calls_in_inline_output_become_inline() {
    let outer = FnMacro::new(MacroDescriptor::new("outer", "outer").inline(true), |_, _, _| {
        Ok(vec![Block::macro_call(MacroCall::new("inner"))])
    });
    let transformation = transformation(registry(vec![outer, FnMacro::words("inner", "deep")]));
    let (xdom, diagnostics) = transform(&transformation, "see {{outer/}}");

    assert!(diagnostics.is_empty());
    assert_eq!(html(&xdom), "<p>see deep</p>");
}

#[test]
fn test_standalone_only_macro_used_inline() {
    let block = FnMacro::new(MacroDescriptor::new("block", "block"), |_, _, _| Ok(Vec::new()));
    let transformation = transformation(registry(vec![block]));
    let (xdom, diagnostics) = transform(&transformation, "text {{block/}}");

    assert_eq!(diagnostics[0].kind, MacroErrorKind::InlineNotSupported);
    let rendered = html(&xdom);
    assert!(rendered.starts_with(
        "<p>text <span class=\"xwikirenderingerror\">The [block] macro is a standalone macro and it cannot be used inline. Click on this message for details.</span>"
    ));
    assert!(xdom.check_placement().is_ok());
}

#[test]
fn test_blocks_nested_in_inline_output_are_flattened() {
    let bold = FnMacro::new(MacroDescriptor::new("bold", "bold").inline(true), |_, _, _| {
        Ok(vec![Block::format(
            Format::Bold,
            vec![Block::paragraph(vec![Block::word("x")])],
        )])
    });
    let transformation = transformation(registry(vec![bold, FnMacro::words("ok", "fine")]));
    let (xdom, diagnostics) = transform(&transformation, "a {{bold/}} b\n\n{{ok/}}");

    assert!(diagnostics.is_empty());
    assert!(xdom.check_placement().is_ok());
    assert_eq!(html(&xdom), "<p>a <strong>x</strong> b</p><p>fine</p>");
}

#[test]
fn test_group_inside_standalone_paragraph_output_is_made_inline() {
    let mixed = FnMacro::new(MacroDescriptor::new("mixed", "mixed"), |_, _, _| {
        Ok(vec![Block::paragraph(vec![
            Block::word("a"),
            Block::group(vec![Block::paragraph(vec![Block::word("b")])]),
        ])])
    });
    let transformation = transformation(registry(vec![mixed, FnMacro::words("ok", "fine")]));
    let (xdom, diagnostics) = transform(&transformation, "{{mixed/}}\n\n{{ok/}}");

    assert!(diagnostics.is_empty());
    assert!(xdom.check_placement().is_ok());
    assert_eq!(xdom.text_content(), "a bfine");
    assert!(html(&xdom).ends_with("<p>fine</p>"));
}

#[test]
fn test_standalone_output_is_wrapped_in_paragraphs() {
    let mixed = FnMacro::new(MacroDescriptor::new("mixed", "mixed"), |_, _, _| {
        Ok(vec![Block::word("a"), Block::horizontal_line(), Block::word("b")])
    });
    let transformation = transformation(registry(vec![mixed]));
    let (xdom, _) = transform(&transformation, "{{mixed/}}");

    assert_eq!(html(&xdom), "<p>a</p><hr/><p>b</p>");
}

#[test]
fn test_content_is_parsed_in_the_syntax_of_its_source() {
    let markdown = FnMacro::new(MacroDescriptor::new("md", "md"), |_, _, _| {
        let call = MacroCall::new("wiki").with_content("*em* text");
        Ok(vec![
            Block::metadata(vec![Block::macro_call(call)]).with_parameter(META_SYNTAX, "markdown/1.2"),
        ])
    });
    let transformation = transformation(registry(vec![markdown, FnMacro::wiki("wiki")]));
    let (xdom, diagnostics) = transform(&transformation, "{{md/}}\n\n{{wiki}}*em* text{{/wiki}}");

    assert!(diagnostics.is_empty());
    assert_eq!(html(&xdom), "<p><em>em</em> text</p><p>*em* text</p>");
}

#[test]
fn test_macros_see_the_pushed_frame() {
    let seen = Arc::new(Mutex::new(None));
    let record = seen.clone();
    let probe = FnMacro::new(MacroDescriptor::new("probe", "probe"), move |_, _, context| {
        let rendering = context.rendering();
        let frame = rendering.current().unwrap();
        *record.lock().unwrap() = Some((
            frame.transformation.clone(),
            rendering.transformation_id().map(str::to_string),
            rendering.xdom().map(|xdom| xdom.children.len()),
            context.depth(),
        ));
        Ok(Vec::new())
    });
    let transformation = transformation(registry(vec![probe]));
    transform_with(
        &transformation,
        "{{probe/}}\n\nmore",
        Frame::new(Syntax::XWiki21).transformation_id("page-1"),
    );

    assert_eq!(
        *seen.lock().unwrap(),
        Some((Some("macro".to_string()), Some("page-1".to_string()), Some(2), 0))
    );
}

#[test]
fn test_panicking_macro_becomes_an_error_block() {
    let panicking = FnMacro::new(MacroDescriptor::new("panic", "panic"), |_, _, _| {
        panic!("macro exploded")
    });
    let transformation = transformation(registry(vec![panicking, FnMacro::words("ok", "still here")]));
    let (xdom, diagnostics) = transform(&transformation, "{{panic/}}\n\n{{ok/}}");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].kind, MacroErrorKind::Execution);
    assert!(diagnostics[0].message.contains("macro exploded"));
    assert!(html(&xdom).ends_with("<p>still here</p>"));
}

#[test]
fn test_unsupported_default_syntax_fails_the_transformation() {
    let transformation = transformation(registry(vec![]));
    let mut xdom = parse("{{x/}}");
    let mut context = RenderingContext::default();
    let result = transformation.transform(&mut xdom, &mut context, Frame::new(Syntax::Xhtml10));

    assert!(matches!(result, Err(TransformationError::UnsupportedSyntax(Syntax::Xhtml10))));
    assert_eq!(context.depth(), 0);
    assert_eq!(xdom, parse("{{x/}}"));
}

#[test]
fn test_nested_transformation_shares_depth_and_restores_frames() {
    let nested = FnMacro::new(MacroDescriptor::new("nested", "nested"), |_, content, context| {
        let mut xdom = Block::document(context.parse_content(content.unwrap_or_default())?);
        let depth = context.rendering().depth();
        let frame = Frame::new(Syntax::XWiki21);
        context.transform_nested(&mut xdom, frame)?;
        assert_eq!(context.rendering().depth(), depth);
        Ok(xdom.children)
    });
    let failing = FnMacro::new(MacroDescriptor::new("fail", "fail").inline(true), |_, _, context| {
        Err(MacroError::execution(format!("failed at depth {}", context.depth())))
    });
    let transformation = transformation(registry(vec![nested, failing]));
    let (xdom, diagnostics) = transform(&transformation, "{{nested}}x {{fail/}}{{/nested}}");

    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].depth, 1);
    assert_eq!(diagnostics[0].message, "failed at depth 1");
    assert_eq!(error_blocks(&xdom), 1);
}
