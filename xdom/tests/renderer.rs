use xdom::block::{Block, MacroCall};
use xdom::parser::{Parser, XWikiParser};
use xdom::renderer::{
    BlockRenderer, EventRenderer, HtmlRenderer, PlainTextRenderer, XWikiRenderer,
};
use xdom::{Syntax, render_to_string, renderer_for};

fn parse(source: &str) -> Block {
    XWikiParser.parse(source, 0).unwrap()
}

fn render(renderer: &dyn BlockRenderer, source: &str) -> String {
    render_to_string(renderer, &parse(source))
}

#[test]
fn test_event_output() {
    let expected = "\
beginDocument
beginHeader [1]
onWord [Title]
endHeader [1]
beginParagraph
onWord [Hello]
onSpace
beginFormat [BOLD]
onWord [world]
endFormat [BOLD]
onSpecialSymbol [!]
endParagraph
endDocument
";
    assert_eq!(render(&EventRenderer, "= Title =\n\nHello **world**!"), expected);
}

#[test]
fn test_event_output_for_macro_marker() {
    let call = MacroCall::new("velocity").with_content("$foo");
    let xdom = Block::document(vec![Block::macro_marker(
        call,
        vec![Block::group(vec![]).with_parameter("class", "xwikirenderingerror")],
    )]);
    let expected = "\
beginDocument
beginMacroMarkerStandalone [velocity] [] [$foo]
beginGroup [[class]=[xwikirenderingerror]]
endGroup [[class]=[xwikirenderingerror]]
endMacroMarkerStandalone [velocity] [] [$foo]
endDocument
";
    assert_eq!(render_to_string(&EventRenderer, &xdom), expected);
}

#[test]
fn test_html_output() {
    assert_eq!(
        render(&HtmlRenderer, "= A b =\n\n* x\n* y\n\na < b"),
        "<h1 id=\"HAb\"><span>A b</span></h1><ul><li>x</li><li>y</li></ul><p>a &lt; b</p>"
    );
}

#[test]
fn test_html_group_attributes_and_verbatim() {
    let xdom = Block::document(vec![
        Block::group(vec![Block::paragraph(vec![Block::word("x")])])
            .with_parameter("class", "box infomessage"),
        Block::verbatim("<b>", false),
    ]);
    assert_eq!(
        render_to_string(&HtmlRenderer, &xdom),
        "<div class=\"box infomessage\"><p>x</p></div><pre>&lt;b&gt;</pre>"
    );
}

#[test]
fn test_html_raw_passes_through() {
    let xdom = Block::document(vec![
        Block::raw(Syntax::Xhtml10, "<b>raw</b>"),
        Block::raw(Syntax::Plain10, "ignored"),
    ]);
    assert_eq!(render_to_string(&HtmlRenderer, &xdom), "<b>raw</b>");
}

#[test]
fn test_unexpanded_macros_are_not_rendered_to_html() {
    assert_eq!(render(&HtmlRenderer, "a {{x/}}"), "<p>a </p>");
}

#[test]
fn test_plain_text_output() {
    assert_eq!(
        render(&PlainTextRenderer, "Hello **world**\n\n* a\n* b"),
        "Hello world\n\na\nb"
    );
}

#[test]
fn test_xwiki_round_trip() {
    let source = "= Title =\n\nHello **world** and {{x a=\"1\"/}}\n\n* one\n** two\n* three\n\n{{code}}\nline1\nline2\n{{/code}}\n\n----";
    assert_eq!(render(&XWikiRenderer, source), source);
}

#[test]
fn test_xwiki_prints_marker_as_original_call() {
    let call = MacroCall::new("info").with_content("careful").inline(true);
    let xdom = Block::document(vec![Block::paragraph(vec![
        Block::word("a"),
        Block::space(),
        Block::macro_marker(call, vec![Block::word("expanded")]),
    ])]);
    assert_eq!(
        render_to_string(&XWikiRenderer, &xdom),
        "a {{info}}careful{{/info}}"
    );
}

#[test]
fn test_xwiki_escapes_doubled_symbols() {
    let xdom = Block::document(vec![Block::paragraph(vec![
        Block::symbol('*'),
        Block::symbol('*'),
        Block::word("a"),
    ])]);
    assert_eq!(render_to_string(&XWikiRenderer, &xdom), "~**a");
}

#[test]
fn test_renderer_lookup() {
    for syntax in [Syntax::Event10, Syntax::Plain10, Syntax::Xhtml10, Syntax::XWiki21] {
        assert_eq!(renderer_for(syntax).unwrap().syntax(), syntax);
    }
    assert!(renderer_for(Syntax::Markdown12).is_none());
}

#[test]
fn test_syntax_ids() {
    assert_eq!("xwiki/2.1".parse::<Syntax>().unwrap(), Syntax::XWiki21);
    assert_eq!("markdown".parse::<Syntax>().unwrap(), Syntax::Markdown12);
    assert_eq!("html".parse::<Syntax>().unwrap(), Syntax::Xhtml10);
    assert!("creole/1.0".parse::<Syntax>().is_err());
    assert_eq!(Syntax::Event10.to_string(), "event/1.0");
}
