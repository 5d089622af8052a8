//! Fitting macro output into the place of the call: inside a paragraph
//! (inline) or between blocks (standalone).

use xdom::{Block, BlockKind, Format};

pub fn place(blocks: Vec<Block>, inline: bool) -> Vec<Block> {
    let blocks: Vec<Block> = blocks.into_iter().map(normalize).collect();
    if inline {
        to_inline(blocks)
    } else {
        to_standalone(blocks)
    }
}

/// Flatten the children of inline-only blocks (paragraphs, headers, formats,
/// links, inline markers) anywhere below `block`.
fn normalize(block: Block) -> Block {
    let Block {
        kind,
        children,
        parameters,
    } = block;
    let children: Vec<Block> = children.into_iter().map(normalize).collect();
    let block = Block::with_children(kind, children).with_parameters(parameters);
    if !block.requires_inline_children() || block.children.iter().all(Block::is_inline) {
        return block;
    }
    let Block {
        kind,
        children,
        parameters,
    } = block;
    Block::with_children(kind, to_inline(children)).with_parameters(parameters)
}

/// Flatten output for an inline call site. Top-level paragraphs are
/// unwrapped, groups become inline formats, standalone verbatim becomes
/// inline, nested macro calls are made inline and pieces coming from
/// separate blocks are joined with a space.
pub fn to_inline(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::new();
    let mut previous_standalone = false;

    for block in blocks {
        let standalone = !block.is_inline();
        let converted = if standalone {
            inline_block(block)
        } else {
            vec![block]
        };
        if converted.is_empty() {
            continue;
        }
        if !out.is_empty() && (standalone || previous_standalone) {
            out.push(Block::space());
        }
        out.extend(converted);
        previous_standalone = standalone;
    }
    out
}

fn inline_block(block: Block) -> Vec<Block> {
    let Block {
        kind,
        children,
        parameters,
    } = block;

    match kind {
        BlockKind::Document
        | BlockKind::Paragraph
        | BlockKind::Header { .. }
        | BlockKind::List { .. }
        | BlockKind::ListItem => to_inline(children),
        BlockKind::Group => {
            vec![Block::format(Format::None, to_inline(children)).with_parameters(parameters)]
        }
        BlockKind::Verbatim { content, .. } => {
            vec![Block::verbatim(content, true).with_parameters(parameters)]
        }
        BlockKind::Macro(call) => vec![Block::macro_call(call.inline(true))],
        BlockKind::MacroMarker(call) => vec![Block::macro_marker(
            call.inline(true),
            to_inline(children),
        )],
        BlockKind::MetaData | BlockKind::Composite => vec![
            Block::with_children(kind, to_inline(children)).with_parameters(parameters),
        ],
        BlockKind::HorizontalLine | BlockKind::EmptyLines(_) => Vec::new(),
        kind => vec![Block::with_children(kind, children).with_parameters(parameters)],
    }
}

/// Wrap runs of inline output in paragraphs for a standalone call site.
/// Raw content and provenance wrappers are left where they are.
pub fn to_standalone(blocks: Vec<Block>) -> Vec<Block> {
    let mut out = Vec::new();
    let mut run = Vec::new();

    for block in blocks {
        match block.kind {
            BlockKind::Raw { .. } => {
                flush_run(&mut run, &mut out);
                out.push(block);
            }
            BlockKind::MetaData | BlockKind::Composite => {
                flush_run(&mut run, &mut out);
                let Block {
                    kind,
                    children,
                    parameters,
                } = block;
                out.push(Block::with_children(kind, to_standalone(children)).with_parameters(parameters));
            }
            _ if block.is_inline() => run.push(block),
            _ => {
                flush_run(&mut run, &mut out);
                out.push(block);
            }
        }
    }
    flush_run(&mut run, &mut out);
    out
}

fn flush_run(run: &mut Vec<Block>, out: &mut Vec<Block>) {
    if !run.is_empty() {
        out.push(Block::paragraph(std::mem::take(run)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xdom::MacroCall;

    #[test]
    fn single_paragraph_is_unwrapped() {
        let output = vec![Block::paragraph(vec![Block::word("a"), Block::space(), Block::word("b")])];
        assert_eq!(
            to_inline(output),
            vec![Block::word("a"), Block::space(), Block::word("b")]
        );
    }

    #[test]
    fn separate_blocks_are_joined_with_a_space() {
        let output = vec![
            Block::paragraph(vec![Block::word("a")]),
            Block::list(false, vec![
                Block::list_item(vec![Block::word("b")]),
                Block::list_item(vec![Block::word("c")]),
            ]),
        ];
        assert_eq!(
            to_inline(output),
            vec![
                Block::word("a"),
                Block::space(),
                Block::word("b"),
                Block::space(),
                Block::word("c"),
            ]
        );
    }

    #[test]
    fn group_becomes_format_with_same_parameters() {
        let output = vec![Block::group(vec![Block::paragraph(vec![Block::word("x")])])
            .with_parameter("class", "box")];
        assert_eq!(
            to_inline(output),
            vec![Block::format(Format::None, vec![Block::word("x")]).with_parameter("class", "box")]
        );
    }

    #[test]
    fn nested_standalone_call_is_made_inline() {
        let output = vec![Block::macro_call(MacroCall::new("x")), Block::horizontal_line()];
        assert_eq!(
            to_inline(output),
            vec![Block::macro_call(MacroCall::new("x").inline(true))]
        );
    }

    #[test]
    fn block_inside_inline_format_is_flattened() {
        let output = vec![Block::format(
            Format::Bold,
            vec![Block::paragraph(vec![Block::word("a")])],
        )];
        assert_eq!(
            place(output, true),
            vec![Block::format(Format::Bold, vec![Block::word("a")])]
        );
    }

    #[test]
    fn group_inside_paragraph_becomes_inline() {
        let output = vec![Block::paragraph(vec![
            Block::word("a"),
            Block::group(vec![Block::paragraph(vec![Block::word("b")])]),
        ])];
        assert_eq!(
            place(output, false),
            vec![Block::paragraph(vec![
                Block::word("a"),
                Block::space(),
                Block::format(Format::None, vec![Block::word("b")]),
            ])]
        );
    }

    #[test]
    fn nested_lists_in_standalone_output_are_kept() {
        let list = Block::list(false, vec![Block::list_item(vec![
            Block::word("a"),
            Block::list(false, vec![Block::list_item(vec![Block::word("b")])]),
        ])]);
        assert_eq!(place(vec![list.clone()], false), vec![list]);
    }

    #[test]
    fn inline_runs_are_wrapped_for_standalone_calls() {
        let output = vec![
            Block::word("a"),
            Block::group(vec![]),
            Block::raw(xdom::Syntax::Xhtml10, "<hr/>"),
            Block::word("b"),
        ];
        assert_eq!(
            to_standalone(output),
            vec![
                Block::paragraph(vec![Block::word("a")]),
                Block::group(vec![]),
                Block::raw(xdom::Syntax::Xhtml10, "<hr/>"),
                Block::paragraph(vec![Block::word("b")]),
            ]
        );
    }
}
