use xdom::{Block, BlockKind};

use crate::descriptor::{MacroDescriptor, MacroParameters, ParameterDescriptor, ParameterType};
use crate::error::MacroError;
use crate::macros::Macro;
use crate::transformation::MacroTransformationContext;

/// Runs after the default priority so headers produced by other macros are
/// listed.
const TOC_PRIORITY: i32 = 2000;

/// `toc`: a list of links to the headers of the document.
pub struct TocMacro {
    descriptor: MacroDescriptor,
}

impl Default for TocMacro {
    fn default() -> Self {
        TocMacro::new()
    }
}

impl TocMacro {
    pub fn new() -> Self {
        let descriptor = MacroDescriptor::new("toc", "Table Of Contents")
            .description("Generates a table of contents from the document headers.")
            .parameter(
                ParameterDescriptor::new("start")
                    .description("First header level listed.")
                    .kind(ParameterType::Integer)
                    .default_value("1"),
            )
            .parameter(
                ParameterDescriptor::new("depth")
                    .description("Number of header levels listed.")
                    .kind(ParameterType::Integer)
                    .default_value("6"),
            )
            .parameter(
                ParameterDescriptor::new("numbered")
                    .kind(ParameterType::Boolean)
                    .default_value("false"),
            )
            .content(crate::descriptor::ContentDescriptor::None)
            .priority(TOC_PRIORITY);
        TocMacro { descriptor }
    }
}

struct Entry {
    level: usize,
    anchor: String,
    label: Vec<Block>,
}

impl Macro for TocMacro {
    fn descriptor(&self) -> &MacroDescriptor {
        &self.descriptor
    }

    fn execute(
        &self,
        parameters: &MacroParameters,
        _content: Option<&str>,
        context: &mut MacroTransformationContext<'_>,
    ) -> Result<Vec<Block>, MacroError> {
        let start = parameters.get_usize("start").unwrap_or(1).max(1);
        let depth = parameters.get_usize("depth").unwrap_or(6);
        let numbered = parameters.get_bool("numbered").unwrap_or(false);
        let levels = start..start.saturating_add(depth);

        let entries: Vec<Entry> = context
            .xdom()
            .descendants()
            .filter_map(|block| match block.kind {
                BlockKind::Header { level } if levels.contains(&usize::from(level)) => Some(Entry {
                    level: usize::from(level),
                    anchor: block.anchor(),
                    label: block.children.clone(),
                }),
                _ => None,
            })
            .collect();
        if entries.is_empty() {
            return Ok(Vec::new());
        }

        let mut entries = entries.into_iter().peekable();
        let items = list_items(&mut entries, start, numbered);
        Ok(vec![Block::list(numbered, items)])
    }
}

/// Items for headers at `level` and below, stopping at the first header
/// above `level`. Deeper headers become nested lists.
fn list_items(
    entries: &mut std::iter::Peekable<std::vec::IntoIter<Entry>>,
    level: usize,
    numbered: bool,
) -> Vec<Block> {
    let mut items: Vec<Block> = Vec::new();
    while let Some(entry) = entries.peek() {
        if entry.level < level {
            break;
        }
        if entry.level > level {
            let nested = Block::list(numbered, list_items(entries, level + 1, numbered));
            match items.last_mut() {
                Some(item) => item.children.push(nested),
                None => items.push(Block::list_item(vec![nested])),
            }
            continue;
        }
        if let Some(entry) = entries.next() {
            let link = Block::link(format!("#{}", entry.anchor), entry.label);
            items.push(Block::list_item(vec![link]));
        }
    }
    items
}
