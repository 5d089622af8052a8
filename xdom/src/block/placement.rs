use std::fmt;

use super::Block;

/// A block-level node found directly under a parent that only accepts inline
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacementError {
    pub path: Vec<usize>,
    pub parent: &'static str,
    pub child: &'static str,
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} block at {:?} cannot contain a standalone {} block",
            self.parent, self.path, self.child
        )
    }
}

impl std::error::Error for PlacementError {}

impl Block {
    /// Check that no standalone block sits directly inside an inline-only
    /// parent, looking through metadata and composite wrappers.
    pub fn check_placement(&self) -> Result<(), PlacementError> {
        let mut path = Vec::new();
        check(self, &mut path)
    }
}

fn check(block: &Block, path: &mut Vec<usize>) -> Result<(), PlacementError> {
    if block.requires_inline_children() {
        for (index, child) in block.children.iter().enumerate() {
            if !child.is_inline() {
                path.push(index);
                return Err(PlacementError {
                    path: path.clone(),
                    parent: block.kind_name(),
                    child: child.kind_name(),
                });
            }
        }
    }
    for (index, child) in block.children.iter().enumerate() {
        path.push(index);
        check(child, path)?;
        path.pop();
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::MacroCall;

    #[test]
    fn paragraph_with_words_is_valid() {
        let tree = Block::document(vec![Block::paragraph(vec![
            Block::word("a"),
            Block::space(),
            Block::word("b"),
        ])]);
        assert!(tree.check_placement().is_ok());
    }

    #[test]
    fn group_inside_paragraph_is_rejected() {
        let tree = Block::document(vec![Block::paragraph(vec![
            Block::word("a"),
            Block::group(vec![]),
        ])]);
        let error = tree.check_placement().unwrap_err();
        assert_eq!(error.path, vec![0, 1]);
        assert_eq!(error.parent, "paragraph");
        assert_eq!(error.child, "group");
    }

    #[test]
    fn inline_marker_must_hold_inline_output() {
        let call = MacroCall::new("x").inline(true);
        let tree = Block::paragraph(vec![Block::macro_marker(
            call,
            vec![Block::paragraph(vec![Block::word("a")])],
        )]);
        assert!(tree.check_placement().is_err());
    }
}
