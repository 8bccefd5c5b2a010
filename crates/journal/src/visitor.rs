//! Read-only traversal of history, newest first

use crate::change::Change;
use crate::change_list::ChangeList;
use crate::change_set::ChangeSet;
use lh_core::{Result, RootEntry};
use std::ops::ControlFlow;

/// Receives every change, newest first. Each callback sees the tree as it
/// was right after the change (or set) it is given. Returning
/// `ControlFlow::Break` ends the walk early; `finished` is still called.
pub trait ChangeVisitor {
    fn started(&mut self, _root: &RootEntry) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn begin(&mut self, _set: &ChangeSet, _root: &RootEntry) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn visit(&mut self, change: &Change, root: &RootEntry) -> ControlFlow<()>;

    fn end(&mut self, _set: &ChangeSet) -> ControlFlow<()> {
        ControlFlow::Continue(())
    }

    fn finished(&mut self) {}
}

/// Walk `changes` over a copy of `root`, reverting each change after the
/// visitor has seen it
pub fn accept_read(changes: &ChangeList, root: &RootEntry, visitor: &mut dyn ChangeVisitor) -> Result<()> {
    let mut tree = root.clone();
    let result = walk(changes, &mut tree, visitor);
    visitor.finished();
    result
}

fn walk(changes: &ChangeList, tree: &mut RootEntry, visitor: &mut dyn ChangeVisitor) -> Result<()> {
    if visitor.started(tree).is_break() {
        return Ok(());
    }
    for set in changes.iter() {
        if visitor.begin(set, tree).is_break() {
            return Ok(());
        }
        for change in set.changes.iter().rev() {
            if visitor.visit(change, tree).is_break() {
                return Ok(());
            }
            change.revert_on(tree)?;
        }
        if visitor.end(set).is_break() {
            return Ok(());
        }
    }
    Ok(())
}
