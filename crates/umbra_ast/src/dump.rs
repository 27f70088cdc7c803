//! Human-readable tree dumps for stage inspection.
//!
//! The format is `opcode[ branch branch ]` with a trailing source-location
//! comment per top-level statement. It exists for debugging the pipeline and
//! is not stable across versions.

use crate::arena::{ExprArena, ExprId};
use crate::data::ExprData;
use itertools::Itertools;
use std::fmt::Write;

/// Renders the subtree rooted at `root`.
pub fn dump(arena: &ExprArena, root: ExprId, source: &str) -> String {
    let mut out = String::new();
    for statement in arena.branches(root) {
        let mut line = String::new();
        write_node(arena, statement, &mut line);
        let (row, col) = arena.get(statement).span().line_column(source);
        let _ = writeln!(out, "{line} ; {row}:{col}");
    }
    if arena.branch_count(root) == 0 {
        let mut line = String::new();
        write_node(arena, root, &mut line);
        let _ = writeln!(out, "{line}");
    }
    out
}

fn write_node(arena: &ExprArena, id: ExprId, out: &mut String) {
    let node = arena.get(id);
    let _ = write!(out, "{}", node.opcode());
    match node.data() {
        Some(ExprData::Text(text)) => {
            let _ = write!(out, "({text:?})");
        }
        Some(ExprData::Int(value)) => {
            let _ = write!(out, "({value})");
        }
        Some(ExprData::Unit(unit)) => {
            let _ = write!(out, "(unit {unit})");
        }
        _ => {}
    }
    if node.branch().is_some() {
        let rendered = arena
            .branches(id)
            .map(|child| {
                let mut buffer = String::new();
                write_node(arena, child, &mut buffer);
                buffer
            })
            .join(" ");
        let _ = write!(out, "[ {rendered} ]");
    }
}
