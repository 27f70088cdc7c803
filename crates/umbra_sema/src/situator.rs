//! The situator: opcode disambiguation and role validation.
//!
//! One recursive pass over the situated tree. Ambiguous spellings are settled
//! in place by the situation they occupy and their branch count; every node is
//! then checked against the situation table. A mismatch is reported and the
//! offending subtree skipped, so one run surfaces every independent problem.
//! The pass is idempotent: settled opcodes are no longer ambiguous and settle
//! to themselves.

use crate::situation::{branch_situation, Situation, SituationTable};
use log::trace;
use umbra_ast::{ExprArena, ExprId, Opcode};
use umbra_tokens::{Diagnostic, DiagnosticSink, Spanned};

/// Validates and disambiguates a module tree. Returns whether the tree is
/// free of situation errors.
pub fn situate(
    arena: &mut ExprArena,
    root: ExprId,
    table: &SituationTable,
    module: &str,
    sink: &dyn DiagnosticSink,
) -> bool {
    let mut situator = Situator {
        arena,
        table,
        module,
        sink,
        ok: true,
    };
    situator.visit(root, Situation::Module, None);
    situator.ok
}

struct Situator<'a> {
    arena: &'a mut ExprArena,
    table: &'a SituationTable,
    module: &'a str,
    sink: &'a dyn DiagnosticSink,
    ok: bool,
}

impl<'a> Situator<'a> {
    fn visit(&mut self, id: ExprId, situation: Situation, parent: Option<(Opcode, usize)>) {
        let count = self.arena.branch_count(id);
        let mut opcode = self.arena.get(id).opcode();
        if opcode.is_ambiguous() {
            let settled = settle(opcode, situation, count);
            trace!("settled {opcode} -> {settled} in {situation}");
            self.arena.rewrite_opcode(id, settled);
            opcode = settled;
        }
        if !self.table.legal(situation, opcode) {
            let span = self.arena.get(id).span();
            let message = match parent {
                Some((outer, index)) => format!(
                    "{opcode} is not allowed as branch {index} of {outer} (expected {situation})"
                ),
                None => format!("{opcode} is not allowed at the module root"),
            };
            self.sink.report(
                Diagnostic::error(message)
                    .with_span(span)
                    .with_module(self.module),
            );
            self.ok = false;
            // continue with siblings, not into the offending subtree
            return;
        }
        let branches: Vec<ExprId> = self.arena.branches(id).collect();
        for (index, branch) in branches.into_iter().enumerate() {
            let demanded = branch_situation(opcode, situation, index, count);
            self.visit(branch, demanded, Some((opcode, index)));
        }
    }
}

/// Settles an ambiguous spelling by situation and branch count.
fn settle(opcode: Opcode, situation: Situation, count: usize) -> Opcode {
    let symbolish = matches!(situation, Situation::Symbol | Situation::ReturnSymbol);
    match opcode {
        Opcode::Dash => {
            if count == 1 {
                Opcode::Negate
            } else {
                Opcode::Subtract
            }
        }
        Opcode::Star => {
            if symbolish {
                Opcode::PointerType
            } else {
                Opcode::Multiply
            }
        }
        Opcode::Amp => {
            if symbolish {
                Opcode::ReferenceType
            } else {
                Opcode::BitAnd
            }
        }
        Opcode::Caret => {
            if count == 1 {
                Opcode::Dereference
            } else {
                Opcode::BitXor
            }
        }
        _ => opcode,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use test_log::test;
    use umbra_tokens::{Severity, Span};

    #[derive(Default)]
    struct TestSink(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for TestSink {
        fn report(&self, diagnostic: Diagnostic) {
            self.0.lock().unwrap().push(diagnostic);
        }
    }

    impl TestSink {
        fn errors(&self) -> Vec<String> {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|d| d.severity == Severity::Error)
                .map(|d| d.message.clone())
                .collect()
        }
    }

    fn situate_source(source: &str) -> (ExprArena, ExprId, bool, TestSink) {
        let mut buffer = source.as_bytes().to_vec();
        buffer.push(0);
        let sink = TestSink::default();
        let (tokens, tok_ok) = umbra_syntax::tokenize(&buffer, "test.um", &sink);
        assert!(tok_ok);
        let mut arena = ExprArena::new();
        let (root, parse_ok) = umbra_syntax::parse(&tokens, source, "test.um", &mut arena, &sink);
        assert!(parse_ok);
        let table = SituationTable::build();
        let ok = situate(&mut arena, root, &table, "test.um", &sink);
        (arena, root, ok, sink)
    }

    fn statement(arena: &ExprArena, root: ExprId, index: usize) -> ExprId {
        arena.branch_at(root, index).unwrap()
    }

    #[test]
    fn test_dash_settles_by_branch_count() {
        let (arena, root, ok, _) = situate_source("entry main() {: a - b; -c; :}");
        assert!(ok);
        let body = arena.branch_at(statement(&arena, root, 0), 3).unwrap();
        let subtract = arena.branch_at(body, 0).unwrap();
        assert_eq!(arena.get(subtract).opcode(), Opcode::Subtract);
        let negate = arena.branch_at(body, 1).unwrap();
        assert_eq!(arena.get(negate).opcode(), Opcode::Negate);
    }

    #[test]
    fn test_star_settles_by_situation() {
        let (arena, root, ok, _) = situate_source("entry main() {: var p: *s32 = a * b; :}");
        assert!(ok);
        let body = arena.branch_at(statement(&arena, root, 0), 3).unwrap();
        let var = arena.branch_at(body, 0).unwrap();
        let pointer = arena.branch_at(var, 1).unwrap();
        assert_eq!(arena.get(pointer).opcode(), Opcode::PointerType);
        let multiply = arena.branch_at(var, 2).unwrap();
        assert_eq!(arena.get(multiply).opcode(), Opcode::Multiply);
    }

    #[test]
    fn test_amp_settles_by_situation() {
        let (arena, root, ok, _) = situate_source("entry main() {: var r: &s32 = a & b; :}");
        assert!(ok);
        let body = arena.branch_at(statement(&arena, root, 0), 3).unwrap();
        let var = arena.branch_at(body, 0).unwrap();
        let reference = arena.branch_at(var, 1).unwrap();
        assert_eq!(arena.get(reference).opcode(), Opcode::ReferenceType);
        let bitand = arena.branch_at(var, 2).unwrap();
        assert_eq!(arena.get(bitand).opcode(), Opcode::BitAnd);
    }

    #[test]
    fn test_caret_settles_by_branch_count() {
        let (arena, root, ok, _) = situate_source("entry main() {: a ^ b; ^p; :}");
        assert!(ok);
        let body = arena.branch_at(statement(&arena, root, 0), 3).unwrap();
        let xor = arena.branch_at(body, 0).unwrap();
        assert_eq!(arena.get(xor).opcode(), Opcode::BitXor);
        let deref = arena.branch_at(body, 1).unwrap();
        assert_eq!(arena.get(deref).opcode(), Opcode::Dereference);
    }

    #[test]
    fn test_situating_twice_is_idempotent() {
        let source = "entry main() {: var p: *s32 = a - b; :}";
        let mut buffer = source.as_bytes().to_vec();
        buffer.push(0);
        let sink = TestSink::default();
        let (tokens, _) = umbra_syntax::tokenize(&buffer, "test.um", &sink);
        let mut arena = ExprArena::new();
        let (root, _) = umbra_syntax::parse(&tokens, source, "test.um", &mut arena, &sink);
        let table = SituationTable::build();
        assert!(situate(&mut arena, root, &table, "test.um", &sink));
        assert!(situate(&mut arena, root, &table, "test.um", &sink));
        assert!(sink.errors().is_empty());
    }

    #[test]
    fn test_interpolated_string_situates_cleanly() {
        let (_, _, ok, sink) = situate_source("entry main() {: var s = \"a{x}b\"; :}");
        assert!(ok, "{:?}", sink.errors());
    }

    #[test]
    fn test_value_at_module_root_is_reported() {
        let (_, _, ok, sink) = situate_source("1 + 2;");
        assert!(!ok);
        let errors = sink.errors();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("branch 0 of Scope"), "{}", errors[0]);
        assert!(errors[0].contains("RootStatement"), "{}", errors[0]);
    }

    #[test]
    fn test_entry_point_inside_object_is_reported() {
        let (_, _, ok, sink) = situate_source("object o {: entry main() {: :} :}");
        assert!(!ok);
        assert!(sink.errors()[0].contains("EntryPoint"));
    }

    #[test]
    fn test_mismatch_skips_subtree_but_continues_siblings() {
        // both top-level expression statements must be reported
        let (_, _, ok, sink) = situate_source("1 + 2; 3 * 4;");
        assert!(!ok);
        assert_eq!(sink.errors().len(), 2);
    }

    #[test]
    fn test_manual_tree_with_no_sugar() {
        let mut arena = ExprArena::new();
        let root = arena.make_operation(Opcode::Scope, Span::empty(0));
        let var = arena.make_operation(Opcode::Variable, Span::empty(0));
        let name = arena.make_identifier("x", Span::empty(0));
        let symbol = arena.make_identifier("s32", Span::empty(0));
        arena.append_branch(var, name);
        arena.append_branch(var, symbol);
        arena.append_branch(root, var);
        let table = SituationTable::build();
        let sink = TestSink::default();
        assert!(situate(&mut arena, root, &table, "m", &sink));
        assert!(sink.errors().is_empty());
    }
}
