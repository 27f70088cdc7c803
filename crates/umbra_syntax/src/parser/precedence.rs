//! The shared shape-building helper used by every precedence level.
//!
//! Each level function owns a [PrecedenceParser] holding the expression built
//! so far and folds further operands into it using one of the five shapes:
//! unary, binary, n-ary, horned, and cloven.

use umbra_ast::{ExprArena, ExprId, Opcode};
use umbra_tokens::Span;

/// Incrementally builds one expression at one precedence level.
#[derive(Debug)]
pub struct PrecedenceParser {
    head: ExprId,
}

impl PrecedenceParser {
    /// Starts from the already-parsed left operand.
    pub fn new(head: ExprId) -> Self {
        Self { head }
    }

    /// The expression built so far.
    pub fn finish(self) -> ExprId {
        self.head
    }

    /// Wraps the current head and `rhs` into a fresh binary node. Repeated
    /// binary operators at one level nest by wrapping the accumulated head.
    pub fn binary(&mut self, arena: &mut ExprArena, opcode: Opcode, span: Span, rhs: ExprId) {
        let node = arena.make_operation(opcode, span);
        arena.append_branch(node, self.head);
        arena.append_branch(node, rhs);
        arena.extend_span_over(node, arena.get(self.head).span());
        arena.extend_span_over(node, arena.get(rhs).span());
        self.head = node;
    }

    /// The flattening variant: when the head already carries `opcode`, the
    /// operand joins its branch list; a differing opcode at the same level
    /// forces a nesting wrap instead.
    pub fn nary(&mut self, arena: &mut ExprArena, opcode: Opcode, span: Span, rhs: ExprId) {
        if arena.get(self.head).opcode() == opcode {
            arena.append_branch(self.head, rhs);
            arena.extend_span_over(self.head, span);
            arena.extend_span_over(self.head, arena.get(rhs).span());
        } else {
            self.binary(arena, opcode, span, rhs);
        }
    }

    /// A prefix operator wrapping its sole operand.
    pub fn unary(arena: &mut ExprArena, opcode: Opcode, span: Span, operand: ExprId) -> ExprId {
        let node = arena.make_operation(opcode, span);
        arena.append_branch(node, operand);
        arena.extend_span_over(node, arena.get(operand).span());
        node
    }

    /// The `head(args…)` shape: the head expression becomes the first branch
    /// and the bracketed arguments follow it.
    pub fn horned(
        arena: &mut ExprArena,
        opcode: Opcode,
        span: Span,
        head: ExprId,
        args: impl IntoIterator<Item = ExprId>,
    ) -> ExprId {
        let node = arena.make_operation(opcode, span);
        arena.append_branch(node, head);
        arena.extend_span_over(node, arena.get(head).span());
        for arg in args {
            arena.append_branch(node, arg);
            arena.extend_span_over(node, arena.get(arg).span());
        }
        node
    }

    /// The headless bracketed-list shape: every element becomes a branch.
    pub fn cloven(
        arena: &mut ExprArena,
        opcode: Opcode,
        span: Span,
        args: impl IntoIterator<Item = ExprId>,
    ) -> ExprId {
        let node = arena.make_operation(opcode, span);
        for arg in args {
            arena.append_branch(node, arg);
            arena.extend_span_over(node, arena.get(arg).span());
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nary_flattens_same_opcode() {
        let mut arena = ExprArena::new();
        let a = arena.make_integer(1, Span::empty(0));
        let b = arena.make_integer(2, Span::empty(1));
        let c = arena.make_integer(3, Span::empty(2));
        let mut parser = PrecedenceParser::new(a);
        parser.nary(&mut arena, Opcode::Add, Span::empty(0), b);
        parser.nary(&mut arena, Opcode::Add, Span::empty(0), c);
        let result = parser.finish();
        assert_eq!(arena.get(result).opcode(), Opcode::Add);
        assert_eq!(arena.branch_count(result), 3);
    }

    #[test]
    fn test_nary_wraps_on_differing_opcode() {
        let mut arena = ExprArena::new();
        let a = arena.make_integer(1, Span::empty(0));
        let b = arena.make_integer(2, Span::empty(1));
        let c = arena.make_integer(3, Span::empty(2));
        let mut parser = PrecedenceParser::new(a);
        parser.nary(&mut arena, Opcode::BitXor, Span::empty(0), b);
        parser.nary(&mut arena, Opcode::BitOr, Span::empty(0), c);
        let result = parser.finish();
        assert_eq!(arena.get(result).opcode(), Opcode::BitOr);
        assert_eq!(arena.branch_count(result), 2);
        let inner = arena.branch_at(result, 0).unwrap();
        assert_eq!(arena.get(inner).opcode(), Opcode::BitXor);
    }

    #[test]
    fn test_horned_head_is_first_branch() {
        let mut arena = ExprArena::new();
        let head = arena.make_identifier("f", Span::empty(0));
        let arg = arena.make_integer(1, Span::empty(2));
        let call = PrecedenceParser::horned(&mut arena, Opcode::Call, Span::empty(0), head, [arg]);
        assert_eq!(arena.branches(call).collect::<Vec<_>>(), vec![head, arg]);
    }
}
