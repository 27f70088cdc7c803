//! The expression arena.
//!
//! All nodes of a module's tree live in one [ExprArena] and are addressed by
//! [ExprId]. The arena owns every node for the life of the module; in-place
//! rewrites ([ExprArena::merge_branch], [ExprArena::replace_with_copy]) leave
//! the displaced nodes unreachable in the arena rather than freeing them,
//! preserving the identity of every id handed out.

use crate::data::ExprData;
use crate::opcode::Opcode;
use crate::set_once::SetOnce;
use log::trace;
use umbra_tokens::Span;

/// An index into an [ExprArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(u32);

impl ExprId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }
}

/// A single expression node.
#[derive(Debug, Clone)]
pub struct Expr {
    opcode: Opcode,
    span: Span,
    branch: SetOnce<ExprId>,
    next: SetOnce<ExprId>,
    data: SetOnce<ExprData>,
}

impl Expr {
    fn new(opcode: Opcode, span: Span) -> Self {
        Self {
            opcode,
            span,
            branch: SetOnce::new(),
            next: SetOnce::new(),
            data: SetOnce::new(),
        }
    }

    pub fn opcode(&self) -> Opcode {
        self.opcode
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn branch(&self) -> Option<ExprId> {
        self.branch.copied()
    }

    pub fn next(&self) -> Option<ExprId> {
        self.next.copied()
    }

    pub fn data(&self) -> Option<&ExprData> {
        self.data.get()
    }

    /// The identifier or string text of a literal node.
    pub fn text(&self) -> Option<&str> {
        match self.data.get() {
            Some(ExprData::Text(text)) => Some(text),
            _ => None,
        }
    }

    /// The parsed integer payload.
    pub fn int_value(&self) -> Option<u64> {
        match self.data.get() {
            Some(ExprData::Int(value)) => Some(*value),
            _ => None,
        }
    }
}

/// Owns every expression node of one module.
#[derive(Debug, Default)]
pub struct ExprArena {
    nodes: Vec<Expr>,
}

impl ExprArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn alloc(&mut self, expr: Expr) -> ExprId {
        let id = ExprId(self.nodes.len() as u32);
        self.nodes.push(expr);
        id
    }

    pub fn get(&self, id: ExprId) -> &Expr {
        &self.nodes[id.index()]
    }

    fn get_mut(&mut self, id: ExprId) -> &mut Expr {
        &mut self.nodes[id.index()]
    }

    // factories

    pub fn make_identifier(&mut self, text: impl Into<String>, span: Span) -> ExprId {
        let id = self.alloc(Expr::new(Opcode::Identifier, span));
        self.get_mut(id).data.set(ExprData::Text(text.into()));
        id
    }

    pub fn make_integer(&mut self, value: u64, span: Span) -> ExprId {
        let id = self.alloc(Expr::new(Opcode::Integer, span));
        self.get_mut(id).data.set(ExprData::Int(value));
        id
    }

    /// Real literals keep their value as raw IEEE-754 bits.
    pub fn make_real(&mut self, value: f64, span: Span) -> ExprId {
        let id = self.alloc(Expr::new(Opcode::Real, span));
        self.get_mut(id).data.set(ExprData::Int(value.to_bits()));
        id
    }

    pub fn make_string(&mut self, text: impl Into<String>, span: Span) -> ExprId {
        let id = self.alloc(Expr::new(Opcode::String, span));
        self.get_mut(id).data.set(ExprData::Text(text.into()));
        id
    }

    pub fn make_codeunit(&mut self, unit: u32, span: Span) -> ExprId {
        let id = self.alloc(Expr::new(Opcode::Codeunit, span));
        self.get_mut(id).data.set(ExprData::Unit(unit));
        id
    }

    /// Creates an operation node. Panics when handed a literal opcode; the
    /// literal factories carry the payload a literal requires.
    #[track_caller]
    pub fn make_operation(&mut self, opcode: Opcode, span: Span) -> ExprId {
        if opcode.is_literal() {
            panic!("make_operation called with literal opcode {opcode}");
        }
        self.alloc(Expr::new(opcode, span))
    }

    // structure

    /// Sets the first child. Panics when the parent is a literal or already
    /// has a branch.
    #[track_caller]
    pub fn set_branch(&mut self, parent: ExprId, child: ExprId) {
        if self.get(parent).opcode.is_literal() {
            panic!(
                "literal expression {} cannot have branches",
                self.get(parent).opcode
            );
        }
        self.get_mut(parent).branch.set(child);
    }

    /// Links `sibling` as the next sibling of `node`. Panics when `node`
    /// already has one.
    #[track_caller]
    pub fn set_next(&mut self, node: ExprId, sibling: ExprId) {
        self.get_mut(node).next.set(sibling);
    }

    /// Appends `child` to the end of `parent`'s child list.
    pub fn append_branch(&mut self, parent: ExprId, child: ExprId) {
        match self.get(parent).branch() {
            None => self.set_branch(parent, child),
            Some(first) => {
                let last = self.last_sibling(first);
                self.set_next(last, child);
            }
        }
    }

    fn last_sibling(&self, mut id: ExprId) -> ExprId {
        while let Some(next) = self.get(id).next() {
            id = next;
        }
        id
    }

    /// Assigns a payload. The payload variant must be legal for the node's
    /// opcode; an illegal assignment is a defect and panics.
    #[track_caller]
    pub fn set_data(&mut self, id: ExprId, data: ExprData) {
        let opcode = self.get(id).opcode;
        if !data.legal_for(opcode) {
            panic!("payload {data:?} is illegal for opcode {opcode}");
        }
        self.get_mut(id).data.set(data);
    }

    /// Extends the node's span to also cover `span`.
    pub fn extend_span_over(&mut self, id: ExprId, span: Span) {
        let node = self.get_mut(id);
        node.span = node.span.join(span);
    }

    /// Rewrites an opcode in place. Only the situator calls this, to settle
    /// ambiguous spellings; the literal/operation class must not change.
    #[track_caller]
    pub fn rewrite_opcode(&mut self, id: ExprId, opcode: Opcode) {
        let old = self.get(id).opcode;
        if old.is_literal() != opcode.is_literal() {
            panic!("opcode rewrite {old} -> {opcode} crosses the literal threshold");
        }
        trace!("rewriting {old} -> {opcode}");
        self.get_mut(id).opcode = opcode;
    }

    // traversal

    /// The children of `id`, in order. Restartable: iterating again walks the
    /// chain from the stored head.
    pub fn branches(&self, id: ExprId) -> impl Iterator<Item = ExprId> + '_ {
        Siblings {
            arena: self,
            cursor: self.get(id).branch(),
        }
    }

    /// `id` and its right siblings, in order.
    pub fn siblings(&self, id: ExprId) -> impl Iterator<Item = ExprId> + '_ {
        Siblings {
            arena: self,
            cursor: Some(id),
        }
    }

    /// The `index`th child, if present.
    pub fn branch_at(&self, id: ExprId, index: usize) -> Option<ExprId> {
        self.branches(id).nth(index)
    }

    pub fn branch_count(&self, id: ExprId) -> usize {
        self.branches(id).count()
    }

    pub fn next_count(&self, id: ExprId) -> usize {
        self.siblings(id).count() - 1
    }

    // in-place rewrites

    /// Replaces a node's contents with those of its sole branch, preserving
    /// the node's identity and its sibling link. The displaced child becomes
    /// unreachable.
    #[track_caller]
    pub fn merge_branch(&mut self, target: ExprId) {
        let child = match self.get(target).branch() {
            Some(child) => child,
            None => panic!("merge_branch on expression without branch"),
        };
        if self.get(child).next().is_some() {
            panic!("merge_branch on expression with more than one branch");
        }
        let preserved_next = self.get(target).next.clone();
        let mut record = self.get(child).clone();
        record.next = preserved_next;
        *self.get_mut(target) = record;
    }

    /// Replaces a node's contents with a recursive copy of another subtree,
    /// preserving the node's identity and its sibling link.
    pub fn replace_with_copy(&mut self, target: ExprId, source: ExprId) {
        let copy = self.deep_copy(source);
        let preserved_next = self.get(target).next.clone();
        let mut record = self.get(copy).clone();
        record.next = preserved_next;
        *self.get_mut(target) = record;
    }

    /// Recursively copies a subtree (children included, the root's sibling
    /// link excluded) into fresh nodes.
    pub fn deep_copy(&mut self, source: ExprId) -> ExprId {
        let mut record = self.get(source).clone();
        record.branch = SetOnce::new();
        record.next = SetOnce::new();
        let copy = self.alloc(record);
        let children: Vec<ExprId> = self.branches(source).collect();
        for child in children {
            let child_copy = self.deep_copy(child);
            self.append_branch(copy, child_copy);
        }
        copy
    }
}

struct Siblings<'a> {
    arena: &'a ExprArena,
    cursor: Option<ExprId>,
}

impl<'a> Iterator for Siblings<'a> {
    type Item = ExprId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.cursor?;
        self.cursor = self.arena.get(current).next();
        Some(current)
    }
}
