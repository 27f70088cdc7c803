//! Declaration attributes and their flag set.

use std::fmt::{Debug, Formatter};
use strum::IntoEnumIterator;
use umbra_ast::{ExprArena, ExprId, Opcode};
use umbra_tokens::{Diagnostic, DiagnosticSink, Spanned};

/// One attribute keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::EnumIter, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum AttributeKind {
    Mutable,
    Volatile,
    Private,
    Export,
    Inline,
    External,
    Threadlocal,
}

impl AttributeKind {
    /// The attribute an ascription opcode names, if it names one.
    pub fn from_opcode(opcode: Opcode) -> Option<Self> {
        Some(match opcode {
            Opcode::Mutable => AttributeKind::Mutable,
            Opcode::Volatile => AttributeKind::Volatile,
            Opcode::Private => AttributeKind::Private,
            Opcode::Export => AttributeKind::Export,
            Opcode::Inline => AttributeKind::Inline,
            Opcode::External => AttributeKind::External,
            Opcode::Threadlocal => AttributeKind::Threadlocal,
            _ => return None,
        })
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

/// A fixed bitset over [AttributeKind].
#[derive(Default, Clone, Copy, PartialEq, Eq)]
pub struct AttributeFlags(u16);

impl AttributeFlags {
    pub fn set(&mut self, kind: AttributeKind) {
        self.0 |= kind.bit();
    }

    pub fn contains(&self, kind: AttributeKind) -> bool {
        self.0 & kind.bit() != 0
    }

    pub fn union(self, other: AttributeFlags) -> AttributeFlags {
        AttributeFlags(self.0 | other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Collapses the attribute branches of an `Ascribe` node into flags.
    ///
    /// Each repetition of an attribute beyond its first occurrence gets its
    /// own diagnostic, and any repetition makes the whole collapse fail.
    pub fn from_ascriptions(
        arena: &ExprArena,
        attributes: impl IntoIterator<Item = ExprId>,
        module: &str,
        sink: &dyn DiagnosticSink,
    ) -> Option<AttributeFlags> {
        let mut flags = AttributeFlags::default();
        let mut duplicated = false;
        for id in attributes {
            let node = arena.get(id);
            let Some(kind) = AttributeKind::from_opcode(node.opcode()) else {
                // parser recovery node; already reported
                continue;
            };
            if flags.contains(kind) {
                sink.report(
                    Diagnostic::error(format!("duplicate attribute `{kind}`"))
                        .with_span(node.span())
                        .with_module(module),
                );
                duplicated = true;
            } else {
                flags.set(kind);
            }
        }
        if duplicated {
            None
        } else {
            Some(flags)
        }
    }
}

impl Debug for AttributeFlags {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let mut set = f.debug_set();
        for kind in AttributeKind::iter() {
            if self.contains(kind) {
                set.entry(&kind);
            }
        }
        set.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use umbra_tokens::Span;

    #[derive(Default)]
    struct TestSink(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for TestSink {
        fn report(&self, diagnostic: Diagnostic) {
            self.0.lock().unwrap().push(diagnostic);
        }
    }

    fn attrs(arena: &mut ExprArena, opcodes: &[Opcode]) -> Vec<ExprId> {
        opcodes
            .iter()
            .map(|&op| arena.make_operation(op, Span::empty(0)))
            .collect()
    }

    #[test]
    fn test_distinct_attributes_collapse() {
        let mut arena = ExprArena::new();
        let ids = attrs(&mut arena, &[Opcode::Export, Opcode::Mutable]);
        let sink = TestSink::default();
        let flags = AttributeFlags::from_ascriptions(&arena, ids, "m", &sink).unwrap();
        assert!(flags.contains(AttributeKind::Export));
        assert!(flags.contains(AttributeKind::Mutable));
        assert!(!flags.contains(AttributeKind::Inline));
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_attribute_fails_with_one_diagnostic() {
        let mut arena = ExprArena::new();
        let ids = attrs(&mut arena, &[Opcode::Export, Opcode::Export]);
        let sink = TestSink::default();
        assert!(AttributeFlags::from_ascriptions(&arena, ids, "m", &sink).is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_each_repetition_gets_its_own_diagnostic() {
        let mut arena = ExprArena::new();
        let ids = attrs(
            &mut arena,
            &[Opcode::Inline, Opcode::Inline, Opcode::Inline],
        );
        let sink = TestSink::default();
        assert!(AttributeFlags::from_ascriptions(&arena, ids, "m", &sink).is_none());
        assert_eq!(sink.0.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_union_merges() {
        let mut a = AttributeFlags::default();
        a.set(AttributeKind::Private);
        let mut b = AttributeFlags::default();
        b.set(AttributeKind::Volatile);
        let merged = a.union(b);
        assert!(merged.contains(AttributeKind::Private));
        assert!(merged.contains(AttributeKind::Volatile));
        assert!(!merged.is_empty());
    }
}
