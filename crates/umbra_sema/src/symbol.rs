//! Canonical symbols produced by resolution.
//!
//! A [Symbol] is a chain of [SubSymbol] modifiers (outermost first) over a
//! [RootSymbol]. A [Signature] is the symbol shape of a procedure. Both start
//! out empty when their entity is tabulated and are frozen by the resolver.

use crate::attributes::AttributeFlags;
use crate::entity::{AliasId, ObjectId, ProcedureGroupId, TableId, VariableId};
use itertools::Itertools;
use std::fmt::{Display, Formatter};

/// The innermost component of a symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootSymbol {
    SignedInteger(u32),
    UnsignedInteger(u32),
    Real(u32),
    Codeunit(u32),
    Boolean,
    Nothing,
    Object(ObjectId),
    Table(TableId),
    ProcedureGroup(ProcedureGroupId),
    Alias(AliasId),
    Variable(VariableId),
    /// A symbol exported by another module.
    External { module: String, name: String },
    /// Deferred until inference; left in place by the resolver.
    Inference,
    /// The not-yet-resolved sentinel every symbol starts with.
    None,
    /// Resolution failed; a diagnostic was already reported.
    Error,
}

impl RootSymbol {
    /// Parses a primitive spelling: `s32`, `u8`, `r64`, `c8`, `bool`,
    /// `nothing`. Width-carrying primitives demand a nonzero decimal width.
    pub fn from_primitive_name(name: &str) -> Option<RootSymbol> {
        match name {
            "bool" => return Some(RootSymbol::Boolean),
            "nothing" => return Some(RootSymbol::Nothing),
            _ => {}
        }
        if name.len() < 2 || !name.is_ascii() {
            return None;
        }
        let (prefix, width) = name.split_at(1);
        let width: u32 = width.parse().ok().filter(|w| *w > 0)?;
        Some(match prefix {
            "s" => RootSymbol::SignedInteger(width),
            "u" => RootSymbol::UnsignedInteger(width),
            "r" => RootSymbol::Real(width),
            "c" => RootSymbol::Codeunit(width),
            _ => return None,
        })
    }
}

impl Display for RootSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            RootSymbol::SignedInteger(w) => write!(f, "s{w}"),
            RootSymbol::UnsignedInteger(w) => write!(f, "u{w}"),
            RootSymbol::Real(w) => write!(f, "r{w}"),
            RootSymbol::Codeunit(w) => write!(f, "c{w}"),
            RootSymbol::Boolean => write!(f, "bool"),
            RootSymbol::Nothing => write!(f, "nothing"),
            RootSymbol::Object(id) => write!(f, "object#{}", id.index()),
            RootSymbol::Table(id) => write!(f, "table#{}", id.index()),
            RootSymbol::ProcedureGroup(id) => write!(f, "proc#{}", id.index()),
            RootSymbol::Alias(id) => write!(f, "alias#{}", id.index()),
            RootSymbol::Variable(id) => write!(f, "var#{}", id.index()),
            RootSymbol::External { module, name } => write!(f, "{module}::{name}"),
            RootSymbol::Inference => write!(f, "_"),
            RootSymbol::None => write!(f, "<none>"),
            RootSymbol::Error => write!(f, "<error>"),
        }
    }
}

/// One modifier layer of a symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubSymbolKind {
    Pointer,
    Reference,
    Array(u64),
    Slice,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubSymbol {
    pub kind: SubSymbolKind,
    pub flags: AttributeFlags,
}

impl SubSymbol {
    pub fn new(kind: SubSymbolKind) -> Self {
        Self {
            kind,
            flags: AttributeFlags::default(),
        }
    }
}

impl Display for SubSymbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            SubSymbolKind::Pointer => write!(f, "*"),
            SubSymbolKind::Reference => write!(f, "&"),
            SubSymbolKind::Array(n) => write!(f, "[{n}]"),
            SubSymbolKind::Slice => write!(f, "[]"),
        }
    }
}

/// A resolved type: modifiers outermost-first over a root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    root: RootSymbol,
    subs: Vec<SubSymbol>,
    erroneous: bool,
}

impl Symbol {
    /// The unresolved sentinel.
    pub fn empty() -> Self {
        Self {
            root: RootSymbol::None,
            subs: Vec::new(),
            erroneous: false,
        }
    }

    pub fn new(root: RootSymbol) -> Self {
        let erroneous = root == RootSymbol::Error;
        Self {
            root,
            subs: Vec::new(),
            erroneous,
        }
    }

    pub fn with_subs(root: RootSymbol, subs: Vec<SubSymbol>) -> Self {
        let erroneous = root == RootSymbol::Error;
        Self {
            root,
            subs,
            erroneous,
        }
    }

    pub fn root(&self) -> &RootSymbol {
        &self.root
    }

    pub fn subs(&self) -> &[SubSymbol] {
        &self.subs
    }

    /// Whether this symbol is still the unresolved sentinel.
    pub fn is_empty(&self) -> bool {
        self.root == RootSymbol::None && self.subs.is_empty()
    }

    /// Marks the symbol as damaged while keeping its structure.
    pub fn mark_error(&mut self) {
        self.erroneous = true;
    }

    pub fn is_error(&self) -> bool {
        self.erroneous
    }
}

impl Display for Symbol {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for sub in &self.subs {
            write!(f, "{sub}")?;
        }
        write!(f, "{}", self.root)
    }
}

/// The resolved shape of a procedure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    params: Vec<Symbol>,
    ret: Symbol,
}

impl Signature {
    pub fn empty() -> Self {
        Self {
            params: Vec::new(),
            ret: Symbol::empty(),
        }
    }

    pub fn new(params: Vec<Symbol>, ret: Symbol) -> Self {
        Self { params, ret }
    }

    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    pub fn ret(&self) -> &Symbol {
        &self.ret
    }

    /// Whether resolution has not yet produced this signature.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty() && self.ret.is_empty()
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "({}) -> {}",
            self.params.iter().map(|p| p.to_string()).join(", "),
            self.ret
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_names() {
        assert_eq!(
            RootSymbol::from_primitive_name("s32"),
            Some(RootSymbol::SignedInteger(32))
        );
        assert_eq!(
            RootSymbol::from_primitive_name("u8"),
            Some(RootSymbol::UnsignedInteger(8))
        );
        assert_eq!(
            RootSymbol::from_primitive_name("r64"),
            Some(RootSymbol::Real(64))
        );
        assert_eq!(
            RootSymbol::from_primitive_name("bool"),
            Some(RootSymbol::Boolean)
        );
        assert_eq!(RootSymbol::from_primitive_name("s0"), None);
        assert_eq!(RootSymbol::from_primitive_name("x32"), None);
        assert_eq!(RootSymbol::from_primitive_name("s"), None);
    }

    #[test]
    fn test_symbol_display_is_outermost_first() {
        let symbol = Symbol::with_subs(
            RootSymbol::SignedInteger(32),
            vec![
                SubSymbol::new(SubSymbolKind::Pointer),
                SubSymbol::new(SubSymbolKind::Array(4)),
            ],
        );
        assert_eq!(symbol.to_string(), "*[4]s32");
    }

    #[test]
    fn test_empty_until_frozen() {
        let mut symbol = Symbol::empty();
        assert!(symbol.is_empty());
        assert!(!symbol.is_error());
        symbol.mark_error();
        assert!(symbol.is_error());

        let signature = Signature::empty();
        assert!(signature.is_empty());
        let frozen = Signature::new(vec![], Symbol::new(RootSymbol::Nothing));
        assert!(!frozen.is_empty());
    }
}
