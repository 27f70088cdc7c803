//! Expression payloads.
//!
//! The payload of an [crate::Expr] depends on its opcode: literal text, a
//! parsed integer, or a back-reference into one of the semantic arenas.
//! [ExprData::legal_for] is the pure legality predicate mirrored by the
//! situator's tables; it is checked on every payload assignment.

use crate::opcode::Opcode;

/// An untyped index into one of the per-module entity arenas.
///
/// The semantic crates wrap this in typed ids; the AST only records which
/// arena the reference targets via the [ExprData] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityRef(pub u32);

/// The tagged payload of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprData {
    /// identifier or string text
    Text(String),
    /// parsed integer value
    Int(u64),
    /// parsed codeunit value
    Unit(u32),
    /// the scope a statement scope introduced
    Scope(EntityRef),
    Object(EntityRef),
    Procedure(EntityRef),
    Label(EntityRef),
    Alias(EntityRef),
    Variable(EntityRef),
    Function(EntityRef),
}

impl ExprData {
    /// Whether this payload variant is legal for the given opcode.
    pub fn legal_for(&self, opcode: Opcode) -> bool {
        use Opcode::*;
        match self {
            ExprData::Text(_) => matches!(opcode, Identifier | String),
            ExprData::Int(_) => matches!(opcode, Integer | Real),
            ExprData::Unit(_) => matches!(opcode, Codeunit),
            ExprData::Scope(_) => matches!(opcode, Scope | Object | Table | Procedure),
            ExprData::Object(_) => matches!(opcode, Object),
            ExprData::Procedure(_) => matches!(opcode, Procedure | EntryPoint),
            ExprData::Label(_) => matches!(opcode, Label | Jump),
            ExprData::Alias(_) => matches!(opcode, Alias),
            ExprData::Variable(_) => matches!(opcode, Variable),
            ExprData::Function(_) => matches!(opcode, AnonymousFunction),
        }
    }
}
