//! The opcode set.
//!
//! Literal opcodes come first; everything at or past [Opcode::Placeholder] is
//! an operation and may carry branches. The full language defines many more
//! operation opcodes than listed here; this set covers every construct the
//! front-end pipeline dispatches on.

use std::fmt::{Display, Formatter};

/// The discriminator tag identifying what an [crate::Expr] represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Opcode {
    // literal opcodes; these never have branches
    Identifier,
    Integer,
    Real,
    String,
    Codeunit,

    // operation opcodes
    /// synthesized by the parser when recovery discards a malformed construct
    Placeholder,

    // structural
    /// horned form: first branch is the head, the rest are arguments
    Call,
    /// cloven form: all branches are elements
    Tuple,
    Index,
    Member,
    /// an interpolated string: alternating text fragments and splices
    Interpolate,
    Splice,
    /// accumulated attribute keywords ascribing the last branch
    Ascribe,
    /// a `{:` … `:}` statement scope
    Scope,

    // attribute keywords
    Mutable,
    Volatile,
    Private,
    Export,
    Inline,
    External,
    Threadlocal,

    // arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Modulo,
    Negate,

    // bitwise
    BitAnd,
    BitOr,
    BitXor,
    BitNot,
    ShiftLeft,
    ShiftRight,

    // logical
    And,
    Or,
    Not,

    // comparison
    Equal,
    NotEqual,
    Less,
    Greater,
    LessEqual,
    GreaterEqual,

    // assignment
    Assign,
    AddAssign,
    SubtractAssign,
    MultiplyAssign,
    DivideAssign,
    ModuloAssign,

    // ambiguous spellings, rewritten by the situator
    /// `-` before disambiguation: [Opcode::Subtract] or [Opcode::Negate]
    Dash,
    /// `*` before disambiguation: [Opcode::Multiply] or [Opcode::PointerType]
    Star,
    /// `&` before disambiguation: [Opcode::BitAnd] or [Opcode::ReferenceType]
    Amp,
    /// `^` before disambiguation: [Opcode::BitXor] or [Opcode::Dereference]
    Caret,

    // type constructors
    PointerType,
    ReferenceType,
    ArrayType,
    SliceType,
    Dereference,
    /// a deferred type, assigned during resolution
    Inference,

    // compile-time layout constants
    AddressSize,
    AddressDepth,
    BitsPerByte,

    // declarations
    Object,
    Procedure,
    Variable,
    Alias,
    Table,
    Label,
    EntryPoint,
    AnonymousFunction,
    Import,
    Use,

    // control
    If,
    While,
    For,
    Switch,
    Case,
    Return,
    Jump,
}

impl Opcode {
    /// Whether this opcode is a literal. Literal expressions never have a
    /// branch.
    pub fn is_literal(&self) -> bool {
        *self < Opcode::Placeholder
    }

    /// Whether this opcode is an operation and may carry branches.
    pub fn is_operation(&self) -> bool {
        !self.is_literal()
    }

    /// Whether this opcode declares a name into the containing scope.
    pub fn is_declaration(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Object
                | Procedure
                | Variable
                | Alias
                | Table
                | Label
                | EntryPoint
                | Import
                | Use
        )
    }

    /// Whether this opcode is an attribute keyword.
    pub fn is_attribute(&self) -> bool {
        use Opcode::*;
        matches!(
            self,
            Mutable | Volatile | Private | Export | Inline | External | Threadlocal
        )
    }

    /// Whether the situator may still rewrite this opcode.
    pub fn is_ambiguous(&self) -> bool {
        matches!(
            self,
            Opcode::Dash | Opcode::Star | Opcode::Amp | Opcode::Caret
        )
    }

    /// Every opcode, in declaration order. Used to build dispatch tables and
    /// to test predicates exhaustively.
    pub fn all() -> &'static [Opcode] {
        use Opcode::*;
        &[
            Identifier, Integer, Real, String, Codeunit, Placeholder, Call, Tuple, Index, Member,
            Interpolate, Splice, Ascribe, Scope, Mutable, Volatile, Private, Export, Inline,
            External, Threadlocal, Add, Subtract, Multiply, Divide, Modulo, Negate, BitAnd, BitOr,
            BitXor, BitNot, ShiftLeft, ShiftRight, And, Or, Not, Equal, NotEqual, Less, Greater,
            LessEqual, GreaterEqual, Assign, AddAssign, SubtractAssign, MultiplyAssign,
            DivideAssign, ModuloAssign, Dash, Star, Amp, Caret, PointerType, ReferenceType,
            ArrayType, SliceType, Dereference, Inference, AddressSize, AddressDepth, BitsPerByte,
            Object, Procedure, Variable, Alias, Table, Label, EntryPoint, AnonymousFunction,
            Import, Use, If, While, For, Switch, Case, Return, Jump,
        ]
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}
