//! Situations: the grammatical role a node plays inside its parent.
//!
//! Legality of an opcode in a situation is a data-driven table built once at
//! startup from per-situation predicates, so the whole matrix is testable by
//! iterating [Situation] against [Opcode::all] without touching the situator.

use strum::IntoEnumIterator;
use umbra_ast::Opcode;

/// The role a branch position demands of the node occupying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter, strum::Display)]
pub enum Situation {
    /// The module root node itself.
    Module,
    /// A statement directly inside the module root scope.
    RootStatement,
    /// A statement inside an object body.
    ObjectStatement,
    /// A statement inside a procedure or block scope.
    LocalStatement,
    /// The left side of an assignment.
    Destination,
    /// A general value.
    Value,
    /// A value in a position that admits no declarations, e.g. a condition.
    MatteValue,
    /// An operand of a logical junction (`&&`, `||`, `!`).
    Junction,
    /// A type.
    Symbol,
    /// A procedure's declared return type.
    ReturnSymbol,
    /// An array length or other compile-time count.
    ElementCount,
    /// The name slot of a declaration.
    DeclarationName,
    /// The name slot of a member access.
    MemberName,
    /// An element of a tuple or argument list.
    PositionalField,
    /// An entry of a table body.
    NamedField,
    /// A text fragment of an interpolated string.
    StringFragment,
    /// A spliced value of an interpolated string.
    SpliceValue,
    /// One attribute keyword of an ascription.
    AttributeItem,
    /// The body slot of an object declaration.
    ObjectBody,
    /// The parameter tuple slot of a procedure.
    ParameterList,
    /// One declared parameter.
    Parameter,
    /// The body slot of a procedure, loop, or conditional.
    ScopeBody,
    /// The capture tuple slot of an anonymous function.
    CaptureList,
    /// One declared capture.
    Capture,
    /// The entry tuple slot of a table declaration.
    TableBody,
    /// The `else` slot of a conditional: a scope or a chained `if`.
    Alternate,
    /// A member of a switch body.
    SwitchMember,
    /// The matched value of a case.
    CaseValue,
    /// The label slot of a jump.
    JumpTarget,
    /// The module slot of an import.
    ImportTarget,
}

fn is_value(op: Opcode) -> bool {
    use Opcode::*;
    op.is_literal()
        || op.is_ambiguous()
        || matches!(
            op,
            Call | Tuple
                | Index
                | Member
                | Interpolate
                | Add
                | Subtract
                | Multiply
                | Divide
                | Modulo
                | Negate
                | BitAnd
                | BitOr
                | BitXor
                | BitNot
                | ShiftLeft
                | ShiftRight
                | And
                | Or
                | Not
                | Equal
                | NotEqual
                | Less
                | Greater
                | LessEqual
                | GreaterEqual
                | Dereference
                | AddressSize
                | AddressDepth
                | BitsPerByte
                | AnonymousFunction
        )
}

fn is_symbol(op: Opcode) -> bool {
    use Opcode::*;
    matches!(
        op,
        Identifier
            | Member
            | PointerType
            | ReferenceType
            | ArrayType
            | SliceType
            | Inference
            | Ascribe
            | Star
            | Amp
    )
}

/// Whether `opcode` may occupy a position demanding `situation`.
///
/// [Opcode::Placeholder] is legal everywhere so parser recovery never
/// cascades into situator noise.
fn legal(situation: Situation, op: Opcode) -> bool {
    use Opcode::*;
    if op == Placeholder {
        return true;
    }
    match situation {
        Situation::Module => op == Scope,
        Situation::RootStatement => matches!(
            op,
            Object
                | Procedure
                | EntryPoint
                | Variable
                | Alias
                | Table
                | Import
                | Use
                | Ascribe
        ),
        Situation::ObjectStatement => {
            matches!(op, Object | Procedure | Variable | Alias | Table | Ascribe)
        }
        Situation::LocalStatement => {
            is_value(op)
                || matches!(
                    op,
                    Variable
                        | Alias
                        | Label
                        | Scope
                        | Ascribe
                        | If
                        | While
                        | For
                        | Switch
                        | Return
                        | Jump
                        | Assign
                        | AddAssign
                        | SubtractAssign
                        | MultiplyAssign
                        | DivideAssign
                        | ModuloAssign
                )
        }
        Situation::Destination => {
            matches!(op, Identifier | Member | Index | Dereference | Caret)
        }
        Situation::Value
        | Situation::MatteValue
        | Situation::Junction
        | Situation::PositionalField
        | Situation::NamedField
        | Situation::CaseValue
        | Situation::ElementCount => is_value(op),
        // the parser wraps every interpolation splice in a Splice node
        Situation::SpliceValue => op == Splice,
        Situation::Symbol | Situation::ReturnSymbol => is_symbol(op),
        Situation::DeclarationName | Situation::MemberName => op == Identifier,
        Situation::StringFragment => op == String,
        Situation::AttributeItem => op.is_attribute(),
        Situation::ObjectBody | Situation::ScopeBody => op == Scope,
        Situation::ParameterList | Situation::CaptureList | Situation::TableBody => op == Tuple,
        Situation::Parameter | Situation::Capture => op == Variable,
        Situation::Alternate => matches!(op, Scope | If),
        Situation::SwitchMember => op == Case,
        Situation::JumpTarget | Situation::ImportTarget => op == Identifier,
    }
}

const OPCODE_COUNT: usize = 128;

/// The `(situation, opcode) -> legal` matrix, built once at startup.
pub struct SituationTable {
    rows: Vec<u128>,
}

impl SituationTable {
    pub fn build() -> Self {
        let mut rows = Vec::new();
        for situation in Situation::iter() {
            let mut row = 0u128;
            for &op in Opcode::all() {
                debug_assert!((op as usize) < OPCODE_COUNT);
                if legal(situation, op) {
                    row |= 1 << (op as usize);
                }
            }
            debug_assert_eq!(rows.len(), situation as usize);
            rows.push(row);
        }
        Self { rows }
    }

    pub fn legal(&self, situation: Situation, opcode: Opcode) -> bool {
        self.rows[situation as usize] & (1 << (opcode as usize)) != 0
    }
}

/// The situation `opcode` demands of its `index`th branch, given the
/// situation `own` the node itself occupies and its branch `count`.
pub fn branch_situation(opcode: Opcode, own: Situation, index: usize, count: usize) -> Situation {
    use Opcode::*;
    match opcode {
        Scope => match own {
            Situation::Module => Situation::RootStatement,
            Situation::ObjectBody => Situation::ObjectStatement,
            _ => Situation::LocalStatement,
        },
        Tuple => match own {
            Situation::ParameterList => Situation::Parameter,
            Situation::CaptureList => Situation::Capture,
            Situation::TableBody => Situation::NamedField,
            _ => Situation::PositionalField,
        },
        Ascribe => {
            if index + 1 == count {
                // the ascribed construct plays the ascription's own role
                own
            } else {
                Situation::AttributeItem
            }
        }
        Call | Index => {
            if index == 0 {
                Situation::Value
            } else {
                Situation::PositionalField
            }
        }
        Member => {
            if index == 0 {
                Situation::Value
            } else {
                Situation::MemberName
            }
        }
        Interpolate => {
            if index % 2 == 0 {
                Situation::StringFragment
            } else {
                Situation::SpliceValue
            }
        }
        Splice => Situation::Value,
        And | Or | Not => Situation::Junction,
        Assign | AddAssign | SubtractAssign | MultiplyAssign | DivideAssign | ModuloAssign => {
            if index == 0 {
                Situation::Destination
            } else {
                Situation::Value
            }
        }
        PointerType | ReferenceType | SliceType => Situation::Symbol,
        ArrayType => {
            if index == 0 {
                Situation::ElementCount
            } else {
                Situation::Symbol
            }
        }
        Object => {
            if index == 0 {
                Situation::DeclarationName
            } else {
                Situation::ObjectBody
            }
        }
        Procedure | EntryPoint => match index {
            0 => Situation::DeclarationName,
            1 => Situation::ParameterList,
            2 => Situation::ReturnSymbol,
            _ => Situation::ScopeBody,
        },
        Variable => match index {
            0 => Situation::DeclarationName,
            1 => Situation::Symbol,
            _ => Situation::Value,
        },
        Alias => {
            if index == 0 {
                Situation::DeclarationName
            } else {
                Situation::Symbol
            }
        }
        Table => {
            if index == 0 {
                Situation::DeclarationName
            } else {
                Situation::TableBody
            }
        }
        Label | For if index == 0 => Situation::DeclarationName,
        For => {
            if index == 1 {
                Situation::Value
            } else {
                Situation::ScopeBody
            }
        }
        AnonymousFunction => {
            if index == 0 {
                Situation::CaptureList
            } else {
                Situation::ScopeBody
            }
        }
        Import => Situation::ImportTarget,
        Use => Situation::ImportTarget,
        If => match index {
            0 => Situation::MatteValue,
            1 => Situation::ScopeBody,
            _ => Situation::Alternate,
        },
        While => {
            if index == 0 {
                Situation::MatteValue
            } else {
                Situation::ScopeBody
            }
        }
        Switch => {
            if index == 0 {
                Situation::MatteValue
            } else {
                Situation::SwitchMember
            }
        }
        Case => {
            if index == 0 {
                Situation::CaseValue
            } else {
                Situation::ScopeBody
            }
        }
        Return => Situation::Value,
        Jump => Situation::JumpTarget,
        _ => Situation::Value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_matches_predicates_exhaustively() {
        let table = SituationTable::build();
        for situation in Situation::iter() {
            for &op in Opcode::all() {
                assert_eq!(
                    table.legal(situation, op),
                    legal(situation, op),
                    "{situation} / {op}"
                );
            }
        }
    }

    #[test]
    fn test_placeholder_is_legal_everywhere() {
        let table = SituationTable::build();
        for situation in Situation::iter() {
            assert!(table.legal(situation, Opcode::Placeholder), "{situation}");
        }
    }

    #[test]
    fn test_declarations_are_not_values() {
        let table = SituationTable::build();
        for op in [Opcode::Variable, Opcode::Object, Opcode::Import] {
            assert!(!table.legal(Situation::Value, op), "{op}");
            assert!(!table.legal(Situation::MatteValue, op), "{op}");
        }
    }

    #[test]
    fn test_entry_point_is_root_only() {
        let table = SituationTable::build();
        assert!(table.legal(Situation::RootStatement, Opcode::EntryPoint));
        assert!(!table.legal(Situation::ObjectStatement, Opcode::EntryPoint));
        assert!(!table.legal(Situation::LocalStatement, Opcode::EntryPoint));
    }

    #[test]
    fn test_interpolation_alternates() {
        assert_eq!(
            branch_situation(Opcode::Interpolate, Situation::Value, 0, 5),
            Situation::StringFragment
        );
        assert_eq!(
            branch_situation(Opcode::Interpolate, Situation::Value, 1, 5),
            Situation::SpliceValue
        );
    }

    #[test]
    fn test_ascribe_forwards_its_own_situation_to_the_last_branch() {
        assert_eq!(
            branch_situation(Opcode::Ascribe, Situation::RootStatement, 2, 3),
            Situation::RootStatement
        );
        assert_eq!(
            branch_situation(Opcode::Ascribe, Situation::RootStatement, 1, 3),
            Situation::AttributeItem
        );
    }

    #[test]
    fn test_scope_statements_depend_on_context() {
        assert_eq!(
            branch_situation(Opcode::Scope, Situation::Module, 0, 1),
            Situation::RootStatement
        );
        assert_eq!(
            branch_situation(Opcode::Scope, Situation::ObjectBody, 0, 1),
            Situation::ObjectStatement
        );
        assert_eq!(
            branch_situation(Opcode::Scope, Situation::ScopeBody, 0, 1),
            Situation::LocalStatement
        );
    }
}
