//! Per-module semantic entities.
//!
//! Every entity kind lives in its own `Vec` arena inside [EntityArenas] and is
//! addressed by a typed id newtype. Expression nodes point back at entities
//! through the untyped `EntityRef` payload; the typed ids convert to and from
//! it at the arena boundary.

use crate::attributes::AttributeFlags;
use crate::scope::ScopeId;
use crate::symbol::{Signature, Symbol};
use umbra_ast::{EntityRef, ExprId};

macro_rules! entity_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub struct $name(u32);

        impl $name {
            pub fn index(&self) -> usize {
                self.0 as usize
            }

            pub fn entity_ref(&self) -> EntityRef {
                EntityRef(self.0)
            }
        }

        impl From<EntityRef> for $name {
            fn from(value: EntityRef) -> Self {
                Self(value.0)
            }
        }
    };
}

entity_id!(ObjectId);
entity_id!(ProcedureId);
entity_id!(ProcedureGroupId);
entity_id!(AliasId);
entity_id!(VariableId);
entity_id!(TableId);
entity_id!(LabelId);
entity_id!(FunctionId);

/// An `object` declaration and its member scope.
#[derive(Debug)]
pub struct Object {
    pub name: String,
    pub declaration: ExprId,
    pub scope: ScopeId,
    pub flags: AttributeFlags,
}

/// One `proc` or `entry` declaration.
#[derive(Debug)]
pub struct Procedure {
    pub name: String,
    pub declaration: ExprId,
    /// The scope holding the parameters and body statements.
    pub scope: ScopeId,
    /// Parameter variables in declaration order.
    pub params: Vec<VariableId>,
    pub signature: Signature,
    pub flags: AttributeFlags,
    pub entry_point: bool,
}

/// All procedures sharing one declared name; overloads attach here.
#[derive(Debug)]
pub struct NamedProcedureGroup {
    pub name: String,
    pub procedures: Vec<ProcedureId>,
}

#[derive(Debug)]
pub struct Alias {
    pub name: String,
    pub declaration: ExprId,
    /// The scope the alias was declared in; resolution starts here.
    pub scope: ScopeId,
    pub symbol: Symbol,
    pub flags: AttributeFlags,
}

#[derive(Debug)]
pub struct Variable {
    pub name: String,
    pub declaration: ExprId,
    pub scope: ScopeId,
    pub symbol: Symbol,
    pub flags: AttributeFlags,
}

#[derive(Debug)]
pub struct Table {
    pub name: String,
    pub declaration: ExprId,
    pub scope: ScopeId,
    pub flags: AttributeFlags,
}

#[derive(Debug)]
pub struct Label {
    pub name: String,
    pub declaration: ExprId,
}

/// An anonymous `(> … <)` function expression.
#[derive(Debug)]
pub struct AnonymousFunction {
    pub declaration: ExprId,
    pub scope: ScopeId,
    pub params: Vec<VariableId>,
    pub signature: Signature,
}

macro_rules! arena_accessors {
    ($add:ident, $get:ident, $get_mut:ident, $iter:ident, $field:ident, $ty:ty, $id:ident) => {
        pub fn $add(&mut self, entity: $ty) -> $id {
            let id = $id(self.$field.len() as u32);
            self.$field.push(entity);
            id
        }

        pub fn $get(&self, id: $id) -> &$ty {
            &self.$field[id.index()]
        }

        pub fn $get_mut(&mut self, id: $id) -> &mut $ty {
            &mut self.$field[id.index()]
        }

        pub fn $iter(&self) -> impl Iterator<Item = ($id, &$ty)> {
            self.$field
                .iter()
                .enumerate()
                .map(|(i, e)| ($id(i as u32), e))
        }
    };
}

/// Owns every semantic entity of one module.
#[derive(Debug, Default)]
pub struct EntityArenas {
    objects: Vec<Object>,
    procedures: Vec<Procedure>,
    groups: Vec<NamedProcedureGroup>,
    aliases: Vec<Alias>,
    variables: Vec<Variable>,
    tables: Vec<Table>,
    labels: Vec<Label>,
    functions: Vec<AnonymousFunction>,
}

impl EntityArenas {
    pub fn new() -> Self {
        Self::default()
    }

    arena_accessors!(add_object, object, object_mut, objects, objects, Object, ObjectId);
    arena_accessors!(
        add_procedure,
        procedure,
        procedure_mut,
        procedures,
        procedures,
        Procedure,
        ProcedureId
    );
    arena_accessors!(
        add_group,
        group,
        group_mut,
        groups,
        groups,
        NamedProcedureGroup,
        ProcedureGroupId
    );
    arena_accessors!(add_alias, alias, alias_mut, aliases, aliases, Alias, AliasId);
    arena_accessors!(
        add_variable,
        variable,
        variable_mut,
        variables,
        variables,
        Variable,
        VariableId
    );
    arena_accessors!(add_table, table, table_mut, tables, tables, Table, TableId);
    arena_accessors!(add_label, label, label_mut, labels, labels, Label, LabelId);
    arena_accessors!(
        add_function,
        function,
        function_mut,
        functions,
        functions,
        AnonymousFunction,
        FunctionId
    );
}
