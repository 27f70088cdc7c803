//! The tabulator: declaration collection into scopes and entity arenas.
//!
//! Walks a situated tree, creates an entity per declaration, and registers
//! declared names into their scope. Runs to completion for every module
//! before any resolution starts, so forward and cross-module references find
//! their entries.

use crate::attributes::{AttributeFlags, AttributeKind};
use crate::entity::{
    Alias, AnonymousFunction, EntityArenas, Label, NamedProcedureGroup, Object, Procedure, Table,
    Variable, VariableId,
};
use crate::scope::{ScopeArena, ScopeEntry, ScopeId, ScopeOwner};
use crate::symbol::{Signature, Symbol};
use log::trace;
use umbra_ast::{EntityRef, ExprArena, ExprData, ExprId, Opcode};
use umbra_tokens::{Diagnostic, DiagnosticSink, Spanned};

/// Collects declarations of a situated module tree. Returns the module root
/// scope and whether tabulation was free of errors.
pub fn tabulate(
    exprs: &mut ExprArena,
    root: ExprId,
    scopes: &mut ScopeArena,
    entities: &mut EntityArenas,
    module: &str,
    sink: &dyn DiagnosticSink,
) -> (ScopeId, bool) {
    let mut tabulator = Tabulator {
        exprs,
        scopes,
        entities,
        module,
        sink,
        ok: true,
    };
    let root_scope = tabulator.scopes.push_scope(None, ScopeOwner::Module);
    tabulator.visit_scope(root, root_scope);
    trace!("tabulated {module}, ok={}", tabulator.ok);
    (root_scope, tabulator.ok)
}

struct Tabulator<'a> {
    exprs: &'a mut ExprArena,
    scopes: &'a mut ScopeArena,
    entities: &'a mut EntityArenas,
    module: &'a str,
    sink: &'a dyn DiagnosticSink,
    ok: bool,
}

impl<'a> Tabulator<'a> {
    fn error(&mut self, message: String, id: ExprId) {
        self.ok = false;
        self.sink.report(
            Diagnostic::error(message)
                .with_span(self.exprs.get(id).span())
                .with_module(self.module),
        );
    }

    /// The declared name, when it is a plain identifier. Parser recovery
    /// placeholders are skipped silently; anything else is a computed name.
    fn declared_name(&mut self, name: ExprId) -> Option<String> {
        let node = self.exprs.get(name);
        match node.opcode() {
            Opcode::Identifier => Some(node.text().expect("identifier carries text").to_string()),
            Opcode::Placeholder => None,
            _ => {
                self.error(
                    "computed declaration names are not supported".to_string(),
                    name,
                );
                None
            }
        }
    }

    fn register(&mut self, scope: ScopeId, name: &str, entry: ScopeEntry, export: bool, at: ExprId) {
        let result = if export {
            self.scopes.add_symbol(scope, name, entry)
        } else {
            self.scopes.add_internal_symbol(scope, name, entry)
        };
        if let Err(duplicate) = result {
            self.error(duplicate.to_string(), at);
        }
    }

    fn visit_scope(&mut self, scope_expr: ExprId, scope: ScopeId) {
        self.exprs
            .set_data(scope_expr, ExprData::Scope(EntityRef(scope.index() as u32)));
        let statements: Vec<ExprId> = self.exprs.branches(scope_expr).collect();
        for statement in statements {
            self.visit_statement(statement, scope, AttributeFlags::default());
        }
    }

    fn visit_statement(&mut self, stmt: ExprId, scope: ScopeId, flags: AttributeFlags) {
        match self.exprs.get(stmt).opcode() {
            Opcode::Ascribe => {
                let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
                let Some((&target, attributes)) = branches.split_last() else {
                    return;
                };
                let collapsed = AttributeFlags::from_ascriptions(
                    self.exprs,
                    attributes.iter().copied(),
                    self.module,
                    self.sink,
                );
                if collapsed.is_none() {
                    self.ok = false;
                }
                self.visit_statement(target, scope, flags.union(collapsed.unwrap_or_default()));
            }
            Opcode::Variable => {
                self.tabulate_variable(stmt, scope, flags);
            }
            Opcode::Object => self.tabulate_object(stmt, scope, flags),
            Opcode::Procedure | Opcode::EntryPoint => self.tabulate_procedure(stmt, scope, flags),
            Opcode::Alias => self.tabulate_alias(stmt, scope, flags),
            Opcode::Table => self.tabulate_table(stmt, scope, flags),
            Opcode::Label => self.tabulate_label(stmt, scope),
            Opcode::Import => self.scopes.add_import(scope, stmt),
            Opcode::Use => {
                self.error("use declarations are not supported yet".to_string(), stmt);
            }
            Opcode::Scope => {
                let block = self.scopes.push_scope(Some(scope), ScopeOwner::Block(stmt));
                self.visit_scope(stmt, block);
            }
            Opcode::If => self.tabulate_if(stmt, scope),
            Opcode::While => {
                let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
                if let Some(&condition) = branches.first() {
                    self.visit_expr(condition, scope);
                }
                if let Some(&body) = branches.get(1) {
                    self.tabulate_body(body, scope, stmt);
                }
            }
            Opcode::For => self.tabulate_for(stmt, scope),
            Opcode::Switch => {
                let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
                if let Some(&scrutinee) = branches.first() {
                    self.visit_expr(scrutinee, scope);
                }
                for &case in branches.iter().skip(1) {
                    let case_branches: Vec<ExprId> = self.exprs.branches(case).collect();
                    if let Some(&value) = case_branches.first() {
                        self.visit_expr(value, scope);
                    }
                    if let Some(&body) = case_branches.get(1) {
                        self.tabulate_body(body, scope, case);
                    }
                }
            }
            Opcode::Return => {
                let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
                for value in branches {
                    self.visit_expr(value, scope);
                }
            }
            Opcode::Jump | Opcode::Placeholder => {}
            // expression statements, including assignments
            _ => self.visit_expr(stmt, scope),
        }
    }

    fn tabulate_if(&mut self, stmt: ExprId, scope: ScopeId) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        if let Some(&condition) = branches.first() {
            self.visit_expr(condition, scope);
        }
        if let Some(&body) = branches.get(1) {
            self.tabulate_body(body, scope, stmt);
        }
        if let Some(&alternate) = branches.get(2) {
            match self.exprs.get(alternate).opcode() {
                Opcode::If => self.tabulate_if(alternate, scope),
                Opcode::Scope => self.tabulate_body(alternate, scope, stmt),
                _ => {}
            }
        }
    }

    /// A control-flow body scope.
    fn tabulate_body(&mut self, body: ExprId, scope: ScopeId, owner: ExprId) {
        if self.exprs.get(body).opcode() != Opcode::Scope {
            return;
        }
        let block = self.scopes.push_scope(Some(scope), ScopeOwner::Block(owner));
        self.visit_scope(body, block);
    }

    fn tabulate_variable(
        &mut self,
        stmt: ExprId,
        scope: ScopeId,
        flags: AttributeFlags,
    ) -> Option<VariableId> {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let name = self.declared_name(*branches.first()?)?;
        let id = self.entities.add_variable(Variable {
            name: name.clone(),
            declaration: stmt,
            scope,
            symbol: Symbol::empty(),
            flags,
        });
        self.register(
            scope,
            &name,
            ScopeEntry::Variable(id),
            flags.contains(AttributeKind::Export),
            stmt,
        );
        self.exprs
            .set_data(stmt, ExprData::Variable(id.entity_ref()));
        if let Some(&initializer) = branches.get(2) {
            self.visit_expr(initializer, scope);
        }
        Some(id)
    }

    fn tabulate_object(&mut self, stmt: ExprId, scope: ScopeId, flags: AttributeFlags) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) else {
            return;
        };
        let id = self.entities.add_object(Object {
            name: name.clone(),
            declaration: stmt,
            scope,
            flags,
        });
        let body_scope = self
            .scopes
            .push_scope(Some(scope), ScopeOwner::Object(id));
        self.entities.object_mut(id).scope = body_scope;
        self.register(
            scope,
            &name,
            ScopeEntry::Object(id),
            flags.contains(AttributeKind::Export),
            stmt,
        );
        self.exprs.set_data(stmt, ExprData::Object(id.entity_ref()));
        if let Some(&body) = branches.get(1) {
            if self.exprs.get(body).opcode() == Opcode::Scope {
                self.visit_scope(body, body_scope);
            }
        }
    }

    fn tabulate_procedure(&mut self, stmt: ExprId, scope: ScopeId, flags: AttributeFlags) {
        let entry_point = self.exprs.get(stmt).opcode() == Opcode::EntryPoint;
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) else {
            return;
        };
        let id = self.entities.add_procedure(Procedure {
            name: name.clone(),
            declaration: stmt,
            scope,
            params: Vec::new(),
            signature: Signature::empty(),
            flags,
            entry_point,
        });
        let inner = self
            .scopes
            .push_scope(Some(scope), ScopeOwner::Procedure(id));
        self.entities.procedure_mut(id).scope = inner;

        // overloads attach to the named group; any other entry is a clash
        match self.scopes.lookup_internal(scope, &name) {
            ScopeEntry::None => {
                let group = self.entities.add_group(NamedProcedureGroup {
                    name: name.clone(),
                    procedures: vec![id],
                });
                self.register(
                    scope,
                    &name,
                    ScopeEntry::Procedures(group),
                    flags.contains(AttributeKind::Export),
                    stmt,
                );
            }
            ScopeEntry::Procedures(group) => {
                self.entities.group_mut(group).procedures.push(id);
            }
            _ => {
                self.error(format!("multiple symbols with name `{name}`"), stmt);
            }
        }
        self.exprs
            .set_data(stmt, ExprData::Procedure(id.entity_ref()));

        if let Some(&params) = branches.get(1) {
            let param_exprs: Vec<ExprId> = self.exprs.branches(params).collect();
            for param in param_exprs {
                if self.exprs.get(param).opcode() != Opcode::Variable {
                    continue;
                }
                if let Some(vid) =
                    self.tabulate_variable(param, inner, AttributeFlags::default())
                {
                    self.entities.procedure_mut(id).params.push(vid);
                }
            }
        }
        if let Some(&body) = branches.get(3) {
            if self.exprs.get(body).opcode() == Opcode::Scope {
                self.visit_scope(body, inner);
            }
        }
    }

    fn tabulate_alias(&mut self, stmt: ExprId, scope: ScopeId, flags: AttributeFlags) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) else {
            return;
        };
        let id = self.entities.add_alias(Alias {
            name: name.clone(),
            declaration: stmt,
            scope,
            symbol: Symbol::empty(),
            flags,
        });
        self.register(
            scope,
            &name,
            ScopeEntry::Alias(id),
            flags.contains(AttributeKind::Export),
            stmt,
        );
        self.exprs.set_data(stmt, ExprData::Alias(id.entity_ref()));
    }

    fn tabulate_table(&mut self, stmt: ExprId, scope: ScopeId, flags: AttributeFlags) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) else {
            return;
        };
        let id = self.entities.add_table(Table {
            name: name.clone(),
            declaration: stmt,
            scope,
            flags,
        });
        let body_scope = self.scopes.push_scope(Some(scope), ScopeOwner::Table(id));
        self.entities.table_mut(id).scope = body_scope;
        self.register(
            scope,
            &name,
            ScopeEntry::Table(id),
            flags.contains(AttributeKind::Export),
            stmt,
        );
        self.exprs
            .set_data(stmt, ExprData::Scope(EntityRef(body_scope.index() as u32)));
        if let Some(&entries) = branches.get(1) {
            let entry_exprs: Vec<ExprId> = self.exprs.branches(entries).collect();
            for entry in entry_exprs {
                self.visit_expr(entry, scope);
            }
        }
    }

    fn tabulate_label(&mut self, stmt: ExprId, scope: ScopeId) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) else {
            return;
        };
        let id = self.entities.add_label(Label {
            name: name.clone(),
            declaration: stmt,
        });
        self.register(scope, &name, ScopeEntry::Label(id), false, stmt);
        self.exprs.set_data(stmt, ExprData::Label(id.entity_ref()));
    }

    fn tabulate_for(&mut self, stmt: ExprId, scope: ScopeId) {
        let branches: Vec<ExprId> = self.exprs.branches(stmt).collect();
        if let Some(&sequence) = branches.get(1) {
            self.visit_expr(sequence, scope);
        }
        let Some(&body) = branches.get(2) else {
            return;
        };
        if self.exprs.get(body).opcode() != Opcode::Scope {
            return;
        }
        let block = self.scopes.push_scope(Some(scope), ScopeOwner::Block(stmt));
        // the loop binding lives in the body scope; its type awaits inference
        if let Some(name) = branches.first().and_then(|&n| self.declared_name(n)) {
            let id = self.entities.add_variable(Variable {
                name: name.clone(),
                declaration: stmt,
                scope: block,
                symbol: Symbol::new(crate::symbol::RootSymbol::Inference),
                flags: AttributeFlags::default(),
            });
            self.register(block, &name, ScopeEntry::Variable(id), false, stmt);
        }
        self.visit_scope(body, block);
    }

    /// Walks a value expression for constructs that introduce entities.
    fn visit_expr(&mut self, expr: ExprId, scope: ScopeId) {
        if self.exprs.get(expr).opcode() == Opcode::AnonymousFunction {
            self.tabulate_function(expr, scope);
            return;
        }
        let branches: Vec<ExprId> = self.exprs.branches(expr).collect();
        for branch in branches {
            self.visit_expr(branch, scope);
        }
    }

    fn tabulate_function(&mut self, expr: ExprId, scope: ScopeId) {
        let id = self.entities.add_function(AnonymousFunction {
            declaration: expr,
            scope,
            params: Vec::new(),
            signature: Signature::empty(),
        });
        let inner = self
            .scopes
            .push_scope(Some(scope), ScopeOwner::Function(id));
        self.entities.function_mut(id).scope = inner;
        self.exprs
            .set_data(expr, ExprData::Function(id.entity_ref()));
        let branches: Vec<ExprId> = self.exprs.branches(expr).collect();
        if let Some(&captures) = branches.first() {
            let capture_exprs: Vec<ExprId> = self.exprs.branches(captures).collect();
            for capture in capture_exprs {
                if self.exprs.get(capture).opcode() != Opcode::Variable {
                    continue;
                }
                if let Some(vid) =
                    self.tabulate_variable(capture, inner, AttributeFlags::default())
                {
                    self.entities.function_mut(id).params.push(vid);
                }
            }
        }
        if let Some(&body) = branches.get(1) {
            if self.exprs.get(body).opcode() == Opcode::Scope {
                self.visit_scope(body, inner);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::situation::SituationTable;
    use crate::situator::situate;
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

    struct Tabulated {
        exprs: ExprArena,
        scopes: ScopeArena,
        entities: EntityArenas,
        root_scope: ScopeId,
        ok: bool,
        sink: TestSink,
    }

    fn tabulate_source(source: &str) -> Tabulated {
        let mut buffer = source.as_bytes().to_vec();
        buffer.push(0);
        let sink = TestSink::default();
        let (tokens, _) = umbra_syntax::tokenize(&buffer, "test.um", &sink);
        let mut exprs = ExprArena::new();
        let (root, _) = umbra_syntax::parse(&tokens, source, "test.um", &mut exprs, &sink);
        let table = SituationTable::build();
        situate(&mut exprs, root, &table, "test.um", &sink);
        let mut scopes = ScopeArena::new();
        let mut entities = EntityArenas::new();
        let (root_scope, ok) = tabulate(
            &mut exprs,
            root,
            &mut scopes,
            &mut entities,
            "test.um",
            &sink,
        );
        Tabulated {
            exprs,
            scopes,
            entities,
            root_scope,
            ok,
            sink,
        }
    }

    #[test]
    fn test_variable_registers_into_root_scope() {
        let t = tabulate_source("var x: s32;");
        assert!(t.ok);
        let entry = t.scopes.lookup_internal(t.root_scope, "x");
        let ScopeEntry::Variable(id) = entry else {
            panic!("expected a variable entry, got {entry:?}");
        };
        assert_eq!(t.entities.variable(id).name, "x");
        assert!(t.entities.variable(id).symbol.is_empty());
    }

    #[test]
    fn test_overloads_share_one_group() {
        let t = tabulate_source("proc f(a: s32) {: :} proc f(a: s32, b: s32) {: :}");
        assert!(t.ok);
        let ScopeEntry::Procedures(group) = t.scopes.lookup_internal(t.root_scope, "f") else {
            panic!("expected a procedure group");
        };
        assert_eq!(t.entities.group(group).procedures.len(), 2);
        let (first, second) = {
            let procs = &t.entities.group(group).procedures;
            (procs[0], procs[1])
        };
        assert_eq!(t.entities.procedure(first).params.len(), 1);
        assert_eq!(t.entities.procedure(second).params.len(), 2);
    }

    #[test]
    fn test_duplicate_variable_name_is_reported() {
        let t = tabulate_source("var x: s32; var x: s32;");
        assert!(!t.ok);
        assert!(t.sink.errors()[0].contains("multiple symbols with name `x`"));
    }

    #[test]
    fn test_procedure_clashing_with_variable_is_reported() {
        let t = tabulate_source("var f: s32; proc f() {: :}");
        assert!(!t.ok);
        assert!(t.sink.errors()[0].contains("multiple symbols with name `f`"));
    }

    #[test]
    fn test_export_publishes_to_export_table() {
        let t = tabulate_source("export var x: s32; var y: s32;");
        assert!(t.ok);
        assert!(!t.scopes.lookup_export(t.root_scope, "x").is_none());
        assert!(t.scopes.lookup_export(t.root_scope, "y").is_none());
        assert!(!t.scopes.lookup_internal(t.root_scope, "y").is_none());
    }

    #[test]
    fn test_use_declaration_is_unsupported() {
        let t = tabulate_source("use helpers;");
        assert!(!t.ok);
        assert!(t.sink.errors()[0].contains("use declarations are not supported yet"));
    }

    #[test]
    fn test_import_is_recorded_on_the_scope() {
        let t = tabulate_source("import helpers;");
        assert!(t.ok);
        assert_eq!(t.scopes.imports(t.root_scope).len(), 1);
    }

    #[test]
    fn test_object_members_live_in_the_object_scope() {
        let t = tabulate_source("object point {: var x: s32; var y: s32; :}");
        assert!(t.ok);
        let ScopeEntry::Object(id) = t.scopes.lookup_internal(t.root_scope, "point") else {
            panic!("expected an object entry");
        };
        let object_scope = t.entities.object(id).scope;
        assert!(!t.scopes.lookup_internal(object_scope, "x").is_none());
        assert!(t.scopes.lookup_internal(t.root_scope, "x").is_none());
    }

    #[test]
    fn test_parameters_and_locals_live_in_the_procedure_scope() {
        let t = tabulate_source("proc f(a: s32) {: var local: s32; label again; :}");
        assert!(t.ok);
        let ScopeEntry::Procedures(group) = t.scopes.lookup_internal(t.root_scope, "f") else {
            panic!("expected a procedure group");
        };
        let proc = t.entities.group(group).procedures[0];
        let inner = t.entities.procedure(proc).scope;
        assert!(!t.scopes.lookup_internal(inner, "a").is_none());
        assert!(!t.scopes.lookup_internal(inner, "local").is_none());
        assert!(matches!(
            t.scopes.lookup_internal(inner, "again"),
            ScopeEntry::Label(_)
        ));
        assert!(t.scopes.lookup_internal(t.root_scope, "a").is_none());
    }

    #[test]
    fn test_for_binding_lives_in_the_body_scope() {
        let t = tabulate_source("proc f(xs: []s32) {: for x: xs {: x; :} :}");
        assert!(t.ok);
        // binding exists as a variable entity with a deferred symbol
        let binding = t
            .entities
            .variables()
            .find(|(_, v)| v.name == "x")
            .expect("binding tabulated");
        assert!(!binding.1.symbol.is_empty());
    }

    #[test]
    fn test_anonymous_function_gets_entity_and_scope() {
        let t = tabulate_source("var f = (> x: s32 <) {: return x; :};");
        assert!(t.ok);
        let function = t.entities.functions().next().expect("function tabulated");
        assert_eq!(function.1.params.len(), 1);
    }

    #[test]
    fn test_computed_name_is_rejected() {
        let mut exprs = ExprArena::new();
        let root = exprs.make_operation(Opcode::Scope, Span::empty(0));
        let var = exprs.make_operation(Opcode::Variable, Span::empty(0));
        let name = exprs.make_integer(3, Span::empty(0));
        let symbol = exprs.make_identifier("s32", Span::empty(0));
        exprs.append_branch(var, name);
        exprs.append_branch(var, symbol);
        exprs.append_branch(root, var);
        let sink = TestSink::default();
        let mut scopes = ScopeArena::new();
        let mut entities = EntityArenas::new();
        let (_, ok) = tabulate(&mut exprs, root, &mut scopes, &mut entities, "m", &sink);
        assert!(!ok);
        assert!(sink.errors()[0].contains("computed declaration names"));
    }

    #[test]
    fn test_duplicate_attribute_marks_not_ok() {
        let t = tabulate_source("export export var x: s32;");
        assert!(!t.ok);
        assert!(t.sink.errors()[0].contains("duplicate attribute `export`"));
    }
}
