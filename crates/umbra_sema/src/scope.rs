//! Lexical scopes and name search.
//!
//! Each module owns a [ScopeArena]; scopes form a tree through `containing`
//! links. Name search walks outward through the containing chain and sideways
//! through `import` declarations into other modules' export tables, guarded by
//! a visited set so cyclic imports terminate.

use crate::entity::{
    AliasId, FunctionId, LabelId, ObjectId, ProcedureGroupId, ProcedureId, TableId, VariableId,
};
use log::trace;
use std::collections::{HashMap, HashSet};
use umbra_ast::{ExprArena, ExprId, Opcode};

/// An index into a module's [ScopeArena].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(u32);

impl ScopeId {
    pub fn index(&self) -> usize {
        self.0 as usize
    }

    pub fn from_index(index: usize) -> Self {
        Self(index as u32)
    }
}

/// What construct introduced a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeOwner {
    Module,
    Object(ObjectId),
    Procedure(ProcedureId),
    Table(TableId),
    Function(FunctionId),
    /// A bare or control-flow statement scope.
    Block(ExprId),
}

/// What a name in a scope refers to.
///
/// Absence is the [ScopeEntry::None] sentinel, never a missing map key leaking
/// out of the lookup API.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    None,
    Object(ObjectId),
    Procedures(ProcedureGroupId),
    Alias(AliasId),
    Variable(VariableId),
    Table(TableId),
    Label(LabelId),
}

impl ScopeEntry {
    pub fn is_none(&self) -> bool {
        matches!(self, ScopeEntry::None)
    }
}

/// A duplicate registration into one scope.
#[derive(Debug, thiserror::Error)]
#[error("multiple symbols with name `{0}`")]
pub struct DuplicateSymbol(pub String);

#[derive(Debug)]
struct Scope {
    symbols: HashMap<String, ScopeEntry>,
    exports: HashMap<String, ScopeEntry>,
    containing: Option<ScopeId>,
    owner: ScopeOwner,
    imports: Vec<ExprId>,
}

/// Owns every scope of one module.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_scope(&mut self, containing: Option<ScopeId>, owner: ScopeOwner) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            symbols: HashMap::new(),
            exports: HashMap::new(),
            containing,
            owner,
            imports: Vec::new(),
        });
        id
    }

    fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.index()]
    }

    pub fn owner(&self, id: ScopeId) -> ScopeOwner {
        self.get(id).owner
    }

    pub fn containing(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).containing
    }

    /// Registers a name visible inside the scope only.
    pub fn add_internal_symbol(
        &mut self,
        id: ScopeId,
        name: &str,
        entry: ScopeEntry,
    ) -> Result<(), DuplicateSymbol> {
        let scope = self.get_mut(id);
        if scope.symbols.contains_key(name) {
            return Err(DuplicateSymbol(name.to_string()));
        }
        trace!("scope {}: `{name}` -> {entry:?}", id.index());
        scope.symbols.insert(name.to_string(), entry);
        Ok(())
    }

    /// Additionally publishes an already-registered name to importers.
    pub fn add_export_symbol(&mut self, id: ScopeId, name: &str, entry: ScopeEntry) {
        self.get_mut(id).exports.insert(name.to_string(), entry);
    }

    /// Registers a name both internally and in the export table.
    pub fn add_symbol(
        &mut self,
        id: ScopeId,
        name: &str,
        entry: ScopeEntry,
    ) -> Result<(), DuplicateSymbol> {
        self.add_internal_symbol(id, name, entry)?;
        self.add_export_symbol(id, name, entry);
        Ok(())
    }

    /// Looks a name up in this scope alone; no outward fallthrough.
    pub fn lookup_internal(&self, id: ScopeId, name: &str) -> ScopeEntry {
        self.get(id)
            .symbols
            .get(name)
            .copied()
            .unwrap_or(ScopeEntry::None)
    }

    /// Looks a name up in this scope's export table alone.
    pub fn lookup_export(&self, id: ScopeId, name: &str) -> ScopeEntry {
        self.get(id)
            .exports
            .get(name)
            .copied()
            .unwrap_or(ScopeEntry::None)
    }

    /// Records an `import` declaration attached to a scope.
    pub fn add_import(&mut self, id: ScopeId, declaration: ExprId) {
        self.get_mut(id).imports.push(declaration);
    }

    pub fn imports(&self, id: ScopeId) -> &[ExprId] {
        &self.get(id).imports
    }

    /// The scope itself, then its containing chain outward to the root.
    pub fn containing_iter(&self, id: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        let mut cursor = Some(id);
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = self.get(current).containing;
            Some(current)
        })
    }
}

/// One module's searchable surface, borrowed from the driver.
#[derive(Clone, Copy)]
pub struct ModuleScope<'a> {
    pub name: &'a str,
    pub exprs: &'a ExprArena,
    pub scopes: &'a ScopeArena,
    pub root: ScopeId,
}

/// Resolves module names to their searchable surface; implemented by the
/// driver's context over its module map.
pub trait ModuleScopes {
    fn module_scope(&self, name: &str) -> Option<ModuleScope<'_>>;
}

/// An empty module universe for single-module search.
pub struct NoModules;

impl ModuleScopes for NoModules {
    fn module_scope(&self, _name: &str) -> Option<ModuleScope<'_>> {
        None
    }
}

/// Where a name search found its entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub module: String,
    pub entry: ScopeEntry,
}

/// Searches names outward through scopes and across imports.
pub struct ScopeWalker<'a> {
    modules: &'a dyn ModuleScopes,
}

impl<'a> ScopeWalker<'a> {
    pub fn new(modules: &'a dyn ModuleScopes) -> Self {
        Self { modules }
    }

    /// Searches `name` starting at `start` in `current`, walking the
    /// containing chain and following imports into export tables.
    pub fn search(
        &self,
        current: &ModuleScope<'_>,
        start: ScopeId,
        name: &str,
    ) -> Option<Resolution> {
        for scope in current.scopes.containing_iter(start) {
            let entry = current.scopes.lookup_internal(scope, name);
            if !entry.is_none() {
                return Some(Resolution {
                    module: current.name.to_string(),
                    entry,
                });
            }
            let mut visited = HashSet::new();
            visited.insert(current.name.to_string());
            for &import in current.scopes.imports(scope) {
                let Some(target) = import_target(current.exprs, import) else {
                    continue;
                };
                if let Some(found) = self.search_exports(target, name, &mut visited) {
                    return Some(found);
                }
            }
        }
        None
    }

    fn search_exports(
        &self,
        module: &str,
        name: &str,
        visited: &mut HashSet<String>,
    ) -> Option<Resolution> {
        if !visited.insert(module.to_string()) {
            // cyclic import chain
            return None;
        }
        let target = self.modules.module_scope(module)?;
        let entry = target.scopes.lookup_export(target.root, name);
        if !entry.is_none() {
            return Some(Resolution {
                module: module.to_string(),
                entry,
            });
        }
        let imports: Vec<ExprId> = target.scopes.imports(target.root).to_vec();
        for import in imports {
            let Some(next) = import_target(target.exprs, import) else {
                continue;
            };
            let next = next.to_string();
            if let Some(found) = self.search_exports(&next, name, visited) {
                return Some(found);
            }
        }
        None
    }
}

/// The module an `import` declaration names.
fn import_target(exprs: &ExprArena, import: ExprId) -> Option<&str> {
    let node = exprs.get(import);
    if node.opcode() != Opcode::Import {
        return None;
    }
    let name = exprs.get(node.branch()?);
    name.text()
}

#[cfg(test)]
mod tests {
    use super::*;
    use umbra_tokens::Span;

    fn variable(index: u32) -> ScopeEntry {
        ScopeEntry::Variable(VariableId::from(umbra_ast::EntityRef(index)))
    }

    #[test]
    fn test_lookup_absent_is_none_sentinel() {
        let mut scopes = ScopeArena::new();
        let root = scopes.push_scope(None, ScopeOwner::Module);
        assert!(scopes.lookup_internal(root, "missing").is_none());
    }

    #[test]
    fn test_no_outward_fallthrough_in_internal_lookup() {
        let mut scopes = ScopeArena::new();
        let root = scopes.push_scope(None, ScopeOwner::Module);
        scopes.add_internal_symbol(root, "x", variable(0)).unwrap();
        let mut exprs = ExprArena::new();
        let block = exprs.make_operation(Opcode::Scope, Span::empty(0));
        let inner = scopes.push_scope(Some(root), ScopeOwner::Block(block));
        assert!(scopes.lookup_internal(inner, "x").is_none());
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let mut scopes = ScopeArena::new();
        let root = scopes.push_scope(None, ScopeOwner::Module);
        scopes.add_internal_symbol(root, "x", variable(0)).unwrap();
        assert!(scopes.add_internal_symbol(root, "x", variable(1)).is_err());
    }

    #[test]
    fn test_containing_iter_is_inside_out() {
        let mut exprs = ExprArena::new();
        let block = exprs.make_operation(Opcode::Scope, Span::empty(0));
        let mut scopes = ScopeArena::new();
        let root = scopes.push_scope(None, ScopeOwner::Module);
        let mid = scopes.push_scope(Some(root), ScopeOwner::Block(block));
        let leaf = scopes.push_scope(Some(mid), ScopeOwner::Block(block));
        let chain: Vec<ScopeId> = scopes.containing_iter(leaf).collect();
        assert_eq!(chain, vec![leaf, mid, root]);
    }

    /// A two-module universe with an optional cyclic back-import.
    struct TwoModules {
        a_exprs: ExprArena,
        a_scopes: ScopeArena,
        a_root: ScopeId,
        b_exprs: ExprArena,
        b_scopes: ScopeArena,
        b_root: ScopeId,
    }

    fn import_decl(exprs: &mut ExprArena, target: &str) -> ExprId {
        let node = exprs.make_operation(Opcode::Import, Span::empty(0));
        let name = exprs.make_identifier(target, Span::empty(0));
        exprs.append_branch(node, name);
        node
    }

    impl TwoModules {
        fn new(cyclic: bool) -> Self {
            let mut a_exprs = ExprArena::new();
            let mut a_scopes = ScopeArena::new();
            let a_root = a_scopes.push_scope(None, ScopeOwner::Module);
            let import_b = import_decl(&mut a_exprs, "b");
            a_scopes.add_import(a_root, import_b);

            let mut b_exprs = ExprArena::new();
            let mut b_scopes = ScopeArena::new();
            let b_root = b_scopes.push_scope(None, ScopeOwner::Module);
            b_scopes.add_symbol(b_root, "exported", variable(7)).unwrap();
            b_scopes
                .add_internal_symbol(b_root, "hidden", variable(8))
                .unwrap();
            if cyclic {
                let import_a = import_decl(&mut b_exprs, "a");
                b_scopes.add_import(b_root, import_a);
            }

            Self {
                a_exprs,
                a_scopes,
                a_root,
                b_exprs,
                b_scopes,
                b_root,
            }
        }

        fn a(&self) -> ModuleScope<'_> {
            ModuleScope {
                name: "a",
                exprs: &self.a_exprs,
                scopes: &self.a_scopes,
                root: self.a_root,
            }
        }
    }

    impl ModuleScopes for TwoModules {
        fn module_scope(&self, name: &str) -> Option<ModuleScope<'_>> {
            match name {
                "a" => Some(self.a()),
                "b" => Some(ModuleScope {
                    name: "b",
                    exprs: &self.b_exprs,
                    scopes: &self.b_scopes,
                    root: self.b_root,
                }),
                _ => None,
            }
        }
    }

    #[test]
    fn test_search_follows_imports_into_exports() {
        let universe = TwoModules::new(false);
        let walker = ScopeWalker::new(&universe);
        let found = walker
            .search(&universe.a(), universe.a_root, "exported")
            .unwrap();
        assert_eq!(found.module, "b");
        assert_eq!(found.entry, variable(7));
    }

    #[test]
    fn test_search_never_sees_unexported_names() {
        let universe = TwoModules::new(false);
        let walker = ScopeWalker::new(&universe);
        assert!(walker
            .search(&universe.a(), universe.a_root, "hidden")
            .is_none());
    }

    #[test]
    fn test_cyclic_imports_terminate() {
        let universe = TwoModules::new(true);
        let walker = ScopeWalker::new(&universe);
        assert!(walker
            .search(&universe.a(), universe.a_root, "nowhere")
            .is_none());
    }
}
