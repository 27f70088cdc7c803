//! The resolver: type expressions into canonical symbols.
//!
//! Runs after every module has been tabulated. For each entity whose symbol or
//! signature is still empty, walks the declaring expression's type
//! sub-expression into a [Symbol], looking names up through the scope walker.
//! Failures are reported and leave an error-marked but structurally complete
//! symbol, so later consumers never see the unresolved sentinel.

use crate::attributes::AttributeFlags;
use crate::entity::{EntityArenas, ObjectId};
use crate::layout::TargetLayout;
use crate::scope::{ModuleScope, ModuleScopes, ScopeArena, ScopeEntry, ScopeId, ScopeWalker};
use crate::symbol::{RootSymbol, Signature, SubSymbol, SubSymbolKind, Symbol};
use log::trace;
use umbra_ast::{ExprArena, ExprId, Opcode};
use umbra_tokens::{Diagnostic, DiagnosticSink, Spanned};

/// Resolves every empty symbol and signature of one module. Returns whether
/// resolution was free of errors.
#[allow(clippy::too_many_arguments)]
pub fn resolve(
    exprs: &ExprArena,
    scopes: &ScopeArena,
    entities: &mut EntityArenas,
    module: &str,
    root: ScopeId,
    layout: &TargetLayout,
    modules: &dyn ModuleScopes,
    sink: &dyn DiagnosticSink,
) -> bool {
    let current = ModuleScope {
        name: module,
        exprs,
        scopes,
        root,
    };
    let mut resolver = Resolver {
        current,
        walker: ScopeWalker::new(modules),
        layout,
        sink,
        ok: true,
    };

    let variables: Vec<_> = entities
        .variables()
        .filter(|(_, v)| v.symbol.is_empty())
        .map(|(id, v)| (id, v.declaration, v.scope))
        .collect();
    let symbols: Vec<Symbol> = variables
        .iter()
        .map(|&(_, declaration, scope)| {
            resolver.resolve_declared_type(entities, declaration, 1, scope)
        })
        .collect();
    for ((id, _, _), symbol) in variables.into_iter().zip(symbols) {
        entities.variable_mut(id).symbol = symbol;
    }

    let aliases: Vec<_> = entities
        .aliases()
        .filter(|(_, a)| a.symbol.is_empty())
        .map(|(id, a)| (id, a.declaration, a.scope))
        .collect();
    let symbols: Vec<Symbol> = aliases
        .iter()
        .map(|&(_, declaration, scope)| {
            resolver.resolve_declared_type(entities, declaration, 1, scope)
        })
        .collect();
    for ((id, _, _), symbol) in aliases.into_iter().zip(symbols) {
        entities.alias_mut(id).symbol = symbol;
    }

    let procedures: Vec<_> = entities
        .procedures()
        .filter(|(_, p)| p.signature.is_empty())
        .map(|(id, p)| (id, p.declaration, p.scope, p.params.clone(), p.entry_point))
        .collect();
    let signatures: Vec<Signature> = procedures
        .iter()
        .map(|&(_, declaration, scope, ref params, entry_point)| {
            let param_symbols: Vec<Symbol> = params
                .iter()
                .map(|&vid| entities.variable(vid).symbol.clone())
                .collect();
            let ret = if entry_point {
                // the entry point returns a machine-word signed integer
                Symbol::new(RootSymbol::SignedInteger(layout.pointer_bits()))
            } else {
                resolver.resolve_declared_type(entities, declaration, 2, scope)
            };
            Signature::new(param_symbols, ret)
        })
        .collect();
    for ((id, ..), signature) in procedures.into_iter().zip(signatures) {
        entities.procedure_mut(id).signature = signature;
    }

    let functions: Vec<_> = entities
        .functions()
        .filter(|(_, f)| f.signature.is_empty())
        .map(|(id, f)| (id, f.params.clone()))
        .collect();
    let signatures: Vec<Signature> = functions
        .iter()
        .map(|(_, params)| {
            let param_symbols: Vec<Symbol> = params
                .iter()
                .map(|&vid| entities.variable(vid).symbol.clone())
                .collect();
            // the return symbol of an anonymous function awaits inference
            Signature::new(param_symbols, Symbol::new(RootSymbol::Inference))
        })
        .collect();
    for ((id, _), signature) in functions.into_iter().zip(signatures) {
        entities.function_mut(id).signature = signature;
    }

    trace!("resolved {module}, ok={}", resolver.ok);
    resolver.ok
}

struct Resolver<'a> {
    current: ModuleScope<'a>,
    walker: ScopeWalker<'a>,
    layout: &'a TargetLayout,
    sink: &'a dyn DiagnosticSink,
    ok: bool,
}

impl<'a> Resolver<'a> {
    fn error(&mut self, message: String, at: ExprId) {
        self.ok = false;
        self.sink.report(
            Diagnostic::error(message)
                .with_span(self.current.exprs.get(at).span())
                .with_module(self.current.name),
        );
    }

    /// Resolves the `index`th branch of a declaration as a type.
    fn resolve_declared_type(
        &mut self,
        entities: &EntityArenas,
        declaration: ExprId,
        index: usize,
        scope: ScopeId,
    ) -> Symbol {
        match self.current.exprs.branch_at(declaration, index) {
            Some(type_expr) => self.resolve_symbol(entities, type_expr, scope),
            None => Symbol::new(RootSymbol::Error),
        }
    }

    /// Walks a type expression into a canonical symbol: modifier layers
    /// outermost-first, then the root.
    fn resolve_symbol(&mut self, entities: &EntityArenas, expr: ExprId, scope: ScopeId) -> Symbol {
        let exprs = self.current.exprs;
        let mut subs: Vec<SubSymbol> = Vec::new();
        let mut failed = false;
        let mut cursor = expr;
        loop {
            let node = exprs.get(cursor);
            match node.opcode() {
                Opcode::PointerType => {
                    subs.push(SubSymbol::new(SubSymbolKind::Pointer));
                    let Some(inner) = node.branch() else { break };
                    cursor = inner;
                }
                Opcode::ReferenceType => {
                    subs.push(SubSymbol::new(SubSymbolKind::Reference));
                    let Some(inner) = node.branch() else { break };
                    cursor = inner;
                }
                Opcode::SliceType => {
                    subs.push(SubSymbol::new(SubSymbolKind::Slice));
                    let Some(inner) = node.branch() else { break };
                    cursor = inner;
                }
                Opcode::ArrayType => {
                    let count = match exprs.branch_at(cursor, 0).and_then(|c| self.fold_count(c)) {
                        Some(count) => count,
                        None => {
                            failed = true;
                            0
                        }
                    };
                    subs.push(SubSymbol::new(SubSymbolKind::Array(count)));
                    let Some(inner) = exprs.branch_at(cursor, 1) else {
                        break;
                    };
                    cursor = inner;
                }
                Opcode::Ascribe => {
                    // attributes in type position describe the layer above
                    let branches: Vec<ExprId> = exprs.branches(cursor).collect();
                    let Some((&inner, attributes)) = branches.split_last() else {
                        break;
                    };
                    match AttributeFlags::from_ascriptions(
                        exprs,
                        attributes.iter().copied(),
                        self.current.name,
                        self.sink,
                    ) {
                        Some(flags) => {
                            if let Some(last) = subs.last_mut() {
                                last.flags = last.flags.union(flags);
                            }
                        }
                        None => failed = true,
                    }
                    cursor = inner;
                }
                _ => break,
            }
        }
        let root = self.resolve_root(entities, cursor, scope);
        let mut symbol = Symbol::with_subs(root, subs);
        if failed {
            symbol.mark_error();
        }
        symbol
    }

    fn resolve_root(&mut self, entities: &EntityArenas, expr: ExprId, scope: ScopeId) -> RootSymbol {
        let node = self.current.exprs.get(expr);
        match node.opcode() {
            Opcode::Identifier => {
                let name = node.text().expect("identifier carries text");
                if let Some(primitive) = RootSymbol::from_primitive_name(name) {
                    return primitive;
                }
                match self.walker.search(&self.current, scope, name) {
                    Some(found) => {
                        if found.module == self.current.name {
                            entry_root(found.entry)
                        } else {
                            RootSymbol::External {
                                module: found.module,
                                name: name.to_string(),
                            }
                        }
                    }
                    None => {
                        self.error(format!("unknown symbol `{name}`"), expr);
                        RootSymbol::Error
                    }
                }
            }
            Opcode::Member => self.resolve_member(entities, expr, scope),
            Opcode::Inference => RootSymbol::Inference,
            // parser recovery; already reported
            Opcode::Placeholder => RootSymbol::Error,
            other => {
                self.error(format!("`{other}` is not a symbol expression"), expr);
                RootSymbol::Error
            }
        }
    }

    /// `head.member` in type position: the head must name an object in this
    /// module whose scope declares the member.
    fn resolve_member(
        &mut self,
        entities: &EntityArenas,
        expr: ExprId,
        scope: ScopeId,
    ) -> RootSymbol {
        let branches: Vec<ExprId> = self.current.exprs.branches(expr).collect();
        let Some(&head) = branches.first() else {
            return RootSymbol::Error;
        };
        let head_root = self.resolve_root(entities, head, scope);
        let object: ObjectId = match head_root {
            RootSymbol::Object(object) => object,
            RootSymbol::Error => return RootSymbol::Error,
            _ => {
                self.error(
                    "member access in a type must start from an object".to_string(),
                    expr,
                );
                return RootSymbol::Error;
            }
        };
        let Some(member) = branches
            .get(1)
            .and_then(|&m| self.current.exprs.get(m).text())
        else {
            return RootSymbol::Error;
        };
        let entry = self
            .current
            .scopes
            .lookup_internal(entities.object(object).scope, member);
        if entry.is_none() {
            self.error(format!("unknown symbol `{member}`"), expr);
            return RootSymbol::Error;
        }
        entry_root(entry)
    }

    /// Folds a compile-time count: integer literals and the layout constants.
    fn fold_count(&mut self, expr: ExprId) -> Option<u64> {
        let node = self.current.exprs.get(expr);
        match node.opcode() {
            Opcode::Integer => node.int_value(),
            Opcode::AddressSize => Some(self.layout.address_size()),
            Opcode::AddressDepth => Some(self.layout.address_depth()),
            Opcode::BitsPerByte => Some(self.layout.bits_per_byte()),
            _ => {
                self.error(
                    "unable to resolve numeric value at compile time".to_string(),
                    expr,
                );
                None
            }
        }
    }
}

fn entry_root(entry: ScopeEntry) -> RootSymbol {
    match entry {
        ScopeEntry::Object(id) => RootSymbol::Object(id),
        ScopeEntry::Table(id) => RootSymbol::Table(id),
        ScopeEntry::Procedures(id) => RootSymbol::ProcedureGroup(id),
        ScopeEntry::Alias(id) => RootSymbol::Alias(id),
        ScopeEntry::Variable(id) => RootSymbol::Variable(id),
        ScopeEntry::Label(_) | ScopeEntry::None => RootSymbol::Error,
    }
}
