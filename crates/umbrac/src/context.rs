//! The explicit compilation context.
//!
//! One [Context] is constructed per invocation and handed through every
//! stage; there is no ambient global state. It owns the module map, the
//! collecting diagnostic sink, the situation table, and the target layout.

use std::io::{self, Write};
use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;
use umbra_sema::{resolve, ModuleScope, ModuleScopes, SituationTable, TargetLayout};
use umbra_tokens::{Diagnostic, DiagnosticSink, Severity};

use crate::module::Module;

/// A sink that collects diagnostics behind a mutex for rendering at the
/// end of the run. Shared across worker tasks through an [Arc].
#[derive(Debug, Default)]
pub struct CollectedDiagnostics {
    entries: Mutex<Vec<Diagnostic>>,
}

impl CollectedDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn error_count(&self) -> usize {
        self.entries
            .lock()
            .iter()
            .filter(|diagnostic| diagnostic.severity == Severity::Error)
            .count()
    }

    /// Takes every collected diagnostic, leaving the sink empty.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut self.entries.lock())
    }
}

impl DiagnosticSink for CollectedDiagnostics {
    fn report(&self, diagnostic: Diagnostic) {
        trace!("collected {}: {}", diagnostic.severity, diagnostic.message);
        self.entries.lock().push(diagnostic);
    }
}

/// Renders one diagnostic, underlining its span against the module source
/// when both are known.
pub fn render_diagnostic(
    diagnostic: &Diagnostic,
    source: Option<&str>,
    out: &mut dyn Write,
) -> io::Result<()> {
    writeln!(out, "{}: {}", diagnostic.severity, diagnostic.message)?;
    let (Some(module), Some(span), Some(source)) =
        (&diagnostic.module, diagnostic.span, source)
    else {
        return Ok(());
    };
    let (line, column) = span.line_column(source);
    writeln!(out, "  --> {module}:{line}:{column}")?;
    let text = source.lines().nth(line - 1).unwrap_or("");
    writeln!(out, "   | {text}")?;
    // caret under the first byte, tildes under the rest of the span,
    // clamped to the end of the line
    let available = text.len().saturating_sub(column - 1).max(1);
    let tildes = span.len().min(available).saturating_sub(1);
    writeln!(out, "   | {:width$}^{}", "", "~".repeat(tildes), width = column - 1)?;
    Ok(())
}

/// The searchable surface of every module, used during resolution to
/// follow imports into other modules' export tables.
pub struct ModuleMap<'a> {
    modules: &'a [Module],
}

impl ModuleScopes for ModuleMap<'_> {
    fn module_scope(&self, name: &str) -> Option<ModuleScope<'_>> {
        let module = self.modules.iter().find(|module| module.name() == name)?;
        let root = module.root_scope?;
        Some(ModuleScope {
            name: module.name(),
            exprs: &module.exprs,
            scopes: &module.scopes,
            root,
        })
    }
}

/// Everything one compiler invocation works on.
pub struct Context {
    modules: Vec<Module>,
    sink: Arc<CollectedDiagnostics>,
    situations: Arc<SituationTable>,
    layout: TargetLayout,
}

impl Context {
    pub fn new(layout: TargetLayout) -> Self {
        Self {
            modules: Vec::new(),
            sink: Arc::new(CollectedDiagnostics::new()),
            situations: Arc::new(SituationTable::build()),
            layout,
        }
    }

    pub fn add_module(&mut self, module: Module) {
        self.modules.push(module);
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|module| module.name() == name)
    }

    pub fn sink(&self) -> Arc<CollectedDiagnostics> {
        Arc::clone(&self.sink)
    }

    pub fn situations(&self) -> Arc<SituationTable> {
        Arc::clone(&self.situations)
    }

    pub fn layout(&self) -> &TargetLayout {
        &self.layout
    }

    /// Hands the module set to an executor; [Context::put_modules] returns it.
    pub fn take_modules(&mut self) -> Vec<Module> {
        std::mem::take(&mut self.modules)
    }

    pub fn put_modules(&mut self, modules: Vec<Module>) {
        self.modules = modules;
    }

    /// Tabulates every situated module. All modules finish here before any
    /// resolution starts, since resolution reads other modules' scope trees.
    pub fn run_tabulate(&mut self) {
        let sink = Arc::clone(&self.sink);
        for module in &mut self.modules {
            if module.stages.situate == Some(true) {
                module.run_tabulate(&*sink);
            }
        }
    }

    /// Resolves every tabulated module against the whole module map.
    pub fn run_resolve(&mut self) {
        for index in 0..self.modules.len() {
            if self.modules[index].stages.tabulate != Some(true) {
                continue;
            }
            let Some(root) = self.modules[index].root_scope else {
                continue;
            };
            // Entities move out so the module map can borrow every module,
            // including this one, while resolution writes symbols back.
            let mut entities = std::mem::take(&mut self.modules[index].entities);
            let ok = {
                let module = &self.modules[index];
                let map = ModuleMap {
                    modules: &self.modules,
                };
                resolve(
                    &module.exprs,
                    &module.scopes,
                    &mut entities,
                    module.name(),
                    root,
                    &self.layout,
                    &map,
                    &*self.sink,
                )
            };
            self.modules[index].entities = entities;
            self.modules[index].stages.resolve = Some(ok);
        }
    }

    /// Whether `stage` finished ok for every module.
    pub fn stage_succeeded(&self, stage: crate::compiler::HaltStage) -> bool {
        self.modules
            .iter()
            .all(|module| module.stages.get(stage) == Some(true))
    }

    /// Renders every collected diagnostic against the module sources.
    pub fn render_diagnostics(&self, out: &mut dyn Write) -> io::Result<()> {
        for diagnostic in self.sink.entries.lock().iter() {
            let source = diagnostic
                .module
                .as_deref()
                .and_then(|name| self.module(name))
                .map(|module| module.source());
            render_diagnostic(diagnostic, source, out)?;
        }
        Ok(())
    }
}
