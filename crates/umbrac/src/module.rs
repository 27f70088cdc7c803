//! One source file and everything the pipeline derives from it.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use umbra_ast::{ExprArena, ExprId};
use umbra_sema::{situate, tabulate, EntityArenas, ScopeArena, ScopeId, SituationTable};
use umbra_syntax::{parse, tokenize};
use umbra_tokens::{DiagnosticSink, Token};

use crate::compiler::HaltStage;

/// Which stages have run for a module and whether their output is usable.
///
/// `None` means the stage has not run; a stage skipped because its
/// predecessor reported not-ok stays `None`.
#[derive(Debug, Clone, Copy, Default)]
pub struct StageFlags {
    pub tokenize: Option<bool>,
    pub parse: Option<bool>,
    pub situate: Option<bool>,
    pub tabulate: Option<bool>,
    pub resolve: Option<bool>,
}

impl StageFlags {
    pub fn get(&self, stage: HaltStage) -> Option<bool> {
        match stage {
            HaltStage::Tokenize => self.tokenize,
            HaltStage::Parse => self.parse,
            HaltStage::Situate => self.situate,
            HaltStage::Tabulate => self.tabulate,
            HaltStage::Resolve => self.resolve,
        }
    }
}

/// A module moving through the pipeline.
///
/// Every derived artifact lives here: the token vector, the expression
/// arena with the module root, the scope arena, and the entity arenas.
/// Only the worker processing the module touches it while the front-end
/// stages run; after tabulation the scope tree is immutable and other
/// modules may read it during resolution.
#[derive(Debug)]
pub struct Module {
    path: PathBuf,
    name: String,
    source: String,
    /// Source bytes with the NUL sentinel the tokenizer requires.
    buffer: Vec<u8>,
    pub tokens: Vec<Token>,
    pub exprs: ExprArena,
    pub root: Option<ExprId>,
    pub scopes: ScopeArena,
    pub entities: EntityArenas,
    pub root_scope: Option<ScopeId>,
    pub stages: StageFlags,
}

fn module_name(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

impl Module {
    /// Reads a module from disk. The module name is the file stem.
    pub fn load(path: &Path) -> io::Result<Self> {
        let source = fs::read_to_string(path)?;
        Ok(Self::new(path.to_path_buf(), module_name(path), source))
    }

    /// Creates a module from in-memory source, for tests and tooling.
    pub fn from_source(name: &str, source: &str) -> Self {
        Self::new(
            PathBuf::from(format!("{name}.um")),
            name.to_string(),
            source.to_string(),
        )
    }

    fn new(path: PathBuf, name: String, source: String) -> Self {
        let mut buffer = source.clone().into_bytes();
        buffer.push(0);
        Self {
            path,
            name,
            source,
            buffer,
            tokens: Vec::new(),
            exprs: ExprArena::new(),
            root: None,
            scopes: ScopeArena::new(),
            entities: EntityArenas::new(),
            root_scope: None,
            stages: StageFlags::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn run_tokenize(&mut self, sink: &dyn DiagnosticSink) -> bool {
        let (tokens, ok) = tokenize(&self.buffer, &self.name, sink);
        self.tokens = tokens;
        self.stages.tokenize = Some(ok);
        ok
    }

    pub fn run_parse(&mut self, sink: &dyn DiagnosticSink) -> bool {
        let (root, ok) = parse(&self.tokens, &self.source, &self.name, &mut self.exprs, sink);
        self.root = Some(root);
        self.stages.parse = Some(ok);
        ok
    }

    pub fn run_situate(&mut self, table: &SituationTable, sink: &dyn DiagnosticSink) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let ok = situate(&mut self.exprs, root, table, &self.name, sink);
        self.stages.situate = Some(ok);
        ok
    }

    pub fn run_tabulate(&mut self, sink: &dyn DiagnosticSink) -> bool {
        let Some(root) = self.root else {
            return false;
        };
        let (scope, ok) = tabulate(
            &mut self.exprs,
            root,
            &mut self.scopes,
            &mut self.entities,
            &self.name,
            sink,
        );
        self.root_scope = Some(scope);
        self.stages.tabulate = Some(ok);
        ok
    }

    /// Runs the per-module stages through `halt`, at most up to situation.
    ///
    /// A stage that reports not-ok stops the module here; sibling modules
    /// still run every stage, so diagnostics accumulate across the set.
    pub fn run_front_end(
        &mut self,
        halt: HaltStage,
        table: &SituationTable,
        sink: &dyn DiagnosticSink,
    ) {
        let ok = self.run_tokenize(sink);
        if halt == HaltStage::Tokenize || !ok {
            return;
        }
        let ok = self.run_parse(sink);
        if halt == HaltStage::Parse || !ok {
            return;
        }
        self.run_situate(table, sink);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use test_log::test;
    use umbra_tokens::Diagnostic;

    #[derive(Default)]
    struct Collecting(Mutex<Vec<Diagnostic>>);

    impl DiagnosticSink for Collecting {
        fn report(&self, diagnostic: Diagnostic) {
            self.0.lock().unwrap().push(diagnostic);
        }
    }

    #[test]
    fn test_front_end_runs_through_situate() {
        let sink = Collecting::default();
        let table = SituationTable::build();
        let mut module = Module::from_source("demo", "var x: s32 = 1;\n");
        module.run_front_end(HaltStage::Resolve, &table, &sink);

        assert_eq!(module.stages.tokenize, Some(true));
        assert_eq!(module.stages.parse, Some(true));
        assert_eq!(module.stages.situate, Some(true));
        assert_eq!(module.stages.tabulate, None);
        assert!(sink.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_halt_after_tokenize_leaves_no_tree() {
        let sink = Collecting::default();
        let table = SituationTable::build();
        let mut module = Module::from_source("demo", "var x: s32 = 1;\n");
        module.run_front_end(HaltStage::Tokenize, &table, &sink);

        assert_eq!(module.stages.tokenize, Some(true));
        assert_eq!(module.stages.parse, None);
        assert!(module.root.is_none());
    }

    #[test]
    fn test_failed_tokenize_skips_parse() {
        let sink = Collecting::default();
        let table = SituationTable::build();
        let mut module = Module::from_source("demo", "(a b\n");
        module.run_front_end(HaltStage::Resolve, &table, &sink);

        assert_eq!(module.stages.tokenize, Some(false));
        assert_eq!(module.stages.parse, None);
        assert!(!sink.0.lock().unwrap().is_empty());
    }
}
