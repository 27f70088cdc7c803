//! The pipeline driver.
//!
//! [UmbraC] owns the configuration of one invocation and drives the stages
//! over a [Context]: tokenize, parse, and situate fan out per module through
//! the executor, then tabulation of every module completes before any
//! resolution starts so cross-module lookups read finished scope trees.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use thiserror::Error;
use umbra_ast::dump;
use umbra_sema::TargetLayout;

use crate::context::Context;
use crate::executor::Executor;
use crate::module::Module;

/// A pipeline stage the driver can stop after or dump the output of.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, clap::ValueEnum, strum::Display,
)]
#[strum(serialize_all = "lowercase")]
pub enum HaltStage {
    Tokenize,
    Parse,
    Situate,
    Tabulate,
    Resolve,
}

/// Runs the umbra front end over a set of source files.
///
/// Must be configured using an [UmbraCBuilder].
#[derive(Debug)]
pub struct UmbraC {
    executor: Executor,
    output_directory: PathBuf,
    halt: HaltStage,
    emit: Vec<HaltStage>,
    layout: TargetLayout,
}

/// The result of one invocation: whether the final requested stage
/// succeeded for every module, plus the context holding the modules and
/// collected diagnostics.
pub struct Compilation {
    pub succeeded: bool,
    pub context: Context,
}

impl UmbraC {
    /// Creates the default UmbraCBuilder.
    #[inline]
    pub fn builder() -> UmbraCBuilder {
        UmbraCBuilder::new()
    }

    /// Compiles a single file.
    #[inline]
    pub fn compile(&mut self, path: &Path) -> Result<Compilation, UmbraCError> {
        self.compile_all(vec![path.to_path_buf()])
    }

    /// Runs the pipeline over every file through the configured halt stage.
    pub fn compile_all(&mut self, paths: Vec<PathBuf>) -> Result<Compilation, UmbraCError> {
        let mut context = Context::new(self.layout);
        for path in paths {
            let module =
                Module::load(&path).map_err(|error| UmbraCError::ReadSource(path, error))?;
            debug!("loaded module {} from {:?}", module.name(), module.path());
            context.add_module(module);
        }

        let modules = context.take_modules();
        let modules = self
            .executor
            .run_front_end(modules, self.halt, context.situations(), context.sink())
            .map_err(UmbraCError::Runtime)?;
        context.put_modules(modules);

        if self.halt >= HaltStage::Tabulate {
            context.run_tabulate();
        }
        if self.halt >= HaltStage::Resolve {
            context.run_resolve();
        }

        self.write_dumps(&context)?;

        let succeeded = context.stage_succeeded(self.halt);
        info!(
            "finished {} modules through {} with {} diagnostics, succeeded={succeeded}",
            context.modules().len(),
            self.halt,
            context.sink().len(),
        );
        Ok(Compilation { succeeded, context })
    }

    /// Writes a human-readable dump per module for each requested stage.
    ///
    /// Tree dumps reflect the tree as it stands when the pipeline stops, so
    /// pairing `--emit` with `--halt-after` gives an exact stage snapshot.
    fn write_dumps(&self, context: &Context) -> Result<(), UmbraCError> {
        for &stage in &self.emit {
            if stage > self.halt {
                continue;
            }
            for module in context.modules() {
                let rendered = match stage {
                    HaltStage::Tokenize => render_tokens(module),
                    _ => module
                        .root
                        .map(|root| dump(&module.exprs, root, module.source()))
                        .unwrap_or_default(),
                };
                let path = self
                    .output_directory
                    .join(format!("{}.{stage}.dump", module.name()));
                debug!("writing {stage} dump to {path:?}");
                fs::write(&path, rendered)
                    .map_err(|error| UmbraCError::WriteDump(path.clone(), error))?;
            }
        }
        Ok(())
    }
}

fn render_tokens(module: &Module) -> String {
    use std::fmt::Write;
    let mut out = String::new();
    for token in &module.tokens {
        let _ = writeln!(
            out,
            "{:?} {:?} {:?}",
            token.kind(),
            token.text(module.source()),
            token.spacing(),
        );
    }
    out
}

/// Builder for creating an [UmbraC] instance.
#[derive(Debug)]
pub struct UmbraCBuilder {
    /// Number of jobs to run at once
    pub jobs: usize,
    pub output_directory: PathBuf,
    pub halt: HaltStage,
    pub emit: Vec<HaltStage>,
    pub layout: TargetLayout,
}

impl UmbraCBuilder {
    /// Creates an UmbraCBuilder with default settings.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    /// Sets the directory stage dumps are written into.
    pub fn output_directory<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.output_directory = path.as_ref().to_path_buf();
        self
    }

    /// Stops the pipeline after the given stage.
    pub fn halt_after(mut self, stage: HaltStage) -> Self {
        self.halt = stage;
        self
    }

    /// Requests a dump of each listed stage's output.
    pub fn emit(mut self, stages: Vec<HaltStage>) -> Self {
        self.emit = stages;
        self
    }

    pub fn layout(mut self, layout: TargetLayout) -> Self {
        self.layout = layout;
        self
    }

    /// Builds an [UmbraC] instance from this builder.
    pub fn build(self) -> Result<UmbraC, BuildUmbraCError> {
        if self.jobs == 0 {
            return Err(BuildUmbraCError::ZeroJobs);
        }

        let output_dir_meta = fs::metadata(&self.output_directory).map_err(|e| {
            BuildUmbraCError::OutputDirectoryDoesNotExist(self.output_directory.clone(), e)
        })?;
        if !output_dir_meta.is_dir() {
            return Err(BuildUmbraCError::OutputDirectoryIsNotADirectory(
                self.output_directory,
            ));
        }
        Ok(UmbraC {
            executor: Executor::from_jobs(self.jobs),
            output_directory: self.output_directory,
            halt: self.halt,
            emit: self.emit,
            layout: self.layout,
        })
    }
}

impl Default for UmbraCBuilder {
    fn default() -> Self {
        Self {
            jobs: num_cpus::get(),
            output_directory: PathBuf::from("."),
            halt: HaltStage::Resolve,
            emit: vec![],
            layout: TargetLayout::default(),
        }
    }
}

/// An error occurred while building an [UmbraC] instance.
#[derive(Debug, Error)]
pub enum BuildUmbraCError {
    #[error("{0:?} does not exist: {1}")]
    OutputDirectoryDoesNotExist(PathBuf, io::Error),
    #[error("{0:?} is not a directory")]
    OutputDirectoryIsNotADirectory(PathBuf),
    #[error("Compilation can't occur if no jobs are allowed")]
    ZeroJobs,
}

/// An error that stops an invocation outright, as opposed to a diagnostic
/// reported against source text.
#[derive(Debug, Error)]
pub enum UmbraCError {
    #[error("could not read {0:?}: {1}")]
    ReadSource(PathBuf, io::Error),
    #[error("could not start worker runtime: {0}")]
    Runtime(io::Error),
    #[error("could not write dump {0:?}: {1}")]
    WriteDump(PathBuf, io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_zero_jobs_is_a_build_error() {
        let result = UmbraC::builder().jobs(0).build();
        assert!(matches!(result, Err(BuildUmbraCError::ZeroJobs)));
    }

    #[test]
    fn test_missing_output_directory_is_a_build_error() {
        let result = UmbraC::builder()
            .output_directory("does/not/exist")
            .build();
        assert!(matches!(
            result,
            Err(BuildUmbraCError::OutputDirectoryDoesNotExist(..))
        ));
    }

    #[test]
    fn test_stage_order() {
        assert!(HaltStage::Tokenize < HaltStage::Parse);
        assert!(HaltStage::Tabulate < HaltStage::Resolve);
        assert_eq!(HaltStage::Situate.to_string(), "situate");
    }
}
