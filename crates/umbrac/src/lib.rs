//! The umbra compiler driver.
//!
//! Ties the front-end crates together into a pipeline over a set of source
//! files: tokenize, parse, situate, tabulate, resolve. The per-module stages
//! run through an [Executor] chosen at startup; the cross-module stages run
//! after a barrier so every module's scope tree is finished before any
//! module resolves against it.

pub mod args;
pub mod compiler;
pub mod context;
pub mod executor;
pub mod module;

pub use compiler::{BuildUmbraCError, Compilation, HaltStage, UmbraC, UmbraCBuilder, UmbraCError};
pub use context::{CollectedDiagnostics, Context};
pub use executor::Executor;
pub use module::Module;
