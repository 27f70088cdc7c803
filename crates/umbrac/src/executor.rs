//! How per-module stages are scheduled.
//!
//! The strategy is chosen at startup from `--jobs` and injected into the
//! driver, so the concurrency mode is visible configuration rather than a
//! silent fallback. Either way the call returns only once every module has
//! finished, which is the barrier the cross-module stages rely on.

use std::io;
use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{error_span, Instrument};
use umbra_sema::SituationTable;

use crate::compiler::HaltStage;
use crate::context::CollectedDiagnostics;
use crate::module::Module;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Executor {
    /// Sequential execution on the calling thread.
    Inline,
    /// Fan-out over a tokio runtime with this many worker threads.
    Parallel(usize),
}

impl Executor {
    /// One job runs inline; more fan out.
    pub fn from_jobs(jobs: usize) -> Self {
        if jobs <= 1 {
            Executor::Inline
        } else {
            Executor::Parallel(jobs)
        }
    }

    /// Runs tokenize, parse, and situation for every module, honoring `halt`.
    pub fn run_front_end(
        &self,
        modules: Vec<Module>,
        halt: HaltStage,
        situations: Arc<SituationTable>,
        sink: Arc<CollectedDiagnostics>,
    ) -> io::Result<Vec<Module>> {
        match self {
            Executor::Inline => {
                let mut modules = modules;
                for module in &mut modules {
                    module.run_front_end(halt, &situations, &*sink);
                }
                Ok(modules)
            }
            Executor::Parallel(jobs) => {
                let runtime = tokio::runtime::Builder::new_multi_thread()
                    .worker_threads(*jobs)
                    .build()?;
                Ok(runtime.block_on(async move {
                    let mut join_set = JoinSet::new();
                    for mut module in modules {
                        let situations = Arc::clone(&situations);
                        let sink = Arc::clone(&sink);
                        let name = module.name().to_string();
                        join_set.spawn(
                            async move {
                                module.run_front_end(halt, &situations, &*sink);
                                module
                            }
                            .instrument(error_span!("front_end", module = %name)),
                        );
                    }
                    join_set.join_all().await
                }))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_one_job_is_inline() {
        assert_eq!(Executor::from_jobs(1), Executor::Inline);
        assert_eq!(Executor::from_jobs(4), Executor::Parallel(4));
    }

    #[test]
    fn test_parallel_front_end_processes_every_module() {
        let modules = (0..8)
            .map(|i| Module::from_source(&format!("m{i}"), "var x: s32 = 1;\n"))
            .collect();
        let sink = Arc::new(CollectedDiagnostics::new());
        let situations = Arc::new(SituationTable::build());

        let executor = Executor::from_jobs(4);
        let modules = executor
            .run_front_end(modules, HaltStage::Resolve, situations, Arc::clone(&sink))
            .expect("runtime failed to start");

        assert_eq!(modules.len(), 8);
        for module in &modules {
            assert_eq!(module.stages.situate, Some(true));
        }
        assert!(sink.is_empty());
    }

    #[test]
    fn test_inline_front_end_matches_parallel() {
        let modules = vec![Module::from_source(
            "only",
            "proc id(x: s32) -> s32 {: return x; :}\n",
        )];
        let sink = Arc::new(CollectedDiagnostics::new());
        let situations = Arc::new(SituationTable::build());

        let modules = Executor::Inline
            .run_front_end(modules, HaltStage::Resolve, situations, sink)
            .expect("inline execution cannot fail to start");
        assert_eq!(modules[0].stages.situate, Some(true));
    }
}
