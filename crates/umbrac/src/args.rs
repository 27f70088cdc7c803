//! the args for running umbrac

use clap::value_parser;
use clap::ArgAction;
use log::LevelFilter;
use std::path::PathBuf;

use crate::compiler::HaltStage;

/// The args struct
#[derive(Debug, clap::Parser)]
#[clap(author, version, about = "Runs the umbra front end over umbra source files")]
pub struct Args {
    #[clap(short = 'v', value_parser = value_parser!(u8).range(0..=2), action=ArgAction::Count, conflicts_with="quiet")]
    verbose: u8,
    #[clap(short = 'q', value_parser = value_parser!(u8).range(0..=2), action=ArgAction::Count, conflicts_with="verbose")]
    quiet: u8,

    /// Specify which source files to compile
    #[clap(required = true, value_name="source file", value_hint=clap::ValueHint::FilePath)]
    pub files: Vec<PathBuf>,
    /// Specify where to place stage dumps
    #[clap(short = 'd', default_value = ".")]
    pub output_directory: PathBuf,
    /// Stop the pipeline after this stage
    #[clap(long = "halt-after", value_enum, default_value_t = HaltStage::Resolve)]
    pub halt_after: HaltStage,
    /// Write a human-readable dump of this stage's output for every module.
    ///
    /// Can be given multiple times; stages past the halt stage are ignored.
    #[clap(long = "emit", value_enum)]
    pub emit: Vec<HaltStage>,
    /// Number of worker threads for the per-module stages
    #[clap(short = 'j', long = "jobs")]
    jobs: Option<usize>,
}

impl Args {
    /// Gets the logging level based on whether `-v[v]` or `-q[q]` has been used.
    pub fn log_level_filter(&self) -> LevelFilter {
        let sum = self.verbose as i8 - self.quiet as i8;
        match sum {
            -2 => LevelFilter::Off,
            -1 => LevelFilter::Error,
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            2 => LevelFilter::Trace,
            _ => unreachable!(),
        }
    }

    /// Worker count, defaulting to the number of available cpus.
    pub fn jobs(&self) -> usize {
        self.jobs.unwrap_or_else(num_cpus::get)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn test_args_parsing() {
        let test = "umbrac file.um";
        let args = Args::try_parse_from(test.split(" ")).expect("could not parse test string");
        assert_eq!(args.files[0], Path::new("file.um"));
        assert_eq!(args.halt_after, HaltStage::Resolve);
        assert_eq!(args.log_level_filter(), LevelFilter::Info);
    }

    #[test]
    fn test_halt_and_emit_parsing() {
        let test = "umbrac --halt-after situate --emit tokenize --emit situate -j 2 file.um";
        let args = Args::try_parse_from(test.split(" ")).expect("could not parse test string");
        assert_eq!(args.halt_after, HaltStage::Situate);
        assert_eq!(args.emit, vec![HaltStage::Tokenize, HaltStage::Situate]);
        assert_eq!(args.jobs(), 2);
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        let test = "umbrac -v -q file.um";
        assert!(Args::try_parse_from(test.split(" ")).is_err());
    }
}
