use std::io::{stderr, stdout};

use clap::Parser;
use fern::Dispatch;
use log::{debug, trace, Level, LevelFilter};
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use umbrac::args::Args;
use umbrac::UmbraC;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;
    let args = Args::parse();
    init_logging(args.log_level_filter())?;
    trace!("starting umbrac with args: {args:?}");
    debug!("paths to compile:");
    for file in &args.files {
        debug!("  - {file:?}")
    }

    let mut umbra_c = UmbraC::builder()
        .jobs(args.jobs())
        .output_directory(&args.output_directory)
        .halt_after(args.halt_after)
        .emit(args.emit.clone())
        .build()?;

    let compilation = umbra_c.compile_all(args.files)?;
    compilation.context.render_diagnostics(&mut stderr())?;
    if !compilation.succeeded {
        std::process::exit(1);
    }
    Ok(())
}

fn init_logging(level_filter: LevelFilter) -> eyre::Result<()> {
    Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{}]: {}",
                record.level().if_supports_color(Stdout, |text| match text {
                    Level::Error => {
                        text.bright_red().to_string()
                    }
                    Level::Warn => {
                        text.bright_yellow().to_string()
                    }
                    Level::Info => {
                        text.green().to_string()
                    }
                    Level::Debug => {
                        text.blue().to_string()
                    }
                    Level::Trace => {
                        text.purple().to_string()
                    }
                }),
                message
            ))
        })
        .level(level_filter)
        .chain(
            Dispatch::new()
                .filter(|l| l.level() > Level::Error)
                .chain(stdout()),
        )
        .chain(
            Dispatch::new()
                .filter(|l| l.level() == Level::Error)
                .chain(stderr()),
        )
        .apply()?;
    Ok(())
}
