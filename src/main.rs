use std::io;
use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zipsnap::commands::{self, Cli, Commands};
use zipsnap::{Error, sysexits};

/// Entry point for the zipsnap CLI application.
/// Parses command-line arguments and dispatches to the appropriate command handler.
fn main() {
    let cli = Cli::parse();
    let commands = match cli.commands {
        Some(commands) => commands,
        None => {
            eprintln!("zsnap requires a command to execute. See 'zsnap --help' for usage.");
            process::exit(sysexits::EX_USAGE);
        }
    };

    init_logging(cli.quiet);

    let result = match commands {
        Commands::Backup {
            config,
            output,
            workers,
            fail_fast,
        } => commands::backup(&config, output, workers, fail_fast),
        Commands::Restore {
            input,
            root_dir,
            workers,
            fail_fast,
            backup_before_restore,
        } => commands::restore(&input, root_dir, workers, fail_fast, backup_before_restore),
        Commands::Config {
            backup,
            view,
            output,
        } => commands::config(&backup, &view, output),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        let code = e
            .downcast_ref::<Error>()
            .map(exit_code)
            .unwrap_or(sysexits::EX_IOERR);
        process::exit(code);
    }
}

fn init_logging(quiet: bool) {
    let default = if quiet { "error" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn exit_code(e: &Error) -> i32 {
    match e {
        Error::InvalidConfig(_) | Error::TomlSer(_) | Error::TomlDe(_) => sysexits::EX_CONFIG,
        Error::MissingFileMap
        | Error::MissingEntry(_)
        | Error::NothingToRestore
        | Error::Zip(_) => sysexits::EX_DATAERR,
        Error::Io(source) if source.kind() == io::ErrorKind::NotFound => sysexits::EX_NOINPUT,
        Error::Join(_) | Error::PoolClosed => sysexits::EX_SOFTWARE,
        Error::Io(_) | Error::ItemFailed { .. } => sysexits::EX_IOERR,
    }
}
