//! thermal - print the temperature of every kernel thermal zone
//!
//! ```text
//! $ thermal
//! thermal_zone0: cpu-thermal: 45.500°C
//! ```

mod sysfs;

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Result};
use clap::error::ErrorKind;
use clap::Parser;
use hostpin_core::devices::{Environment, Sensor};
use hostpin_core::host;
use tracing::{debug, level_filters::LevelFilter};

/// Reads the state of thermal sensors exposed via sysfs
#[derive(Debug, Parser)]
#[command(name = "thermal", version)]
struct Args {
    /// Verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Where sysfs is mounted
    #[arg(long, default_value = "/sys")]
    sysfs: PathBuf,
}

/// Parse the command line; only help and version exit directly
fn parse_args<I, T>(argv: I) -> Result<Args>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    match Args::try_parse_from(argv) {
        Ok(args) => Ok(args),
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => err.exit(),
            ErrorKind::UnknownArgument => bail!("unexpected argument, try --help"),
            _ => {
                let text = err.to_string();
                let line = text.lines().next().unwrap_or_default();
                bail!("{}", line.strip_prefix("error: ").unwrap_or(line))
            }
        },
    }
}

fn run(args: &Args, out: &mut impl Write) -> Result<()> {
    let state = host::init();
    debug!(loaded = ?state.loaded, "host ready");
    if let Some(failure) = state.failed.first() {
        bail!("driver {} failed: {}", failure.name, failure.reason);
    }

    for mut zone in sysfs::thermal_zones(&args.sysfs)? {
        let mut env = Environment::default();
        zone.sense(&mut env)?;
        writeln!(out, "{}: {}: {}", zone.name(), zone.kind(), env.temperature)?;
    }
    Ok(())
}

/// Print a failure as `thermal: <error>.` and return the exit status
fn report(result: Result<()>, err_out: &mut impl Write) -> u8 {
    match result {
        Ok(()) => 0,
        Err(err) => {
            // Nothing sensible is left to do if stderr is gone
            let _ = writeln!(err_out, "thermal: {:#}.", err);
            1
        }
    }
}

fn main() -> ExitCode {
    let result = parse_args(std::env::args_os()).and_then(|args| {
        let level = if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::OFF
        };
        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_max_level(level)
            .init();
        run(&args, &mut io::stdout().lock())
    });
    ExitCode::from(report(result, &mut io::stderr().lock()))
}
