use crate::cli::{Cli, OutputFormat};
use crate::filter::PackageFilter;
use crate::minify::{MinifyOptions, Summary, minify};
use anyhow::{Context, Result};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Exit status for a finished run: 0 when done, 1 when `--check` finds work
/// to do, 2 on any error.
pub fn exit_code(result: Result<ExitCode>) -> ExitCode {
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(2)
        }
    }
}

pub fn run(cli: Cli) -> Result<ExitCode> {
    init_tracing(cli.verbose, cli.quiet);
    execute(&cli, &mut io::stdout().lock())
}

fn execute(cli: &Cli, out: &mut impl Write) -> Result<ExitCode> {
    let filter = PackageFilter::new(&cli.exclude).context("invalid --exclude pattern")?;
    if !filter.is_empty() {
        tracing::debug!(patterns = ?cli.exclude, "excluding packages");
    }

    let mut options = MinifyOptions::default()
        .exclude(move |package| filter.is_match(package))
        .check(cli.check);
    if let Some(output) = &cli.output {
        options = options.output(output);
    }

    let summary = minify(&cli.lockfile, &options)
        .with_context(|| format!("minify {}", cli.lockfile.display()))?;

    if !cli.quiet {
        report(cli, &summary, out)?;
    }

    if cli.check && summary.changed {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}

fn report(cli: &Cli, summary: &Summary, out: &mut impl Write) -> Result<()> {
    match cli.format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?,
        OutputFormat::Text if cli.check && summary.changed => writeln!(
            out,
            "{} is not minimal ({} blocks, {} after collapsing)",
            cli.lockfile.display(),
            summary.blocks_before,
            summary.blocks_after
        )?,
        OutputFormat::Text if cli.check => {
            writeln!(out, "{} is already minimal", cli.lockfile.display())?
        }
        OutputFormat::Text => writeln!(
            out,
            "{}: {} requirements rewritten, {} -> {} blocks",
            summary.output.display(),
            summary.rewritten,
            summary.blocks_before,
            summary.blocks_after
        )?,
    }
    Ok(())
}

fn init_tracing(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "warn",
        (false, 1) => "info",
        (false, 2) => "debug",
        (false, _) => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .try_init();
}
