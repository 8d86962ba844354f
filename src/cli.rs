use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "yarn-minify",
    version,
    about = "Collapse yarn.lock entries whose requirements can share one resolved version."
)]
pub struct Cli {
    /// Lockfile to minify
    #[arg(default_value = "yarn.lock")]
    pub lockfile: PathBuf,
    /// Write the result here instead of overwriting the lockfile
    #[arg(short, long)]
    pub output: Option<PathBuf>,
    /// Leave a package untouched; accepts names and globs such as `@babel/*`
    #[arg(
        short,
        long = "exclude",
        value_name = "PATTERN",
        env = "YARN_MINIFY_EXCLUDE",
        value_delimiter = ','
    )]
    pub exclude: Vec<String>,
    /// Exit with status 1 if the lockfile is not already minimal; writes nothing
    #[arg(long, conflicts_with = "output")]
    pub check: bool,
    /// Summary format printed on stdout
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,
    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}
