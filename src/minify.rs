use crate::collapse;
use crate::error::{Error, Result};
use crate::fsutil::write_atomic;
use crate::lockfile::Lockfile;
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Options for [`minify`].
///
/// - `output`: where to write the result; defaults to the input path.
/// - `exclude`: packages to leave untouched; defaults to none.
/// - `check`: compute the result without writing anything.
pub struct MinifyOptions {
    pub output: Option<PathBuf>,
    pub exclude: Box<dyn Fn(&str) -> bool>,
    pub check: bool,
}

impl Default for MinifyOptions {
    fn default() -> Self {
        Self {
            output: None,
            exclude: Box::new(|_| false),
            check: false,
        }
    }
}

impl fmt::Debug for MinifyOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MinifyOptions")
            .field("output", &self.output)
            .field("check", &self.check)
            .finish_non_exhaustive()
    }
}

impl MinifyOptions {
    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn exclude(mut self, exclude: impl Fn(&str) -> bool + 'static) -> Self {
        self.exclude = Box::new(exclude);
        self
    }

    pub fn check(mut self, check: bool) -> Self {
        self.check = check;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub output: PathBuf,
    pub entries: usize,
    pub blocks_before: usize,
    pub blocks_after: usize,
    pub rewritten: usize,
    /// Whether the written (or, in check mode, the would-be) text differs
    /// from the input.
    pub changed: bool,
}

/// Collapses the lockfile at `input` and writes it to `options.output`
/// (the input itself by default). Nothing is written unless the whole
/// lockfile collapses successfully.
pub fn minify(input: &Path, options: &MinifyOptions) -> Result<Summary> {
    let output = options.output.as_deref().unwrap_or(input);

    let text = fs::read_to_string(input).map_err(|e| Error::read(input, e))?;
    let mut lock = Lockfile::parse(&text, input)?;
    debug!(path = %input.display(), entries = lock.len(), "loaded lockfile");

    let blocks_before = lock.distinct_records();
    let rewritten = collapse::collapse(&mut lock, &*options.exclude)?;
    let rendered = lock.render();

    let summary = Summary {
        output: output.to_path_buf(),
        entries: lock.len(),
        blocks_before,
        blocks_after: lock.distinct_records(),
        rewritten,
        changed: rendered != text,
    };

    if options.check {
        info!(
            path = %input.display(),
            changed = summary.changed,
            "checked lockfile"
        );
        return Ok(summary);
    }

    write_atomic(output, &rendered).map_err(|e| Error::write(output, e))?;
    info!(
        path = %output.display(),
        rewritten,
        blocks_before,
        blocks_after = summary.blocks_after,
        "wrote lockfile"
    );
    Ok(summary)
}
