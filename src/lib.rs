pub mod app;
pub mod cli;
pub mod collapse;
mod error;
pub mod filter;
mod fsutil;
pub mod lockfile;
mod minify;
mod npm_semver;
pub mod yarn_lock;

pub use error::{Error, Result};
pub use lockfile::{EntryKey, Lockfile, Record};
pub use minify::{MinifyOptions, Summary, minify};
