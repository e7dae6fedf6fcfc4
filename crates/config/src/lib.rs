//! # Config - shell settings from the environment
//!
//! Every setting has a default and is read from a `TAGTREE_*` variable.
//! Values that fail to parse fall back to the default rather than aborting.
//!
//! ```text
//! TAGTREE_LAYERS           layer files loaded at start   (default: none; path-list syntax)
//! TAGTREE_MERGE_LEVEL      nested levels merged           (default: 1)
//! TAGTREE_MERGE_SEQUENCES  concatenate sequences          (default: true)
//! TAGTREE_MERGE_MAPS       union maps by key              (default: true)
//! TAGTREE_INDENT           DUMP indent step in spaces     (default: 2)
//! TAGTREE_LOG              tracing filter directive       (default: "warn")
//! ```

use std::path::PathBuf;
use std::str::FromStr;

pub const DEFAULT_MERGE_LEVEL: u16 = 1;
pub const DEFAULT_INDENT: usize = 2;
pub const DEFAULT_LOG: &str = "warn";

/// Resolved shell settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub layers: Vec<PathBuf>,
    pub merge_level: u16,
    pub merge_sequences: bool,
    pub merge_maps: bool,
    pub indent: usize,
    pub log: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            layers: Vec::new(),
            merge_level: DEFAULT_MERGE_LEVEL,
            merge_sequences: true,
            merge_maps: true,
            indent: DEFAULT_INDENT,
            log: DEFAULT_LOG.to_string(),
        }
    }
}

impl Config {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads settings through `lookup`, which maps a variable name to its value.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let layers = lookup("TAGTREE_LAYERS")
            .map(|v| std::env::split_paths(&v).filter(|p| !p.as_os_str().is_empty()).collect())
            .unwrap_or_default();

        Self {
            layers,
            merge_level: parse_or(&lookup, "TAGTREE_MERGE_LEVEL", defaults.merge_level),
            merge_sequences: parse_or(&lookup, "TAGTREE_MERGE_SEQUENCES", defaults.merge_sequences),
            merge_maps: parse_or(&lookup, "TAGTREE_MERGE_MAPS", defaults.merge_maps),
            indent: parse_or(&lookup, "TAGTREE_INDENT", defaults.indent),
            log: lookup("TAGTREE_LOG")
                .filter(|v| !v.trim().is_empty())
                .unwrap_or(defaults.log),
        }
    }
}

fn parse_or<T, F>(lookup: &F, key: &str, default: T) -> T
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
