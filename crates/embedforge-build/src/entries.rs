//! Entry resolution: which source units get compiled for this build.

use std::path::{Path, PathBuf};

use crate::builder::BuildError;
use crate::config::{EntryConfig, Params, ProjectConfig};

/// Name of the widget loader entry. Always built.
pub const LOADER_ENTRY: &str = "wistia-s3";

/// Name of the demo page entry. Built only when configured.
pub const DEMO_ENTRY: &str = "demo";

/// A named source unit compiled into one deployable bundle.
///
/// Immutable for the build's lifetime.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub name: String,

    /// Resolved source path.
    pub source: PathBuf,

    /// Resolved stylesheet paths, bundled to `css/<name>.css`.
    pub styles: Vec<PathBuf>,

    /// Parameters substituted into the compiled bundle. Must all be
    /// resolvable before any compilation work starts.
    pub required_params: Vec<String>,
}

/// Resolve the ordered entry set for this build.
///
/// The loader entry is always first; the demo entry follows when the
/// project designates one. An absent demo table is a valid configuration.
/// Unresolvable required parameters fail here, before the bundler runs.
pub fn resolve_entries(
    config: &ProjectConfig,
    src_dir: &Path,
    params: &Params,
) -> Result<Vec<Entry>, BuildError> {
    let mut entries = vec![make_entry(LOADER_ENTRY, &config.loader, src_dir)];

    if let Some(demo) = &config.demo {
        entries.push(make_entry(DEMO_ENTRY, demo, src_dir));
    } else {
        tracing::debug!("no demo entry configured");
    }

    for entry in &entries {
        for name in &entry.required_params {
            if !params.contains(name) {
                return Err(BuildError::MissingParameter {
                    name: name.clone(),
                    context: format!("entry `{}`", entry.name),
                });
            }
        }
    }

    Ok(entries)
}

fn make_entry(name: &str, config: &EntryConfig, src_dir: &Path) -> Entry {
    Entry {
        name: name.to_string(),
        source: src_dir.join(&config.source),
        styles: config.styles.iter().map(|s| src_dir.join(s)).collect(),
        required_params: config.params.clone(),
    }
}
