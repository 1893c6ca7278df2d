//! Artifact build command.

use std::path::{Path, PathBuf};

use anyhow::Result;
use embedforge_build::{BuildConfig, Builder, Mode, Params, ProjectConfig};

/// Directory holding the project file, for resolving relative paths.
pub(crate) fn project_dir(config_path: &Path) -> &Path {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Run the build command.
pub async fn run(config_path: &Path, output: Option<PathBuf>, no_minify: bool) -> Result<()> {
    let project = ProjectConfig::load(config_path)?;

    // The mode signal is read once here and threaded as a value from now
    // on; nothing downstream consults the environment again.
    let mode = Mode::from_env();
    let params = Params::from_env(&project.params);

    let mut config = BuildConfig::new(project_dir(config_path), project, mode, params);
    if let Some(output) = output {
        config.output_dir = output;
    }
    if no_minify {
        config.minify = false;
    }

    let result = Builder::new(config).build()?;

    tracing::info!(
        "Built {} documents with {} assets in {}ms",
        result.documents,
        result.assets,
        result.duration_ms
    );
    tracing::info!("Output: {}", result.output_dir.display());

    Ok(())
}
