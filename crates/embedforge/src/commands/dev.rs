//! Development server command.

use std::path::Path;

use anyhow::Result;
use embedforge_build::{BuildConfig, Mode, Params, ProjectConfig};
use embedforge_server::{DevServer, DevServerConfig};

use super::build::project_dir;

/// Run the dev server.
pub async fn run(config_path: &Path, port: u16, open: bool) -> Result<()> {
    tracing::info!("Starting development server on port {}", port);

    let project = ProjectConfig::load(config_path)?;
    let params = Params::from_env(&project.params);

    // Running the dev server is the development signal.
    let build = BuildConfig::new(
        project_dir(config_path),
        project,
        Mode::Development,
        params,
    );

    let config = DevServerConfig {
        project_dir: project_dir(config_path).to_path_buf(),
        port,
        open,
        ..Default::default()
    };

    DevServer::new(config, build).start().await?;

    Ok(())
}
