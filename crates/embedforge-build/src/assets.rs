//! CSS bundling and post-bundle parameter injection.

use std::fs;
use std::path::Path;

use crate::builder::BuildError;
use crate::bundle::{AssetKind, AssetManifest, CompiledAsset};
use crate::config::{Mode, Params};
use crate::entries::Entry;
use crate::template;

/// Build the per-entry stylesheet bundles.
///
/// Each entry's configured stylesheets are concatenated to
/// `css/<name>.css` under the output root, minified in production.
/// Entries without stylesheets produce no CSS asset.
pub fn build_stylesheets(
    entries: &[Entry],
    mode: Mode,
    minify: bool,
    out_dir: &Path,
) -> Result<Vec<CompiledAsset>, BuildError> {
    let mut assets = Vec::new();

    for entry in entries {
        if entry.styles.is_empty() {
            continue;
        }

        let mut css = String::new();
        for path in &entry.styles {
            let content = fs::read_to_string(path).map_err(|e| BuildError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            css.push_str(&content);
            if !css.ends_with('\n') {
                css.push('\n');
            }
        }

        if mode == Mode::Production && minify {
            css = minify_css(&css)?;
        }

        let filename = format!("css/{}.css", entry.name);
        let out_path = out_dir.join(&filename);
        if let Some(parent) = out_path.parent() {
            fs::create_dir_all(parent).map_err(|e| BuildError::Write {
                path: parent.display().to_string(),
                message: e.to_string(),
            })?;
        }
        fs::write(&out_path, css).map_err(|e| BuildError::Write {
            path: out_path.display().to_string(),
            message: e.to_string(),
        })?;

        tracing::info!("bundled {} stylesheet(s) -> {}", entry.styles.len(), filename);
        assets.push(CompiledAsset {
            filename,
            kind: AssetKind::Stylesheet,
            entry: entry.name.clone(),
        });
    }

    Ok(assets)
}

/// Minify CSS using lightningcss.
pub fn minify_css(css: &str) -> Result<String, BuildError> {
    use lightningcss::stylesheet::{ParserOptions, PrinterOptions, StyleSheet};

    let stylesheet = StyleSheet::parse(css, ParserOptions::default())
        .map_err(|e| BuildError::Config(format!("CSS parse error: {e}")))?;

    let minified = stylesheet
        .to_css(PrinterOptions {
            minify: true,
            ..Default::default()
        })
        .map_err(|e| BuildError::Config(format!("CSS minify error: {e}")))?;

    Ok(minified.code)
}

/// Substitute each entry's required parameters into its compiled bundles.
///
/// The entry scripts carry `{{.Name}}` placeholders through compilation
/// (string literals survive bundling and minification); this pass resolves
/// them before the artifact set is published. Entries that declare no
/// parameters are left untouched.
pub fn inject_entry_params(
    entries: &[Entry],
    manifest: &AssetManifest,
    params: &Params,
    out_dir: &Path,
) -> Result<(), BuildError> {
    for entry in entries {
        if entry.required_params.is_empty() {
            continue;
        }

        for asset in manifest.for_entry(&entry.name) {
            if asset.kind != AssetKind::Script {
                continue;
            }

            let path = out_dir.join(&asset.filename);
            let compiled = fs::read_to_string(&path).map_err(|e| BuildError::Read {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;

            let resolved = template::substitute(&asset.filename, &compiled, params)?;
            if resolved != compiled {
                fs::write(&path, resolved).map_err(|e| BuildError::Write {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?;
                tracing::debug!("injected parameters into {}", asset.filename);
            }
        }
    }

    Ok(())
}
