//! The bundler collaborator seam.
//!
//! Compiling an entry into a browser bundle is generic machinery this crate
//! consumes, not implements. [`Bundler`] is the seam; the default
//! implementation shells out to `esbuild`. The pipeline only sees the
//! returned manifest of compiled assets.

use std::path::Path;
use std::process::Command;

use crate::builder::BuildError;
use crate::config::Mode;
use crate::entries::Entry;

/// Kind of a compiled asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Script,
    Stylesheet,
}

/// One compiled output, addressed by its final bundle filename.
///
/// Exclusion patterns and inline references are evaluated against
/// `filename`, never against source paths.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledAsset {
    /// Path relative to the output root, e.g. `wistia-s3.min.js` or
    /// `css/demo.css`.
    pub filename: String,

    pub kind: AssetKind,

    /// Name of the entry this asset was compiled from.
    pub entry: String,
}

/// The complete compiled-asset set of one build.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetManifest {
    assets: Vec<CompiledAsset>,
}

impl AssetManifest {
    pub fn push(&mut self, asset: CompiledAsset) {
        self.assets.push(asset);
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledAsset> {
        self.assets.iter()
    }

    pub fn contains(&self, filename: &str) -> bool {
        self.assets.iter().any(|a| a.filename == filename)
    }

    /// Assets compiled from `entry`, scripts before stylesheets.
    pub fn for_entry<'a>(&'a self, entry: &'a str) -> impl Iterator<Item = &'a CompiledAsset> {
        self.assets.iter().filter(move |a| a.entry == entry)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

/// Final bundle filename for an entry: `<name>.js` in development,
/// `<name>.min.js` in production.
pub fn bundle_filename(entry: &str, mode: Mode) -> String {
    match mode {
        Mode::Development => format!("{entry}.js"),
        Mode::Production => format!("{entry}.min.js"),
    }
}

/// Compiles a set of entries into bundles under an output root.
///
/// Implementations are opaque to the pipeline: they may compile entries
/// concurrently, but the call blocks until the full manifest is ready.
pub trait Bundler {
    fn bundle(
        &self,
        entries: &[Entry],
        mode: Mode,
        minify: bool,
        out_dir: &Path,
    ) -> Result<AssetManifest, BuildError>;
}

/// Bundler backed by the `esbuild` executable.
pub struct EsbuildBundler {
    binary: String,
}

impl EsbuildBundler {
    pub fn new() -> Self {
        Self {
            binary: "esbuild".to_string(),
        }
    }

    /// Use a specific esbuild executable instead of the one on `PATH`.
    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for EsbuildBundler {
    fn default() -> Self {
        Self::new()
    }
}

/// Arguments for one entry compilation.
fn esbuild_args(entry: &Entry, mode: Mode, minify: bool, out_dir: &Path) -> Vec<String> {
    let outfile = out_dir.join(bundle_filename(&entry.name, mode));

    let mut args = vec![
        entry.source.display().to_string(),
        "--bundle".to_string(),
        format!("--outfile={}", outfile.display()),
    ];

    match mode {
        Mode::Production => {
            if minify {
                args.push("--minify".to_string());
                args.push("--drop:console".to_string());
            }
        }
        Mode::Development => {
            args.push("--sourcemap".to_string());
        }
    }

    args
}

impl Bundler for EsbuildBundler {
    fn bundle(
        &self,
        entries: &[Entry],
        mode: Mode,
        minify: bool,
        out_dir: &Path,
    ) -> Result<AssetManifest, BuildError> {
        let mut manifest = AssetManifest::default();

        for entry in entries {
            let args = esbuild_args(entry, mode, minify, out_dir);
            tracing::debug!("{} {}", self.binary, args.join(" "));

            let output = Command::new(&self.binary).args(&args).output().map_err(|e| {
                BuildError::Compilation {
                    entry: entry.name.clone(),
                    message: format!("failed to run {}: {}", self.binary, e),
                }
            })?;

            if !output.status.success() {
                // Compiler diagnostics propagate verbatim; nothing here can
                // interpret or recover from them.
                return Err(BuildError::Compilation {
                    entry: entry.name.clone(),
                    message: String::from_utf8_lossy(&output.stderr).into_owned(),
                });
            }

            let filename = bundle_filename(&entry.name, mode);
            tracing::info!("compiled {} -> {}", entry.source.display(), filename);
            manifest.push(CompiledAsset {
                filename,
                kind: AssetKind::Script,
                entry: entry.name.clone(),
            });
        }

        Ok(manifest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn loader_entry() -> Entry {
        Entry {
            name: "wistia-s3".to_string(),
            source: PathBuf::from("src/main.js"),
            styles: vec![],
            required_params: vec![],
        }
    }

    #[test]
    fn bundle_names_follow_the_mode() {
        assert_eq!(bundle_filename("wistia-s3", Mode::Development), "wistia-s3.js");
        assert_eq!(bundle_filename("wistia-s3", Mode::Production), "wistia-s3.min.js");
        assert_eq!(bundle_filename("demo", Mode::Production), "demo.min.js");
    }

    #[test]
    fn production_args_minify_and_drop_console() {
        let args = esbuild_args(&loader_entry(), Mode::Production, true, Path::new("dist"));

        assert!(args.contains(&"--minify".to_string()));
        assert!(args.contains(&"--drop:console".to_string()));
        assert!(!args.iter().any(|a| a == "--sourcemap"));
        assert!(args.iter().any(|a| a.ends_with("wistia-s3.min.js")));
    }

    #[test]
    fn development_args_keep_sourcemaps_and_skip_minify() {
        let args = esbuild_args(&loader_entry(), Mode::Development, true, Path::new("dist"));

        assert!(args.contains(&"--sourcemap".to_string()));
        assert!(!args.iter().any(|a| a == "--minify"));
        assert!(args.iter().any(|a| a.ends_with("wistia-s3.js")));
    }

    #[test]
    fn no_minify_override_is_honored_in_production() {
        let args = esbuild_args(&loader_entry(), Mode::Production, false, Path::new("dist"));

        assert!(!args.iter().any(|a| a == "--minify"));
    }

    #[test]
    fn manifest_lookups() {
        let mut manifest = AssetManifest::default();
        manifest.push(CompiledAsset {
            filename: "wistia-s3.min.js".to_string(),
            kind: AssetKind::Script,
            entry: "wistia-s3".to_string(),
        });
        manifest.push(CompiledAsset {
            filename: "css/demo.css".to_string(),
            kind: AssetKind::Stylesheet,
            entry: "demo".to_string(),
        });

        assert!(manifest.contains("wistia-s3.min.js"));
        assert!(!manifest.contains("demo.min.js"));
        assert_eq!(manifest.for_entry("demo").count(), 1);
    }
}
