//! Build orchestration.
//!
//! Composes entry resolution, bundling, document planning, substitution and
//! inlining into one all-or-nothing build: the artifact set is assembled in
//! a staging directory and swapped into the output path only on success, so
//! a failed build never leaves partial files claiming to be current.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use walkdir::WalkDir;

use crate::assets;
use crate::bundle::{bundle_filename, AssetManifest, Bundler, EsbuildBundler};
use crate::config::{Mode, Params, ProjectConfig};
use crate::entries::{resolve_entries, Entry, LOADER_ENTRY};
use crate::inline::{inline_document, local_references};
use crate::plan::{default_documents, inject_assets, plan_assets, plan_documents, DocumentSpec};
use crate::template;

/// Script tag wiring a development build to the dev server's reload socket.
const HMR_SCRIPT_TAG: &str = "<script src=\"/__hmr.js\"></script>\n";

/// Name of the artifact listing written into every build.
pub const MANIFEST_FILE: &str = "embed-manifest.json";

/// Errors that can occur during a build. All are fatal; none are retried.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("missing value for parameter `{name}` (referenced by {context})")]
    MissingParameter { name: String, context: String },

    #[error("document `{document}` references unknown entry `{entry}`")]
    UnknownEntryReference { document: String, entry: String },

    #[error("bundler failed for entry `{entry}`: {message}")]
    Compilation { entry: String, message: String },

    #[error("document `{document}` references `{target}` which matches no compiled asset")]
    InliningTargetNotFound { document: String, target: String },

    #[error("invalid asset pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to read {path}: {message}")]
    Read { path: String, message: String },

    #[error("failed to write {path}: {message}")]
    Write { path: String, message: String },
}

/// Configuration for one build invocation.
///
/// Everything here is resolved once, before the build starts; the pipeline
/// never reads ambient state afterwards.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Directory holding entry sources and document templates.
    pub src_dir: PathBuf,

    /// Final artifact directory.
    pub output_dir: PathBuf,

    pub mode: Mode,

    /// Minify JS/CSS. Only effective in production.
    pub minify: bool,

    /// The resolved global parameter binding.
    pub params: Params,

    pub project: ProjectConfig,
}

impl BuildConfig {
    /// Assemble a build config from a loaded project file.
    pub fn new(project_dir: &Path, project: ProjectConfig, mode: Mode, params: Params) -> Self {
        Self {
            src_dir: project.src_dir(project_dir),
            output_dir: project.output_dir(project_dir),
            mode,
            minify: project.build.minify,
            params,
            project,
        }
    }
}

/// Result of a successful build.
#[derive(Debug)]
pub struct BuildResult {
    /// Number of HTML documents emitted.
    pub documents: usize,

    /// Number of compiled assets in the published set.
    pub assets: usize,

    /// Total build time in milliseconds.
    pub duration_ms: u64,

    pub output_dir: PathBuf,
}

/// Embed artifact builder.
pub struct Builder {
    config: BuildConfig,
    bundler: Box<dyn Bundler>,
}

impl Builder {
    /// Create a builder using the esbuild collaborator.
    pub fn new(config: BuildConfig) -> Self {
        Self::with_bundler(config, Box::new(EsbuildBundler::new()))
    }

    /// Create a builder with a specific bundler implementation.
    pub fn with_bundler(config: BuildConfig, bundler: Box<dyn Bundler>) -> Self {
        Self { config, bundler }
    }

    /// Run the build: resolve entries, compile, plan and render documents,
    /// then atomically publish the artifact set.
    pub fn build(&self) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let config = &self.config;

        tracing::info!(
            "building embed artifacts ({} mode)",
            if config.mode.is_development() { "development" } else { "production" }
        );

        // Fail on configuration defects before any compilation cost.
        let entries = resolve_entries(&config.project, &config.src_dir, &config.params)?;
        let documents = plan_documents(
            default_documents(&config.project, &entries),
            &entries,
            config.mode,
        )?;

        let staging = staging_dir(&config.output_dir);
        if staging.exists() {
            fs::remove_dir_all(&staging).map_err(|e| BuildError::Write {
                path: staging.display().to_string(),
                message: e.to_string(),
            })?;
        }
        fs::create_dir_all(&staging).map_err(|e| BuildError::Write {
            path: staging.display().to_string(),
            message: e.to_string(),
        })?;

        let outcome = self.build_into(&staging, &entries, &documents);

        match outcome {
            Ok((documents, assets)) => {
                publish(&staging, &config.output_dir)?;
                let duration = start.elapsed();
                tracing::info!(
                    "built {} document(s) and {} asset(s) in {}ms",
                    documents,
                    assets,
                    duration.as_millis()
                );
                Ok(BuildResult {
                    documents,
                    assets,
                    duration_ms: duration.as_millis() as u64,
                    output_dir: config.output_dir.clone(),
                })
            }
            Err(e) => {
                let _ = fs::remove_dir_all(&staging);
                Err(e)
            }
        }
    }

    /// Assemble the full artifact set under `staging`.
    fn build_into(
        &self,
        staging: &Path,
        entries: &[Entry],
        documents: &[DocumentSpec],
    ) -> Result<(usize, usize), BuildError> {
        let config = &self.config;

        let mut manifest = self
            .bundler
            .bundle(entries, config.mode, config.minify, staging)?;
        for asset in assets::build_stylesheets(entries, config.mode, config.minify, staging)? {
            manifest.push(asset);
        }
        assets::inject_entry_params(entries, &manifest, &config.params, staging)?;

        let mut consumed: BTreeSet<String> = BTreeSet::new();
        let mut manual: BTreeSet<String> = BTreeSet::new();
        let mut rendered: Vec<(String, String)> = Vec::new();

        for doc in documents {
            let html = self.render_document(doc, &manifest, staging, &mut consumed, &mut manual)?;
            rendered.push((doc.filename.clone(), html));
        }

        for (filename, html) in &rendered {
            let path = staging.join(filename);
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent).map_err(|e| BuildError::Write {
                    path: parent.display().to_string(),
                    message: e.to_string(),
                })?;
            }
            fs::write(&path, html).map_err(|e| BuildError::Write {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        }

        let omitted = self.prune_inlined(staging, &rendered, &consumed)?;
        let published = manifest.len() - omitted.len();
        let manual: BTreeSet<String> =
            manual.into_iter().filter(|f| !omitted.contains(f)).collect();

        write_manifest(staging, config.mode, &manual)?;

        Ok((rendered.len(), published))
    }

    /// Render one document: substitute its template, inject planned asset
    /// tags, wire hot reload (development) or inline (production).
    fn render_document(
        &self,
        doc: &DocumentSpec,
        manifest: &AssetManifest,
        staging: &Path,
        consumed: &mut BTreeSet<String>,
        manual: &mut BTreeSet<String>,
    ) -> Result<String, BuildError> {
        let config = &self.config;
        let template_path = config.src_dir.join(&doc.template);
        let raw = fs::read_to_string(&template_path).map_err(|e| BuildError::Read {
            path: template_path.display().to_string(),
            message: e.to_string(),
        })?;

        let doc_params = config.params.overlay(&doc.params);
        let html = template::substitute(&doc.template, &raw, &doc_params)?;

        let plan = plan_assets(doc, manifest)?;
        manual.extend(plan.manual.iter().cloned());
        let mut html = inject_assets(&html, &plan);

        match config.mode {
            Mode::Development => {
                html = crate::plan::insert_before(&html, "</body>", HMR_SCRIPT_TAG);
            }
            Mode::Production if doc.inline_after_build => {
                let outcome = inline_document(&doc.filename, &html, manifest, staging)?;
                html = outcome.html;
                consumed.extend(outcome.consumed);
            }
            Mode::Production => {}
        }

        tracing::info!("rendered {}", doc.filename);
        Ok(html)
    }

    /// Remove assets whose content was inlined and which no emitted
    /// document still references. The loader bundle is the deliverable and
    /// is always published.
    fn prune_inlined(
        &self,
        staging: &Path,
        rendered: &[(String, String)],
        consumed: &BTreeSet<String>,
    ) -> Result<BTreeSet<String>, BuildError> {
        let referenced: BTreeSet<String> = rendered
            .iter()
            .flat_map(|(_, html)| local_references(html))
            .collect();
        let loader = bundle_filename(LOADER_ENTRY, self.config.mode);

        let mut omitted = BTreeSet::new();
        for filename in consumed {
            if referenced.contains(filename) || *filename == loader {
                continue;
            }
            let path = staging.join(filename);
            fs::remove_file(&path).map_err(|e| BuildError::Write {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
            tracing::debug!("omitted inlined asset {}", filename);
            omitted.insert(filename.clone());
        }

        Ok(omitted)
    }
}

/// Staging directory sibling to the output directory.
fn staging_dir(output_dir: &Path) -> PathBuf {
    let name = output_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("dist");
    output_dir
        .parent()
        .unwrap_or(Path::new("."))
        .join(format!(".{name}.staging"))
}

/// Swap the staged artifact set into place.
fn publish(staging: &Path, output_dir: &Path) -> Result<(), BuildError> {
    if output_dir.exists() {
        fs::remove_dir_all(output_dir).map_err(|e| BuildError::Write {
            path: output_dir.display().to_string(),
            message: e.to_string(),
        })?;
    }
    fs::rename(staging, output_dir).map_err(|e| BuildError::Write {
        path: output_dir.display().to_string(),
        message: e.to_string(),
    })
}

/// Write the artifact listing.
///
/// Assets excluded from automatic injection but still published carry
/// `"manual": true`; that is the path a host page embeds by hand.
fn write_manifest(
    staging: &Path,
    mode: Mode,
    manual: &BTreeSet<String>,
) -> Result<(), BuildError> {
    let mut files: Vec<String> = WalkDir::new(staging)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| {
            e.path()
                .strip_prefix(staging)
                .ok()
                .map(|p| p.to_string_lossy().replace('\\', "/"))
        })
        .collect();
    files.sort();

    let artifacts: Vec<serde_json::Value> = files
        .iter()
        .map(|file| {
            serde_json::json!({
                "file": file,
                "kind": artifact_kind(file),
                "manual": manual.contains(file),
            })
        })
        .collect();

    let manifest = serde_json::json!({
        "mode": match mode {
            Mode::Development => "development",
            Mode::Production => "production",
        },
        "artifacts": artifacts,
    });

    let json = serde_json::to_string_pretty(&manifest).map_err(|e| BuildError::Write {
        path: MANIFEST_FILE.to_string(),
        message: e.to_string(),
    })?;

    let path = staging.join(MANIFEST_FILE);
    fs::write(&path, json).map_err(|e| BuildError::Write {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn artifact_kind(file: &str) -> &'static str {
    match Path::new(file).extension().and_then(|e| e.to_str()) {
        Some("html") => "document",
        Some("js") => "script",
        Some("css") => "stylesheet",
        Some("map") => "sourcemap",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{AssetKind, CompiledAsset};
    use std::collections::BTreeMap;
    use tempfile::{tempdir, TempDir};

    /// Copies each entry source through as its bundle, the way the real
    /// collaborator would after module resolution.
    struct FakeBundler;

    impl Bundler for FakeBundler {
        fn bundle(
            &self,
            entries: &[Entry],
            mode: Mode,
            _minify: bool,
            out_dir: &Path,
        ) -> Result<AssetManifest, BuildError> {
            let mut manifest = AssetManifest::default();
            for entry in entries {
                let source = fs::read_to_string(&entry.source).map_err(|e| {
                    BuildError::Compilation {
                        entry: entry.name.clone(),
                        message: e.to_string(),
                    }
                })?;
                let filename = bundle_filename(&entry.name, mode);
                fs::write(out_dir.join(&filename), source).unwrap();
                manifest.push(CompiledAsset {
                    filename,
                    kind: AssetKind::Script,
                    entry: entry.name.clone(),
                });
            }
            Ok(manifest)
        }
    }

    const INDEX_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{.VideoName}}</title></head>
<body>
<div class="wistia_embed wistia_async_{{.HashId}}">&nbsp;</div>
<script type="text/javascript" src="{{.WistiaS3JSUrl}}"></script>
</body>
</html>"#;

    const DEMO_TEMPLATE: &str = r#"<!DOCTYPE html>
<html>
<head><title>{{.VideoName}} demo</title></head>
<body><pre id="code-block-1"></pre></body>
</html>"#;

    fn scaffold() -> (TempDir, BuildConfig) {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(
            src.join("main.js"),
            r#"window.MEDIA_ENDPOINT = "{{.MediaEndPoint}}"; init("{{.TrackingID}}");"#,
        )
        .unwrap();
        fs::write(src.join("demo.js"), "document.querySelector('#code-block-1');").unwrap();
        fs::write(src.join("demo.css"), ".copy-btn { cursor: pointer }").unwrap();
        fs::write(src.join("index.html"), INDEX_TEMPLATE).unwrap();
        fs::write(src.join("demo.html"), DEMO_TEMPLATE).unwrap();

        let project: ProjectConfig = toml::from_str(
            r#"
[demo]
source = "demo.js"
styles = ["demo.css"]
"#,
        )
        .unwrap();

        let mut file_params = BTreeMap::new();
        file_params.insert(
            "WistiaS3JSUrl".to_string(),
            "https://cdn.example/wistia-s3.min.js".to_string(),
        );
        let params = Params::resolve(&file_params, |_| None);

        let config = BuildConfig::new(temp.path(), project, Mode::Production, params);
        (temp, config)
    }

    fn build(config: BuildConfig) -> Result<BuildResult, BuildError> {
        Builder::with_bundler(config, Box::new(FakeBundler)).build()
    }

    #[test]
    fn production_build_inlines_and_omits_consumed_assets() {
        let (temp, config) = scaffold();
        let out = config.output_dir.clone();

        build(config).unwrap();

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        let demo = fs::read_to_string(out.join("demo.html")).unwrap();

        // Substitution is total.
        assert!(!index.contains("{{."));
        assert!(index.contains("<title>Demo Video</title>"));
        assert!(index.contains("wistia_async_testHashId"));

        // The demo bundle and CSS are spliced in, their tags gone.
        assert!(demo.contains("<script>document.querySelector"));
        assert!(demo.contains("<style>"));
        assert!(!demo.contains("src=\"demo.min.js\""));

        // Inlined-everywhere assets are omitted; the loader stays for
        // manual embedding.
        assert!(!out.join("demo.min.js").exists());
        assert!(!out.join("css/demo.css").exists());
        assert!(out.join("wistia-s3.min.js").exists());

        // The template's own loader reference survives untouched.
        assert!(index.contains("https://cdn.example/wistia-s3.min.js"));

        // No stale staging directory.
        assert!(!temp.path().join(".dist.staging").exists());
    }

    #[test]
    fn production_build_injects_entry_params_into_loader() {
        let (_temp, config) = scaffold();
        let out = config.output_dir.clone();

        build(config).unwrap();

        let loader = fs::read_to_string(out.join("wistia-s3.min.js")).unwrap();
        assert!(loader.contains(r#"init("testTrackingId")"#));
        assert!(loader.contains("https://s3.us-east-1.amazonaws.com"));
        assert!(!loader.contains("{{."));
    }

    #[test]
    fn development_build_keeps_assets_separate_and_wires_hot_reload() {
        let (_temp, mut config) = scaffold();
        config.mode = Mode::Development;
        let out = config.output_dir.clone();

        build(config).unwrap();

        let demo = fs::read_to_string(out.join("demo.html")).unwrap();

        // No inlining: the script tag still points at the bundle file.
        assert!(demo.contains("src=\"demo.js\""));
        assert!(out.join("demo.js").exists());
        assert!(out.join("css/demo.css").exists());
        assert!(out.join("wistia-s3.js").exists());

        // Hot-reload wiring is a development-only behavior.
        assert!(demo.contains("/__hmr.js"));
    }

    #[test]
    fn production_build_has_no_hot_reload_wiring() {
        let (_temp, config) = scaffold();
        let out = config.output_dir.clone();

        build(config).unwrap();

        let index = fs::read_to_string(out.join("index.html")).unwrap();
        let demo = fs::read_to_string(out.join("demo.html")).unwrap();
        assert!(!index.contains("__hmr"));
        assert!(!demo.contains("__hmr"));
    }

    #[test]
    fn manifest_marks_the_excluded_loader_as_manual() {
        let (_temp, config) = scaffold();
        let out = config.output_dir.clone();

        build(config).unwrap();

        let manifest: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();

        let artifacts = manifest["artifacts"].as_array().unwrap();
        let loader = artifacts
            .iter()
            .find(|a| a["file"] == "wistia-s3.min.js")
            .expect("loader bundle missing from manifest");
        assert_eq!(loader["manual"], true);
        assert_eq!(loader["kind"], "script");
        assert_eq!(manifest["mode"], "production");
    }

    #[test]
    fn failed_build_leaves_previous_output_untouched() {
        let (temp, config) = scaffold();
        let out = config.output_dir.clone();

        build(config.clone()).unwrap();
        let before = fs::read_to_string(out.join("index.html")).unwrap();

        // Break the next build: a template referencing an unbindable name.
        fs::write(
            config.src_dir.join("index.html"),
            "<html><body>{{.NoSuchParam}}</body></html>",
        )
        .unwrap();

        let err = build(config).unwrap_err();
        assert!(matches!(err, BuildError::MissingParameter { .. }));

        // Old artifacts are still current; staging was cleaned up.
        assert_eq!(
            fs::read_to_string(out.join("index.html")).unwrap(),
            before
        );
        assert!(!temp.path().join(".dist.staging").exists());
    }

    #[test]
    fn loader_only_project_builds_without_demo_artifacts() {
        let temp = tempdir().unwrap();
        let src = temp.path().join("src");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join("main.js"), "init();").unwrap();
        fs::write(src.join("index.html"), INDEX_TEMPLATE).unwrap();

        let mut project = ProjectConfig::default();
        project.loader.params = vec![];
        let mut file_params = BTreeMap::new();
        file_params.insert(
            "WistiaS3JSUrl".to_string(),
            "https://cdn.example/wistia-s3.min.js".to_string(),
        );
        let params = Params::resolve(&file_params, |_| None);
        let config = BuildConfig::new(temp.path(), project, Mode::Production, params);
        let out = config.output_dir.clone();

        let result = build(config).unwrap();

        assert_eq!(result.documents, 1);
        assert!(out.join("index.html").exists());
        assert!(!out.join("demo.html").exists());
        assert!(out.join("wistia-s3.min.js").exists());
    }
}
