//! Build mode, parameter binding and project configuration.
//!
//! The mode signal and all template parameters are resolved exactly once at
//! process start and threaded through the pipeline as values; no component
//! re-reads the process environment mid-build.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builder::BuildError;

/// Build mode for a single invocation.
///
/// Governs inlining and minification (production only) and hot-reload
/// wiring (development only). Exactly one value per build; never mixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Development,
    Production,
}

/// Environment variables recognized as the development-mode signal.
const DEV_SIGNALS: &[&str] = &["EMBED_DEV_SERVER", "EMBED_SERVE"];

impl Mode {
    /// Resolve the mode from the process environment.
    ///
    /// Any non-empty value in `EMBED_DEV_SERVER` or `EMBED_SERVE` selects
    /// development; otherwise production. Call once at startup and pass the
    /// result down.
    pub fn from_env() -> Self {
        Self::from_signals(DEV_SIGNALS.iter().filter_map(|name| env::var(name).ok()))
    }

    /// Resolve the mode from already-read signal values.
    pub fn from_signals<I, S>(signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for signal in signals {
            if !signal.as_ref().is_empty() {
                return Mode::Development;
            }
        }
        Mode::Production
    }

    pub fn is_development(self) -> bool {
        self == Mode::Development
    }
}

/// Default parameter values, overridable per environment variable.
///
/// Tuples of (parameter name, environment variable, default value).
const PARAM_DEFAULTS: &[(&str, &str, &str)] = &[
    ("VideoName", "VIDEO_NAME", "Demo Video"),
    ("HashId", "HASH_ID", "testHashId"),
    ("WistiaS3JSUrl", "WISTIA_S3_JS_URL", "unknown_url"),
    ("TrackingID", "TRACKING_ID", "testTrackingId"),
    (
        "MediaEndPoint",
        "MEDIA_ENDPOINT",
        "https://s3.us-east-1.amazonaws.com/wistia-s3/media",
    ),
];

/// Resolved parameter binding for one build invocation.
///
/// Every parameter a template or entry declares must have a value here;
/// absence is a configuration error surfaced by the substitutor or the
/// entry resolver, never a silent blank.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    values: BTreeMap<String, String>,
}

impl Params {
    /// Resolve the binding from defaults, the project file's `[params]`
    /// table and the process environment, in that order of precedence
    /// (environment wins).
    pub fn from_env(file_params: &BTreeMap<String, String>) -> Self {
        Self::resolve(file_params, |name| {
            env::var(name).ok().filter(|v| !v.is_empty())
        })
    }

    /// Resolve the binding with an injected environment lookup.
    pub fn resolve<F>(file_params: &BTreeMap<String, String>, env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut values = BTreeMap::new();

        for (name, _, default) in PARAM_DEFAULTS {
            values.insert((*name).to_string(), (*default).to_string());
        }
        for (name, value) in file_params {
            values.insert(name.clone(), value.clone());
        }
        for (name, var, _) in PARAM_DEFAULTS {
            if let Some(value) = env(var) {
                values.insert((*name).to_string(), value);
            }
        }

        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// A new binding with per-document overrides layered on top.
    ///
    /// Does not mutate `self`; documents may bind different values (a demo
    /// page binds example identifiers, a production embed binds live ones).
    pub fn overlay(&self, overrides: &BTreeMap<String, String>) -> Self {
        let mut values = self.values.clone();
        for (name, value) in overrides {
            values.insert(name.clone(), value.clone());
        }
        Self { values }
    }
}

/// One entry in the project file: a source script plus the parameters it
/// consumes and the stylesheets bundled alongside it.
#[derive(Debug, Clone, Deserialize)]
pub struct EntryConfig {
    /// Source path relative to the src directory.
    pub source: String,

    /// Stylesheet paths relative to the src directory.
    #[serde(default)]
    pub styles: Vec<String>,

    /// Parameter names substituted into the compiled bundle.
    #[serde(default)]
    pub params: Vec<String>,
}

/// An extra output document declared in the project file.
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentConfig {
    /// Output filename, e.g. "full-demo.html".
    pub filename: String,

    /// Template path relative to the src directory.
    pub template: String,

    /// Entry names whose bundles this document includes, in order.
    #[serde(default)]
    pub entries: Vec<String>,

    /// Patterns (regex over final bundle filenames) excluded from injection.
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Inline matched CSS/JS after a production build.
    #[serde(default = "default_inline")]
    pub inline: bool,

    /// Emit this document in development builds only.
    #[serde(default)]
    pub dev_only: bool,

    /// Per-document parameter overrides.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSettings {
    #[serde(default = "default_src")]
    pub src: String,
    #[serde(default = "default_output")]
    pub output: String,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            src: default_src(),
            output: default_output(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BuildSettings {
    #[serde(default = "default_minify")]
    pub minify: bool,
}

fn default_src() -> String {
    "src".to_string()
}
fn default_output() -> String {
    "dist".to_string()
}
fn default_minify() -> bool {
    true
}
fn default_inline() -> bool {
    true
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            minify: default_minify(),
        }
    }
}

impl Default for EntryConfig {
    fn default() -> Self {
        Self {
            source: "main.js".to_string(),
            styles: vec![],
            params: vec!["TrackingID".to_string(), "MediaEndPoint".to_string()],
        }
    }
}

/// Project configuration (`embed.toml`).
///
/// The demo entry is an explicit optional table; its absence is a valid
/// deployment variant, not a missing-entry failure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProjectConfig {
    #[serde(default)]
    pub project: ProjectSettings,

    /// The widget loader entry. Always built.
    #[serde(default)]
    pub loader: EntryConfig,

    /// The demo page entry. Omit the table to skip all demo artifacts.
    #[serde(default)]
    pub demo: Option<EntryConfig>,

    #[serde(default)]
    pub build: BuildSettings,

    /// Extra output documents beyond the default index/demo pair.
    #[serde(default)]
    pub documents: Vec<DocumentConfig>,

    /// Project-level parameter values, margined with the environment.
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ProjectConfig {
    /// Load the project file, or fall back to defaults when it is absent.
    ///
    /// A present-but-malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, BuildError> {
        if !path.exists() {
            tracing::debug!("no project file at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|e| BuildError::Read {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let config: ProjectConfig = toml::from_str(&content)
            .map_err(|e| BuildError::Config(format!("{}: {}", path.display(), e)))?;

        tracing::info!("loaded project config from {}", path.display());
        Ok(config)
    }

    /// The src directory resolved against the project root.
    pub fn src_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.src)
    }

    /// The output directory resolved against the project root.
    pub fn output_dir(&self, project_dir: &Path) -> PathBuf {
        project_dir.join(&self.project.output)
    }
}
