//! Output document planning.
//!
//! For each HTML artifact: which compiled bundles are injected (in declared
//! entry order, which is script execution order), which are excluded from
//! automatic injection, and whether post-build inlining applies. Exclusion
//! patterns are evaluated against final bundle filenames, never source
//! paths. Exclusion from injection never removes an asset from the
//! artifact set.

use std::collections::BTreeMap;

use regex::Regex;

use crate::builder::BuildError;
use crate::bundle::{AssetKind, AssetManifest};
use crate::config::{DocumentConfig, Mode, ProjectConfig};
use crate::entries::{Entry, DEMO_ENTRY, LOADER_ENTRY};

/// Configuration for one HTML artifact.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSpec {
    /// Output filename, e.g. `index.html`.
    pub filename: String,

    /// Template path relative to the src directory.
    pub template: String,

    /// Entry names whose bundles this document includes, in order.
    pub included_entries: Vec<String>,

    /// Regex patterns over final bundle filenames excluded from injection.
    pub excluded_assets: Vec<String>,

    /// Inline matched CSS/JS after a production build.
    pub inline_after_build: bool,

    /// Emit only in development builds.
    pub dev_only: bool,

    /// Per-document parameter overrides.
    pub params: BTreeMap<String, String>,
}

impl From<&DocumentConfig> for DocumentSpec {
    fn from(config: &DocumentConfig) -> Self {
        Self {
            filename: config.filename.clone(),
            template: config.template.clone(),
            included_entries: config.entries.clone(),
            excluded_assets: config.exclude.clone(),
            inline_after_build: config.inline,
            dev_only: config.dev_only,
            params: config.params.clone(),
        }
    }
}

/// Exclusion pattern matching an entry's JS bundle in either mode.
fn entry_script_pattern(entry: &str) -> String {
    format!(r"^{}(\.min)?\.js$", regex::escape(entry))
}

/// The default document set for the resolved entries.
///
/// `index.html` is the hosting page: it excludes every entry's script from
/// injection because its template embeds the loader itself (via the
/// `{{.WistiaS3JSUrl}}` script tag); only stylesheets are injected.
/// `demo.html` exists when the demo entry does, excluding just the loader
/// bundle. Extra documents from the project file follow.
pub fn default_documents(config: &ProjectConfig, entries: &[Entry]) -> Vec<DocumentSpec> {
    let entry_names: Vec<String> = entries.iter().map(|e| e.name.clone()).collect();
    let has_demo = entry_names.iter().any(|n| n == DEMO_ENTRY);

    let mut documents = vec![DocumentSpec {
        filename: "index.html".to_string(),
        template: "index.html".to_string(),
        included_entries: entry_names.clone(),
        excluded_assets: entry_names.iter().map(|n| entry_script_pattern(n)).collect(),
        inline_after_build: true,
        dev_only: false,
        params: BTreeMap::new(),
    }];

    if has_demo {
        documents.push(DocumentSpec {
            filename: "demo.html".to_string(),
            template: "demo.html".to_string(),
            included_entries: entry_names.clone(),
            excluded_assets: vec![entry_script_pattern(LOADER_ENTRY)],
            inline_after_build: true,
            dev_only: false,
            params: BTreeMap::new(),
        });
    }

    documents.extend(config.documents.iter().map(DocumentSpec::from));
    documents
}

/// Validate document specs and select the ones participating in `mode`.
///
/// Unknown entry references abort here, before any compilation cost.
pub fn plan_documents(
    documents: Vec<DocumentSpec>,
    entries: &[Entry],
    mode: Mode,
) -> Result<Vec<DocumentSpec>, BuildError> {
    for doc in &documents {
        for name in &doc.included_entries {
            if !entries.iter().any(|e| &e.name == name) {
                return Err(BuildError::UnknownEntryReference {
                    document: doc.filename.clone(),
                    entry: name.clone(),
                });
            }
        }
    }

    Ok(documents
        .into_iter()
        .filter(|doc| {
            let keep = !(doc.dev_only && mode == Mode::Production);
            if !keep {
                tracing::debug!("skipping development-only document {}", doc.filename);
            }
            keep
        })
        .collect())
}

/// The planned asset wiring for one document.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentPlan {
    /// Stylesheet filenames to inject, in entry order.
    pub styles: Vec<String>,

    /// Script filenames to inject, in entry order.
    pub scripts: Vec<String>,

    /// Compiled assets excluded from injection but still needed by the
    /// page through a manual mechanism; referenced in the artifact
    /// manifest so a host page can embed them itself.
    pub manual: Vec<String>,
}

/// Decide which compiled assets get injected into `doc`.
pub fn plan_assets(doc: &DocumentSpec, manifest: &AssetManifest) -> Result<DocumentPlan, BuildError> {
    let excludes: Vec<Regex> = doc
        .excluded_assets
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| BuildError::InvalidPattern {
                pattern: pattern.clone(),
                message: e.to_string(),
            })
        })
        .collect::<Result<_, _>>()?;

    let mut plan = DocumentPlan {
        styles: vec![],
        scripts: vec![],
        manual: vec![],
    };

    for entry in &doc.included_entries {
        for asset in manifest.for_entry(entry) {
            if excludes.iter().any(|re| re.is_match(&asset.filename)) {
                plan.manual.push(asset.filename.clone());
                continue;
            }
            match asset.kind {
                AssetKind::Stylesheet => plan.styles.push(asset.filename.clone()),
                AssetKind::Script => plan.scripts.push(asset.filename.clone()),
            }
        }
    }

    Ok(plan)
}

/// Inject asset tags into rendered markup: stylesheet links before
/// `</head>`, script tags before `</body>`.
pub fn inject_assets(html: &str, plan: &DocumentPlan) -> String {
    let mut out = html.to_string();

    if !plan.styles.is_empty() {
        let links: String = plan
            .styles
            .iter()
            .map(|href| format!("<link rel=\"stylesheet\" href=\"{href}\">\n"))
            .collect();
        out = insert_before(&out, "</head>", &links);
    }

    if !plan.scripts.is_empty() {
        let scripts: String = plan
            .scripts
            .iter()
            .map(|src| format!("<script src=\"{src}\"></script>\n"))
            .collect();
        out = insert_before(&out, "</body>", &scripts);
    }

    out
}

/// Insert `content` before the first occurrence of `marker`, or append when
/// the template has no such tag.
pub(crate) fn insert_before(html: &str, marker: &str, content: &str) -> String {
    match html.find(marker) {
        Some(pos) => {
            let mut out = String::with_capacity(html.len() + content.len());
            out.push_str(&html[..pos]);
            out.push_str(content);
            out.push_str(&html[pos..]);
            out
        }
        None => {
            let mut out = html.to_string();
            out.push_str(content);
            out
        }
    }
}
