//! Post-build inlining for production documents.
//!
//! Splices compiled CSS/JS content directly into a document, replacing the
//! `<link>`/`<script src>` references, so the shipped page is
//! self-contained. A local reference that matches no compiled asset is a
//! configuration defect: silently skipping it would ship a broken tag.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::builder::BuildError;
use crate::bundle::AssetManifest;

static SCRIPT_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<script[^>]*\bsrc="([^"]+)"[^>]*>\s*</script>"#).expect("invalid script regex")
});

static LINK_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<link[^>]*\brel="stylesheet"[^>]*\bhref="([^"]+)"[^>]*/?>"#)
        .expect("invalid link regex")
});

/// Result of inlining one document.
#[derive(Debug, Clone)]
pub struct InlineOutcome {
    /// Markup with local references replaced by inline content.
    pub html: String,

    /// Final filenames of the assets whose content was spliced in. The
    /// publisher omits these from the artifact set when nothing else
    /// references them.
    pub consumed: Vec<String>,
}

/// Inline every locally-referenced compiled asset of `html`.
///
/// References to absolute URLs (the template's own loader script tag, CDN
/// stylesheets) are never inline candidates and stay untouched.
pub fn inline_document(
    document: &str,
    html: &str,
    manifest: &AssetManifest,
    out_dir: &Path,
) -> Result<InlineOutcome, BuildError> {
    let mut consumed = Vec::new();

    let html = rewrite_tags(html, &LINK_TAG, |caps| {
        splice(document, caps, manifest, out_dir, &mut consumed, |content| {
            format!("<style>{content}</style>")
        })
    })?;

    let html = rewrite_tags(&html, &SCRIPT_TAG, |caps| {
        splice(document, caps, manifest, out_dir, &mut consumed, |content| {
            format!("<script>{content}</script>")
        })
    })?;

    Ok(InlineOutcome { html, consumed })
}

/// Whether a reference target lives outside the artifact set.
fn is_external(target: &str) -> bool {
    target.starts_with("http://") || target.starts_with("https://") || target.starts_with("//")
}

fn splice(
    document: &str,
    caps: &Captures,
    manifest: &AssetManifest,
    out_dir: &Path,
    consumed: &mut Vec<String>,
    wrap: impl Fn(&str) -> String,
) -> Result<Option<String>, BuildError> {
    let target = &caps[1];
    if is_external(target) {
        return Ok(None);
    }

    let filename = target.trim_start_matches("./").trim_start_matches('/');
    if !manifest.contains(filename) {
        return Err(BuildError::InliningTargetNotFound {
            document: document.to_string(),
            target: target.to_string(),
        });
    }

    let path = out_dir.join(filename);
    let content = fs::read_to_string(&path).map_err(|e| BuildError::Read {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;

    consumed.push(filename.to_string());
    Ok(Some(wrap(content.trim_end())))
}

/// Replace each regex match via a fallible callback; `Ok(None)` keeps the
/// original tag.
fn rewrite_tags(
    html: &str,
    re: &Regex,
    mut replace: impl FnMut(&Captures) -> Result<Option<String>, BuildError>,
) -> Result<String, BuildError> {
    let mut out = String::with_capacity(html.len());
    let mut last = 0;

    for caps in re.captures_iter(html) {
        let m = caps.get(0).expect("regex match has a whole capture");
        out.push_str(&html[last..m.start()]);
        match replace(&caps)? {
            Some(replacement) => out.push_str(&replacement),
            None => out.push_str(m.as_str()),
        }
        last = m.end();
    }

    out.push_str(&html[last..]);
    Ok(out)
}

/// Collect the local asset references remaining in final markup.
///
/// Used after inlining to decide which consumed assets still have another
/// consumer and must stay in the artifact set.
pub fn local_references(html: &str) -> Vec<String> {
    let mut refs = Vec::new();
    for re in [&*SCRIPT_TAG, &*LINK_TAG] {
        for caps in re.captures_iter(html) {
            let target = &caps[1];
            if !is_external(target) {
                refs.push(
                    target
                        .trim_start_matches("./")
                        .trim_start_matches('/')
                        .to_string(),
                );
            }
        }
    }
    refs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundle::{AssetKind, CompiledAsset};
    use tempfile::tempdir;

    fn manifest_with(files: &[(&str, AssetKind)]) -> AssetManifest {
        let mut m = AssetManifest::default();
        for (filename, kind) in files {
            m.push(CompiledAsset {
                filename: filename.to_string(),
                kind: *kind,
                entry: "demo".to_string(),
            });
        }
        m
    }

    #[test]
    fn inlines_local_script_and_stylesheet() {
        let temp = tempdir().unwrap();
        std::fs::create_dir_all(temp.path().join("css")).unwrap();
        std::fs::write(temp.path().join("demo.min.js"), "console.log(1)").unwrap();
        std::fs::write(temp.path().join("css/demo.css"), ".demo{color:red}").unwrap();

        let manifest = manifest_with(&[
            ("demo.min.js", AssetKind::Script),
            ("css/demo.css", AssetKind::Stylesheet),
        ]);
        let html = r#"<head><link rel="stylesheet" href="css/demo.css"></head>
<body><script src="demo.min.js"></script></body>"#;

        let outcome = inline_document("demo.html", html, &manifest, temp.path()).unwrap();

        assert!(outcome.html.contains("<style>.demo{color:red}</style>"));
        assert!(outcome.html.contains("<script>console.log(1)</script>"));
        assert!(!outcome.html.contains("src=\"demo.min.js\""));
        assert!(!outcome.html.contains("href=\"css/demo.css\""));
        assert_eq!(outcome.consumed, vec!["css/demo.css", "demo.min.js"]);
    }

    #[test]
    fn external_references_stay_untouched() {
        let temp = tempdir().unwrap();
        let manifest = manifest_with(&[]);
        let html = r#"<script type="text/javascript" src="https://cdn.example/wistia-s3.min.js"></script>"#;

        let outcome = inline_document("index.html", html, &manifest, temp.path()).unwrap();

        assert_eq!(outcome.html, html);
        assert!(outcome.consumed.is_empty());
    }

    #[test]
    fn unmatched_local_reference_is_an_error() {
        let temp = tempdir().unwrap();
        let manifest = manifest_with(&[]);
        let html = r#"<script src="demo.min.js"></script>"#;

        let err = inline_document("demo.html", html, &manifest, temp.path()).unwrap_err();

        match err {
            BuildError::InliningTargetNotFound { document, target } => {
                assert_eq!(document, "demo.html");
                assert_eq!(target, "demo.min.js");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn collects_remaining_local_references() {
        let html = r#"<link rel="stylesheet" href="css/demo.css">
<script src="wistia-s3.min.js"></script>
<script src="https://cdn.example/player.js"></script>"#;

        let refs = local_references(html);

        assert!(refs.contains(&"wistia-s3.min.js".to_string()));
        assert!(refs.contains(&"css/demo.css".to_string()));
        assert_eq!(refs.len(), 2);
    }
}
