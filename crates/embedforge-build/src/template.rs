//! Placeholder substitution for templates and compiled bundles.
//!
//! Templates carry placeholders of the form `{{.Name}}`. Substitution is a
//! single pass: values produced by substitution are never re-expanded, and
//! a placeholder without a binding fails the build instead of degrading to
//! an empty string.

use std::sync::LazyLock;

use regex::Regex;

use crate::builder::BuildError;
use crate::config::Params;

/// Matches `{{.Name}}`. Identifier characters exclude `.` and `}` so two
/// adjacent placeholders can never be captured as one.
static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\.([^.}]+)\}\}").expect("invalid placeholder regex"));

/// Replace every `{{.Name}}` in `input` with the bound value for `Name`.
///
/// `source` names the template (or bundle) in error messages. Fails with
/// [`BuildError::MissingParameter`] before producing any output if a
/// placeholder has no binding.
pub fn substitute(source: &str, input: &str, params: &Params) -> Result<String, BuildError> {
    for caps in PLACEHOLDER.captures_iter(input) {
        let name = &caps[1];
        if !params.contains(name) {
            return Err(BuildError::MissingParameter {
                name: name.to_string(),
                context: source.to_string(),
            });
        }
    }

    let output = PLACEHOLDER.replace_all(input, |caps: &regex::Captures| {
        // Checked above; the binding cannot have shrunk since.
        params.get(&caps[1]).unwrap_or_default().to_string()
    });

    Ok(output.into_owned())
}

/// Whether any placeholder syntax remains in `input`.
pub fn has_placeholders(input: &str) -> bool {
    PLACEHOLDER.is_match(input)
}
