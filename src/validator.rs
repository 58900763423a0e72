//! Component source validator — locate the entry point in untrusted source.
//!
//! DESIGN
//! ======
//! The scan is lexical, not a parse. A candidate is a named function (a
//! `function` declaration, or a `const`/`let`/`var` binding to an arrow or
//! function expression) that takes exactly one parameter and sits at brace
//! depth zero. When candidates include PascalCase names, only those count,
//! following the component naming convention.
//!
//! Resolution order:
//! 1. explicit manifest symbol that matches a candidate
//! 2. exactly one candidate
//! 3. several candidates, one equal to the whitespace-stripped app name
//! 4. fallback: first candidate (ambiguous) or [`DEFAULT_ENTRY_POINT`] (none)
//!
//! LIMITATIONS
//! ===========
//! Brace depth is counted over raw text, so unbalanced braces inside string
//! literals can hide or expose a candidate. Parameters containing
//! parentheses (default values with calls) are not recognized. A positive
//! match is "likely correct", callers surface the warning otherwise.

use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

/// Canonical symbol used when the source declares no candidate.
pub const DEFAULT_ENTRY_POINT: &str = "App";

// =============================================================================
// TYPES
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("component source is empty")]
    Empty,
    #[error("component source must be text, got {found}")]
    NotText { found: &'static str },
    #[error("entry point manifest is not an identifier: {0:?}")]
    InvalidManifest(String),
}

impl crate::error::ErrorCode for ValidationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Empty => "E_SOURCE_EMPTY",
            Self::NotText { .. } => "E_SOURCE_NOT_TEXT",
            Self::InvalidManifest(_) => "E_INVALID_MANIFEST",
        }
    }
}

/// Why the validator could not pick an entry point on its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackReason {
    NoCandidates,
    Ambiguous,
}

/// How the entry-point symbol was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "reason", rename_all = "snake_case")]
pub enum Resolution {
    Manifest,
    Declared,
    NameHint,
    Fallback(FallbackReason),
}

/// Result of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryPoint {
    pub symbol: String,
    pub resolution: Resolution,
    /// Top-level candidates in source order.
    pub candidates: Vec<String>,
}

impl EntryPoint {
    #[must_use]
    pub fn used_fallback(&self) -> bool {
        matches!(self.resolution, Resolution::Fallback(_))
    }

    /// User-facing warning when the symbol was not unambiguously declared.
    #[must_use]
    pub fn warning(&self) -> Option<String> {
        match self.resolution {
            Resolution::Manifest | Resolution::Declared => None,
            Resolution::NameHint => Some(format!(
                "source declares {} components; using `{}` because it matches the app name",
                self.candidates.len(),
                self.symbol
            )),
            Resolution::Fallback(FallbackReason::NoCandidates) => Some(format!(
                "no component function found; falling back to `{}`",
                self.symbol
            )),
            Resolution::Fallback(FallbackReason::Ambiguous) => Some(format!(
                "source declares {} components ({}); falling back to the first, `{}`",
                self.candidates.len(),
                self.candidates.join(", "),
                self.symbol
            )),
        }
    }
}

/// Optional context that sharpens resolution.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryHints<'a> {
    /// Symbol named explicitly by the producer of the source.
    pub manifest: Option<&'a str>,
    /// Human-readable app name.
    pub name: Option<&'a str>,
}

// =============================================================================
// VALIDATE
// =============================================================================

/// Validate source text with no hints.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for empty or whitespace-only source.
pub fn validate(source: &str) -> Result<EntryPoint, ValidationError> {
    validate_with(source, EntryHints::default())
}

/// Validate a JSON value that should hold source text.
///
/// # Errors
///
/// Returns [`ValidationError::NotText`] when the value is not a string.
pub fn validate_value(value: &serde_json::Value, hints: EntryHints<'_>) -> Result<EntryPoint, ValidationError> {
    match value {
        serde_json::Value::String(s) => validate_with(s, hints),
        other => Err(ValidationError::NotText { found: json_kind(other) }),
    }
}

/// Validate source text using manifest / name hints.
///
/// # Errors
///
/// Returns [`ValidationError::Empty`] for blank source and
/// [`ValidationError::InvalidManifest`] for a manifest that is not an identifier.
pub fn validate_with(source: &str, hints: EntryHints<'_>) -> Result<EntryPoint, ValidationError> {
    if source.trim().is_empty() {
        return Err(ValidationError::Empty);
    }
    if let Some(manifest) = hints.manifest {
        if !is_identifier(manifest) {
            return Err(ValidationError::InvalidManifest(manifest.to_owned()));
        }
    }

    let candidates = find_candidates(source);

    if let Some(manifest) = hints.manifest {
        if candidates.iter().any(|c| c == manifest) {
            return Ok(EntryPoint { symbol: manifest.to_owned(), resolution: Resolution::Manifest, candidates });
        }
    }

    match candidates.len() {
        0 => Ok(EntryPoint {
            symbol: DEFAULT_ENTRY_POINT.to_owned(),
            resolution: Resolution::Fallback(FallbackReason::NoCandidates),
            candidates,
        }),
        1 => Ok(EntryPoint { symbol: candidates[0].clone(), resolution: Resolution::Declared, candidates }),
        _ => {
            let hinted = hints
                .name
                .map(symbol_from_name)
                .filter(|sym| candidates.iter().any(|c| c == sym));
            match hinted {
                Some(symbol) => Ok(EntryPoint { symbol, resolution: Resolution::NameHint, candidates }),
                None => Ok(EntryPoint {
                    symbol: candidates[0].clone(),
                    resolution: Resolution::Fallback(FallbackReason::Ambiguous),
                    candidates,
                }),
            }
        }
    }
}

/// Derive the conventional component symbol from an app name.
#[must_use]
pub fn symbol_from_name(name: &str) -> String {
    name.chars().filter(|c| !c.is_whitespace()).collect()
}

// =============================================================================
// SCAN
// =============================================================================

fn function_decl_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bfunction\s+([A-Za-z_$][\w$]*)\s*\(([^()]*)\)").ok())
        .as_ref()
}

fn binding_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"\b(?:const|let|var)\s+([A-Za-z_$][\w$]*)\s*=\s*(?:async\s+)?(?:function\s*[\w$]*\s*\(([^()]*)\)|\(([^()]*)\)\s*=>|([A-Za-z_$][\w$]*)\s*=>)",
        )
        .ok()
    })
    .as_ref()
}

fn find_candidates(source: &str) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();

    let (Some(decl_re), Some(bind_re)) = (function_decl_re(), binding_re()) else {
        return Vec::new();
    };

    for caps in decl_re.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        let params = caps.get(2).map_or("", |m| m.as_str());
        if param_count(params) == 1
            && brace_depth_at(source, whole.start()) == 0
            && !follows_assignment(source, whole.start())
        {
            found.push((whole.start(), name.as_str().to_owned()));
        }
    }

    for caps in bind_re.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else { continue };
        let count = match (caps.get(2), caps.get(3), caps.get(4)) {
            (Some(p), _, _) | (_, Some(p), _) => param_count(p.as_str()),
            (_, _, Some(_)) => 1,
            _ => 0,
        };
        if count == 1 && brace_depth_at(source, whole.start()) == 0 {
            found.push((whole.start(), name.as_str().to_owned()));
        }
    }

    found.sort_by_key(|(offset, _)| *offset);
    let mut names: Vec<String> = Vec::new();
    for (_, name) in found {
        if !names.contains(&name) {
            names.push(name);
        }
    }

    if names.iter().any(|n| is_pascal_case(n)) {
        names.retain(|n| is_pascal_case(n));
    }
    names
}

/// Count comma-separated parameters at nesting depth zero.
fn param_count(params: &str) -> usize {
    if params.trim().is_empty() {
        return 0;
    }
    let mut depth = 0_i32;
    let mut count = 1;
    for ch in params.chars() {
        match ch {
            '{' | '[' => depth += 1,
            '}' | ']' => depth -= 1,
            ',' if depth == 0 => count += 1,
            _ => {}
        }
    }
    // Trailing comma: `(config,)`.
    if params.trim_end().ends_with(',') {
        count -= 1;
    }
    count
}

fn brace_depth_at(source: &str, offset: usize) -> i32 {
    source[..offset].chars().fold(0, |depth, ch| match ch {
        '{' => depth + 1,
        '}' => depth - 1,
        _ => depth,
    })
}

/// `const A = function B(config)` names `A`; the inner `B` is not separate.
fn follows_assignment(source: &str, offset: usize) -> bool {
    source[..offset].trim_end().ends_with('=')
}

fn is_pascal_case(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[path = "validator_test.rs"]
mod tests;
