//! Path normalization: incoming request paths to canonical backend paths

use crate::error::{ProxyError, Result};
use crate::platform::Platform;
use std::fmt;
use tracing::debug;

/// A canonical backend path with its preserved query string.
///
/// Produced only by [`transform`]; re-transforming one yields itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedPath(String);

impl NormalizedPath {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The path without its query string
    pub fn path_only(&self) -> &str {
        match self.0.split_once('?') {
            Some((path, _)) => path,
            None => &self.0,
        }
    }
}

impl fmt::Display for NormalizedPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Map an incoming request path to the platform's canonical backend path.
///
/// The platform prefix is stripped when present. If the remainder begins with
/// one of the platform's passthrough prefixes it is already canonical and is
/// returned with a single leading slash, untouched. Anything else is a bare
/// identifier that lives under the platform's rewrite target. Query strings
/// pass through verbatim and trailing slashes are preserved.
///
/// Pure and deterministic; safe to call concurrently without synchronization.
///
/// # Errors
/// Returns [`ProxyError::Mapping`] for an empty or non-absolute path.
pub fn transform(path: &str, platform: Platform) -> Result<NormalizedPath> {
    if path.is_empty() || !path.starts_with('/') {
        return Err(ProxyError::Mapping(format!(
            "request path must be absolute, got '{}'",
            path
        )));
    }

    let (path_part, query) = match path.split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path, None),
    };

    let rule = platform.rule();

    // Strip the platform prefix when present. Already-canonical paths carry
    // no prefix, which is what makes the transform idempotent.
    let mut remainder = path_part.trim_start_matches('/');
    if let Some(rest) = remainder.strip_prefix(rule.prefix) {
        if rest.is_empty() {
            remainder = "";
        } else if let Some(rest) = rest.strip_prefix('/') {
            remainder = rest.trim_start_matches('/');
        }
        // A longer first segment that merely starts with the prefix
        // ("jenkinsfiles") is not a platform prefix; leave it alone.
    }

    let canonical = if remainder.is_empty() {
        format!("/{}/", rule.rewrite_target)
    } else if is_passthrough(remainder, rule.passthrough_prefixes) {
        format!("/{}", remainder)
    } else {
        format!("/{}/{}", rule.rewrite_target, remainder)
    };

    let normalized = match query {
        Some(q) => format!("{}?{}", canonical, q),
        None => canonical,
    };

    debug!(
        "transformed path: platform={}, in={}, out={}",
        platform, path, normalized
    );
    Ok(NormalizedPath(normalized))
}

/// Whether a prefix-stripped path is already in canonical backend form.
///
/// First match wins; a bare segment equal to a passthrough directory (no
/// trailing slash) counts as canonical too.
fn is_passthrough(remainder: &str, prefixes: &[&str]) -> bool {
    prefixes
        .iter()
        .any(|p| remainder.starts_with(p) || remainder == &p[..p.len() - 1])
}
