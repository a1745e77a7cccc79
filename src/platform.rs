//! Platform registry and per-platform rewrite rules
//!
//! Platforms form a closed, enumerated set resolved at startup. Each platform
//! carries one immutable rule describing which backend sub-paths are already
//! canonical (passthrough prefixes) and where bare identifiers live (the
//! rewrite target). Keeping the set closed lets the rules be exhaustively
//! validated for overlap instead of trusting a runtime-mutable map.

use crate::error::{ProxyError, Result};
use std::fmt;
use std::str::FromStr;

/// The content platforms this proxy fronts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Platform {
    /// Jenkins update center and plugin repository
    Jenkins,
    /// Node.js distribution mirror
    Node,
    /// Python package index mirror
    Python,
}

impl Platform {
    /// All known platforms, in registry order
    pub const ALL: [Platform; 3] = [Platform::Jenkins, Platform::Node, Platform::Python];

    /// The leading path segment that selects this platform
    pub fn prefix(&self) -> &'static str {
        match self {
            Platform::Jenkins => "jenkins",
            Platform::Node => "node",
            Platform::Python => "python",
        }
    }

    /// The rewrite rule for this platform
    pub fn rule(&self) -> &'static PlatformRule {
        match self {
            Platform::Jenkins => &JENKINS_RULE,
            Platform::Node => &NODE_RULE,
            Platform::Python => &PYTHON_RULE,
        }
    }
}

impl FromStr for Platform {
    type Err = ProxyError;

    fn from_str(s: &str) -> Result<Self> {
        Platform::ALL
            .iter()
            .copied()
            .find(|p| p.prefix() == s)
            .ok_or_else(|| ProxyError::UnknownPlatform(s.to_string()))
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

/// Rewrite rule for one platform.
///
/// `passthrough_prefixes` are checked in order; the first match wins. A path
/// matching none of them is rewritten under `rewrite_target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformRule {
    /// Platform prefix segment, without slashes
    pub prefix: &'static str,
    /// Backend sub-paths that are already canonical, highest priority first.
    /// Each ends with a slash.
    pub passthrough_prefixes: &'static [&'static str],
    /// Default location for bare identifiers, without slashes
    pub rewrite_target: &'static str,
}

static JENKINS_RULE: PlatformRule = PlatformRule {
    prefix: "jenkins",
    passthrough_prefixes: &["current/", "experimental/", "download/", "updates/"],
    rewrite_target: "current",
};

static NODE_RULE: PlatformRule = PlatformRule {
    prefix: "node",
    passthrough_prefixes: &["dist/", "download/"],
    rewrite_target: "dist",
};

static PYTHON_RULE: PlatformRule = PlatformRule {
    prefix: "python",
    passthrough_prefixes: &["simple/", "packages/"],
    rewrite_target: "simple",
};

/// Validate the whole registry for ambiguity.
///
/// Every passthrough prefix must end with a slash, and within one platform no
/// prefix may be a prefix of another, so exactly one rule can ever match a
/// given path. Run once at startup.
pub fn validate_rules() -> Result<()> {
    for platform in Platform::ALL {
        let rule = platform.rule();

        if rule.prefix.contains('/') || rule.rewrite_target.contains('/') {
            return Err(ProxyError::Config(format!(
                "platform '{}': prefix and rewrite target must be bare segments",
                rule.prefix
            )));
        }

        for (i, a) in rule.passthrough_prefixes.iter().enumerate() {
            if !a.ends_with('/') {
                return Err(ProxyError::Config(format!(
                    "platform '{}': passthrough prefix '{}' must end with '/'",
                    rule.prefix, a
                )));
            }
            for b in &rule.passthrough_prefixes[i + 1..] {
                if a.starts_with(b) || b.starts_with(a) {
                    return Err(ProxyError::Config(format!(
                        "platform '{}': ambiguous passthrough prefixes '{}' and '{}'",
                        rule.prefix, a, b
                    )));
                }
            }
        }

        // The rewrite target must itself be a passthrough prefix, otherwise
        // transformed output would not survive re-transformation unchanged.
        let target_prefix = format!("{}/", rule.rewrite_target);
        if !rule.passthrough_prefixes.contains(&target_prefix.as_str()) {
            return Err(ProxyError::Config(format!(
                "platform '{}': rewrite target '{}' is not among its passthrough prefixes",
                rule.prefix, rule.rewrite_target
            )));
        }
    }
    Ok(())
}
