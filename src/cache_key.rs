//! Cache key derivation
//!
//! Keys are derived from the platform and the normalized path only. Range
//! headers and the GET/HEAD distinction never reach the key, which is what
//! lets a single full-content entry answer every range variant of the same
//! resource.

use crate::error::{ProxyError, Result};
use crate::platform::Platform;
use crate::transform::NormalizedPath;
use std::fmt;

/// A stable cache key for one resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the cache key for a normalized path on a platform.
///
/// # Errors
/// Returns [`ProxyError::Mapping`] for an empty or non-absolute normalized
/// path; this never panics.
pub fn key_for(platform: Platform, path: &NormalizedPath) -> Result<CacheKey> {
    let p = path.as_str();
    if p.is_empty() || !p.starts_with('/') {
        return Err(ProxyError::Mapping(format!(
            "cannot derive cache key from path '{}'",
            p
        )));
    }
    Ok(CacheKey(format!("{}:{}", platform, p)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::transform;

    #[test]
    fn test_key_includes_platform_and_path() {
        let path = transform("/jenkins/update-center.json", Platform::Jenkins).unwrap();
        let key = key_for(Platform::Jenkins, &path).unwrap();
        assert_eq!(key.as_str(), "jenkins:/current/update-center.json");
    }

    #[test]
    fn test_same_resource_same_key() {
        // The prefixed and the already-canonical spelling address one resource
        let a = transform("/jenkins/update-center.json", Platform::Jenkins).unwrap();
        let b = transform("/current/update-center.json", Platform::Jenkins).unwrap();
        assert_eq!(
            key_for(Platform::Jenkins, &a).unwrap(),
            key_for(Platform::Jenkins, &b).unwrap()
        );
    }

    #[test]
    fn test_query_distinguishes_keys() {
        let a = transform("/jenkins/uc.json?v=1", Platform::Jenkins).unwrap();
        let b = transform("/jenkins/uc.json?v=2", Platform::Jenkins).unwrap();
        assert_ne!(
            key_for(Platform::Jenkins, &a).unwrap(),
            key_for(Platform::Jenkins, &b).unwrap()
        );
    }

    #[test]
    fn test_platform_distinguishes_keys() {
        let jenkins = transform("/jenkins/download/x", Platform::Jenkins).unwrap();
        let node = transform("/node/download/x", Platform::Node).unwrap();
        // Same canonical path under two platforms must not collide
        assert_eq!(jenkins.as_str(), node.as_str());
        assert_ne!(
            key_for(Platform::Jenkins, &jenkins).unwrap(),
            key_for(Platform::Node, &node).unwrap()
        );
    }
}
