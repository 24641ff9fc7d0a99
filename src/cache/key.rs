use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheCategory {
    /// Rendered tile images
    Raster,
    /// Records for rebuilding a tile request from its key alone
    Rebuild,
}

impl CacheCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheCategory::Raster => "raster",
            CacheCategory::Rebuild => "rebuild",
        }
    }
}

/// Ordered tuple identifying one cached artifact
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    category: CacheCategory,
    layer_id: String,
    parts: Vec<String>,
    /// Server-side key material; hashed into the digest, never displayed
    secret: Option<String>,
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("category", &self.category)
            .field("layer_id", &self.layer_id)
            .field("parts", &self.parts)
            .field("keyed", &self.secret.is_some())
            .finish()
    }
}

impl CacheKey {
    pub fn new(category: CacheCategory, layer_id: impl Into<String>) -> Self {
        Self {
            category,
            layer_id: layer_id.into(),
            parts: Vec::new(),
            secret: None,
        }
    }

    /// Makes the digest depend on a value callers cannot know
    #[must_use]
    pub fn keyed(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    #[must_use]
    pub fn with_part(mut self, part: impl Into<String>) -> Self {
        self.parts.push(part.into());
        self
    }

    pub fn category(&self) -> CacheCategory {
        self.category
    }

    pub fn layer_id(&self) -> &str {
        &self.layer_id
    }

    /// Hex SHA-256 over the length-prefixed components, so that
    /// `("ab", "c")` and `("a", "bc")` never collide
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for component in self
            .secret
            .as_deref()
            .into_iter()
            .chain(std::iter::once(self.category.as_str()))
            .chain(std::iter::once(self.layer_id.as_str()))
            .chain(self.parts.iter().map(String::as_str))
        {
            hasher.update((component.len() as u64).to_be_bytes());
            hasher.update(component.as_bytes());
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{:02x}", b))
            .collect()
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.category.as_str(), self.layer_id)?;
        for part in &self.parts {
            write!(f, "/{}", part)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable_and_hex() {
        let a = CacheKey::new(CacheCategory::Raster, "roads").with_part("t1").with_part("sec");
        let b = CacheKey::new(CacheCategory::Raster, "roads").with_part("t1").with_part("sec");
        assert_eq!(a.digest(), b.digest());
        assert_eq!(a.digest().len(), 64);
        assert!(a.digest().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_component_boundaries_matter() {
        let a = CacheKey::new(CacheCategory::Raster, "roads").with_part("ab").with_part("c");
        let b = CacheKey::new(CacheCategory::Raster, "roads").with_part("a").with_part("bc");
        assert_ne!(a.digest(), b.digest());
        let rebuild = CacheKey::new(CacheCategory::Rebuild, "roads").with_part("ab").with_part("c");
        assert_ne!(a.digest(), rebuild.digest());
    }

    #[test]
    fn test_display() {
        let key = CacheKey::new(CacheCategory::Rebuild, "roads").with_part("x");
        assert_eq!(key.to_string(), "rebuild/roads/x");
    }

    #[test]
    fn test_secret_changes_digest_but_stays_hidden() {
        let plain = CacheKey::new(CacheCategory::Rebuild, "roads").with_part("x");
        let keyed = plain.clone().keyed("s3cret");
        assert_ne!(plain.digest(), keyed.digest());
        assert_ne!(keyed.digest(), plain.clone().keyed("other").digest());
        assert_eq!(keyed.to_string(), "rebuild/roads/x");
        assert!(!format!("{:?}", keyed).contains("s3cret"));
    }
}
