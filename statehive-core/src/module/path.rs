//! Module paths
//!
//! A path is the ordered list of child keys from the root module. The empty
//! path addresses the root itself.

use std::fmt;

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModulePath(Vec<String>);

impl ModulePath {
    pub fn root() -> Self {
        Self(Vec::new())
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Path of the parent module, `None` for the root
    pub fn parent(&self) -> Option<ModulePath> {
        self.0.split_last().map(|(_, parent)| ModulePath(parent.to_vec()))
    }

    /// Final segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.0.last().map(String::as_str)
    }

    pub fn child(&self, key: impl Into<String>) -> ModulePath {
        let mut segments = self.0.clone();
        segments.push(key.into());
        ModulePath(segments)
    }
}

impl fmt::Display for ModulePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

/// A single string is one segment, not a slash-separated path
impl From<&str> for ModulePath {
    fn from(key: &str) -> Self {
        ModulePath(vec![key.to_string()])
    }
}

impl From<String> for ModulePath {
    fn from(key: String) -> Self {
        ModulePath(vec![key])
    }
}

impl From<Vec<String>> for ModulePath {
    fn from(segments: Vec<String>) -> Self {
        ModulePath(segments)
    }
}

impl From<&[&str]> for ModulePath {
    fn from(segments: &[&str]) -> Self {
        ModulePath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ModulePath {
    fn from(segments: [&str; N]) -> Self {
        ModulePath(segments.iter().map(|s| s.to_string()).collect())
    }
}

impl From<&ModulePath> for ModulePath {
    fn from(path: &ModulePath) -> Self {
        path.clone()
    }
}

impl AsRef<[String]> for ModulePath {
    fn as_ref(&self) -> &[String] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_is_single_segment() {
        let path = ModulePath::from("a/b");
        assert_eq!(path.segments(), &["a/b".to_string()]);
    }

    #[test]
    fn test_parent_and_key() {
        let path = ModulePath::from(["a", "b", "c"]);
        assert_eq!(path.key(), Some("c"));
        assert_eq!(path.parent(), Some(ModulePath::from(["a", "b"])));
        assert_eq!(ModulePath::root().parent(), None);
        assert_eq!(ModulePath::root().key(), None);
    }

    #[test]
    fn test_display_joins_with_dots() {
        assert_eq!(ModulePath::from(["cart", "items"]).to_string(), "cart.items");
        assert_eq!(ModulePath::root().to_string(), "");
    }

    #[test]
    fn test_child() {
        assert_eq!(ModulePath::root().child("a").child("b"), ModulePath::from(["a", "b"]));
    }
}
