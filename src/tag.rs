//! Defines the [`Tag`] type, which represents a [`crate::post::Post`] tag.

use gtmpl::Value;
use sha2::{Digest, Sha256};
use std::hash::{Hash, Hasher};

/// The stem used for tags with no URL-safe characters (e.g. `!!!`).
const FALLBACK_STEM: &str = "tag";

/// Represents a [`crate::post::Post`] tag. The `name` is the normalized tag
/// (trimmed, lowercase) as it appears in listings; the `stem` is the file
/// name stem of the tag's page under `tag/`.
#[derive(Clone, Debug)]
pub struct Tag {
    /// The tag's normalized name. `Go` and ` go ` both resolve to `go`.
    pub name: String,

    /// The output file stem. Identical to `name` whenever `name` is already
    /// a valid slug. Otherwise it is `{slugified}--{hash}`, where the hash is
    /// taken over `name`: a tag like `c/c++` can never address a path
    /// outside `tag/`, and `c#` never shares a page with `c`. Valid slugs
    /// never contain `--`, so the two forms can't collide.
    pub stem: String,
}

impl Tag {
    /// Normalizes a raw frontmatter tag. Returns `None` only for tags that
    /// are empty after trimming.
    pub fn parse(raw: &str) -> Option<Tag> {
        let name = raw.trim().to_lowercase();
        if name.is_empty() {
            return None;
        }
        let stem = if crate::parser::is_valid_slug(&name) {
            name.clone()
        } else {
            let slug = slug::slugify(&name);
            let readable = if slug.is_empty() { FALLBACK_STEM } else { slug.as_str() };
            format!("{}--{}", readable, short_hash(&name))
        };
        Some(Tag { name, stem })
    }

    /// The tag page's path relative to the output root.
    pub fn path(&self) -> String {
        format!("tag/{}.html", self.stem)
    }

    /// Converts the tag into a template [`Value`] with fields `name`, `path`,
    /// and `url` (the path prefixed with `base_url`).
    pub fn to_value(&self, base_url: &str) -> Value {
        use std::collections::HashMap;
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "name".to_owned(),
            Value::from(htmlescape::encode_minimal(&self.name)),
        );
        m.insert("path".to_owned(), Value::from(self.path()));
        m.insert(
            "url".to_owned(),
            Value::from(format!("{}{}", base_url, self.path())),
        );
        Value::Object(m)
    }
}

// The first 6 bytes of the SHA-256 of `input`, in hex.
fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    digest.iter().take(6).map(|b| format!("{:02x}", b)).collect()
}

impl Hash for Tag {
    /// Implements [`Hash`] for [`Tag`] by delegating directly to the `name`
    /// field.
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state)
    }
}

impl PartialEq for Tag {
    /// Implements [`PartialEq`] and [`Eq`] for [`Tag`] by delegating directly
    /// to the `name` field.
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}
impl Eq for Tag {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        let tag = Tag::parse("  RUST ").unwrap();
        assert_eq!(tag.name, "rust");
        assert_eq!(tag.stem, "rust");
        assert_eq!(tag.path(), "tag/rust.html");
    }

    #[test]
    fn test_parse_empty() {
        assert!(Tag::parse("   ").is_none());
        assert!(Tag::parse("").is_none());
    }

    #[test]
    fn test_symbol_only_tag_is_kept() {
        let tag = Tag::parse("!!!").unwrap();
        assert_eq!(tag.name, "!!!");
        assert!(tag.stem.starts_with("tag--"));
        assert_ne!(tag.stem, Tag::parse("???").unwrap().stem);
    }

    #[test]
    fn test_distinct_names_get_distinct_stems() {
        let names = ["c", "c#", "c++", "c/c++", "c-", "C #"];
        let stems: Vec<String> = names
            .iter()
            .map(|n| Tag::parse(n).unwrap().stem)
            .collect();
        assert_eq!(stems[0], "c");
        assert!(stems[1].starts_with("c--"));
        for (i, a) in stems.iter().enumerate() {
            for b in &stems[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_stem_is_stable() {
        assert_eq!(Tag::parse("c#").unwrap().stem, Tag::parse(" C# ").unwrap().stem);
    }

    #[test]
    fn test_unsafe_name_gets_slug_stem() {
        let tag = Tag::parse("Web Dev").unwrap();
        assert_eq!(tag.name, "web dev");
        assert!(tag.stem.starts_with("web-dev--"));

        let tag = Tag::parse("../etc").unwrap();
        assert!(!tag.stem.contains('/'));
        assert!(!tag.stem.contains(".."));
    }
}
