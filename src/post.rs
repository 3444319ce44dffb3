//! Defines the [`Post`] type, the unit every build stage works on. See
//! [`crate::parser`] for how posts are produced from source files and
//! [`Post::to_value`] for how they are handed to templates.

use crate::tag::Tag;
use chrono::{Datelike, NaiveDate};
use gtmpl::Value;
use std::collections::HashMap;

/// Words per minute used for [`Post::reading_time`].
pub const WORDS_PER_MINUTE: usize = 200;

/// Length, in characters, of feed and search excerpts.
pub const EXCERPT_LENGTH: usize = 200;

/// A parsed post. Posts are built fresh on every build and never mutated
/// afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Post {
    /// The display title. Never empty; defaults to `Untitled`.
    pub title: String,

    /// The publication date.
    pub date: NaiveDate,

    /// The URL path segment and output file stem. Always matches
    /// `^[a-z0-9]+(-[a-z0-9]+)*$`.
    pub slug: String,

    /// The raw markdown body, frontmatter stripped.
    pub content: String,

    /// The sanitized HTML rendering of `content`.
    pub html_content: String,

    /// Normalized tags in frontmatter order, without duplicates.
    pub tags: Vec<Tag>,

    /// Drafts are parsed but excluded from every rendered artifact.
    pub draft: bool,

    /// Estimated minutes to read, at least 1.
    pub reading_time: u32,
}

impl Post {
    /// The post page's path relative to the output root.
    pub fn path(&self) -> String {
        format!("{}.html", self.slug)
    }

    /// The calendar year used for archive grouping.
    pub fn year(&self) -> i32 {
        self.date.year()
    }

    /// The post's tag names, in order.
    pub fn tag_names(&self) -> Vec<&str> {
        self.tags.iter().map(|t| t.name.as_str()).collect()
    }

    /// A plain-text excerpt for feeds: markdown emphasis, heading, and code
    /// markers are stripped, whitespace is collapsed, and anything beyond
    /// [`EXCERPT_LENGTH`] characters is cut back to the last word boundary
    /// and suffixed with `...`.
    pub fn excerpt(&self) -> String {
        let stripped: String = self
            .content
            .chars()
            .filter(|c| !matches!(c, '#' | '*' | '`'))
            .collect();
        let text = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
        truncate_on_word(&text, EXCERPT_LENGTH)
    }

    /// The first [`EXCERPT_LENGTH`] raw characters of the body with every
    /// line break turned into one space. A `\r\n` pair is one line break.
    pub fn search_excerpt(&self) -> String {
        let head: String = self.content.chars().take(EXCERPT_LENGTH).collect();
        head.replace("\r\n", "\n")
            .replace(|c: char| c == '\n' || c == '\r', " ")
    }

    /// Converts a [`Post`] into a template [`Value`]. Text fields are
    /// HTML-escaped; `html_content` is already sanitized markup. `url` and
    /// the tag URLs are prefixed with `base_url`.
    pub fn to_value(&self, base_url: &str) -> Value {
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert(
            "title".to_owned(),
            Value::from(htmlescape::encode_minimal(&self.title)),
        );
        m.insert(
            "date".to_owned(),
            Value::from(self.date.format("%Y-%m-%d").to_string()),
        );
        m.insert(
            "date_display".to_owned(),
            Value::from(self.date.format("%B %-d, %Y").to_string()),
        );
        m.insert("slug".to_owned(), Value::from(self.slug.clone()));
        m.insert("path".to_owned(), Value::from(self.path()));
        m.insert(
            "url".to_owned(),
            Value::from(format!("{}{}", base_url, self.path())),
        );
        m.insert(
            "html_content".to_owned(),
            Value::from(self.html_content.clone()),
        );
        m.insert(
            "excerpt".to_owned(),
            Value::from(htmlescape::encode_minimal(&self.excerpt())),
        );
        m.insert(
            "reading_time".to_owned(),
            Value::from(self.reading_time as i64),
        );
        m.insert(
            "tags".to_owned(),
            Value::Array(self.tags.iter().map(|t| t.to_value(base_url)).collect()),
        );
        Value::Object(m)
    }
}

/// Reading time in minutes for a markdown body: whitespace-separated words
/// divided by [`WORDS_PER_MINUTE`], rounded half up, never less than 1.
pub fn reading_time(body: &str) -> u32 {
    let words = body.split_whitespace().count();
    let minutes = (words + WORDS_PER_MINUTE / 2) / WORDS_PER_MINUTE;
    minutes.max(1) as u32
}

// Cuts `text` to at most `max` characters. A cut text loses its trailing
// partial word and gains `...`.
fn truncate_on_word(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_owned(),
        Some((cut, _)) => {
            let head = &text[..cut];
            let head = match head.rfind(' ') {
                Some(space) => &head[..space],
                None => head,
            };
            format!("{}...", head)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn post(slug: &str, date: &str, tags: &[&str]) -> Post {
        Post {
            title: format!("Title of {}", slug),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            slug: slug.to_owned(),
            content: format!("Body of {}", slug),
            html_content: format!("<p>Body of {}</p>\n", slug),
            tags: tags.iter().filter_map(|t| Tag::parse(t)).collect(),
            draft: false,
            reading_time: 1,
        }
    }

    #[test]
    fn test_reading_time() {
        assert_eq!(reading_time(""), 1);
        assert_eq!(reading_time("one two three"), 1);
        assert_eq!(reading_time(&"word ".repeat(299)), 1);
        assert_eq!(reading_time(&"word ".repeat(300)), 2);
        assert_eq!(reading_time(&"word\n\t".repeat(1000)), 5);
    }

    #[test]
    fn test_excerpt_strips_markers() {
        let mut p = post("a", "2024-01-01", &[]);
        p.content = "# Title\n\nSome **bold**   and `code`.\n".to_owned();
        assert_eq!(p.excerpt(), "Title Some bold and code.");
    }

    #[test]
    fn test_excerpt_truncates_on_word_boundary() {
        let mut p = post("a", "2024-01-01", &[]);
        p.content = "lorem ipsum ".repeat(30);
        let excerpt = p.excerpt();
        assert!(excerpt.ends_with("..."));
        let body = excerpt.trim_end_matches("...");
        assert!(body.chars().count() <= EXCERPT_LENGTH);
        assert!(body.ends_with("lorem") || body.ends_with("ipsum"));
    }

    #[test]
    fn test_excerpt_short_is_untouched() {
        let mut p = post("a", "2024-01-01", &[]);
        p.content = "short body".to_owned();
        assert_eq!(p.excerpt(), "short body");
    }

    #[test]
    fn test_search_excerpt() {
        let mut p = post("a", "2024-01-01", &[]);
        p.content = "# Hi\n\nWorld\r\nagain\n".to_owned();
        assert_eq!(p.search_excerpt(), "# Hi  World again ");

        p.content = "x".repeat(500);
        assert_eq!(p.search_excerpt().chars().count(), EXCERPT_LENGTH);
    }
}
