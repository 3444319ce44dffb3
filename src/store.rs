//! Reading and writing post source files on behalf of an editor. The
//! source files are the system of record; a [`PostStore`] lists, loads,
//! saves and deletes them, stores uploaded images, and renders previews.

use crate::build::{ABOUT_FILE, IMAGES_DIR};
use crate::fsops::{self, FileOps};
use crate::parser::{self, Frontmatter, DEFAULT_TITLE};
use crate::{markdown, sanitize};
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// A row in the post listing.
#[derive(Clone, Debug, PartialEq)]
pub struct PostSummary {
    pub title: String,
    pub slug: String,
    pub date: NaiveDate,
    pub tags: Vec<String>,
    pub draft: bool,
    pub file_name: String,
}

/// A post's source, split into its editable fields.
#[derive(Clone, Debug, PartialEq)]
pub struct PostSource {
    pub title: String,
    pub slug: String,
    pub date: NaiveDate,
    pub tags: Vec<String>,
    pub publish: bool,
    pub body: String,
    pub path: PathBuf,
}

/// A post as submitted by an editor.
#[derive(Clone, Debug, PartialEq)]
pub struct PostDraft {
    pub title: String,

    /// The slug to save under. Derived from the title when absent.
    pub slug: Option<String>,

    pub date: NaiveDate,
    pub tags: Vec<String>,
    pub publish: bool,
    pub body: String,

    /// The slug the post was loaded under, if it is being edited. When it
    /// differs from the saved slug the old file is removed.
    pub previous_slug: Option<String>,
}

impl PostDraft {
    /// The slug this draft saves under.
    pub fn slug(&self) -> Result<String> {
        let slug = match &self.slug {
            Some(slug) if !slug.trim().is_empty() => slug.trim().to_owned(),
            _ => slug::slugify(&self.title),
        };
        if parser::is_valid_slug(&slug) {
            Ok(slug)
        } else {
            Err(Error::InvalidSlug(slug))
        }
    }

    /// Renders the draft as a source file with canonical frontmatter.
    pub fn to_source(&self, slug: &str) -> String {
        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim())
            .filter(|t| !t.is_empty())
            .map(yaml_scalar)
            .collect();
        let body = self.body.trim_end();
        format!(
            "---\ntitle: {}\ndate: {}\nslug: {}\ntags: [{}]\npublish: {}\n---\n\n{}{}",
            yaml_scalar(&self.title),
            self.date.format("%Y-%m-%d"),
            slug,
            tags.join(", "),
            self.publish,
            body,
            if body.is_empty() { "" } else { "\n" },
        )
    }
}

/// Quotes `s` for use as a YAML scalar when it would otherwise be read as
/// something other than the same plain string.
pub fn yaml_scalar(s: &str) -> String {
    let plain = !s.is_empty()
        && s.trim() == s
        && !s.starts_with(|c: char| "-?:,[]{}#&*!|>'\"%@`".contains(c))
        && !s.contains(": ")
        && !s.contains(" #")
        && !s.contains(|c: char| c == ',' || c == '[' || c == ']' || c.is_control())
        && !s.ends_with(':')
        && !matches!(
            s.to_ascii_lowercase().as_str(),
            "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~"
        )
        && s.parse::<f64>().is_err();
    if plain {
        return s.to_owned();
    }
    let mut quoted = String::with_capacity(s.len() + 2);
    quoted.push('"');
    for c in s.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\t' => quoted.push_str("\\t"),
            c if c.is_control() => quoted.push_str(&format!("\\u{:04x}", c as u32)),
            c => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Reduces an uploaded file name to a safe base name of ASCII letters,
/// digits, `.`, `-` and `_`. Returns `None` if nothing usable remains.
pub fn secure_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    let cleaned = cleaned.trim_start_matches(|c| c == '.' || c == '_');
    if cleaned.is_empty() {
        None
    } else {
        Some(cleaned.to_owned())
    }
}

/// Post source files in a content directory.
pub struct PostStore<'a, F: FileOps> {
    files: &'a F,
    content_dir: PathBuf,
    publish_by_default: bool,
}

impl<'a, F: FileOps> PostStore<'a, F> {
    pub fn new(files: &'a F, content_dir: &Path, publish_by_default: bool) -> PostStore<'a, F> {
        PostStore {
            files,
            content_dir: content_dir.to_owned(),
            publish_by_default,
        }
    }

    /// Summarizes every post, newest first. Files that can't be read or
    /// whose frontmatter can't be decoded are left out.
    pub fn list(&self) -> Result<Vec<PostSummary>> {
        let mut posts: Vec<PostSummary> = self
            .sources()?
            .into_iter()
            .map(|source| PostSummary {
                file_name: source
                    .path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                title: source.title,
                slug: source.slug,
                date: source.date,
                tags: source.tags,
                draft: !source.publish,
            })
            .collect();
        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok(posts)
    }

    /// Loads the post whose slug is `slug`.
    pub fn load(&self, slug: &str) -> Result<Option<PostSource>> {
        Ok(self.sources()?.into_iter().find(|s| s.slug == slug))
    }

    /// Writes `draft` to `{slug}.md`, returning the path written. If the
    /// post was renamed the file it was loaded from is removed.
    pub fn save(&self, draft: &PostDraft) -> Result<PathBuf> {
        let slug = draft.slug()?;
        let path = self.content_dir.join(format!("{}.md", slug));
        self.files.write(&path, draft.to_source(&slug).as_bytes())?;
        debug!(path = %path.display(), "saved post");

        if let Some(previous) = draft.previous_slug.as_deref().filter(|p| *p != slug) {
            if let Some(old) = self.load(previous)? {
                if old.path != path {
                    self.files.remove_file(&old.path)?;
                    debug!(path = %old.path.display(), "removed renamed post");
                }
            }
        }
        Ok(path)
    }

    /// Deletes the post whose slug is `slug`, returning whether it existed.
    pub fn delete(&self, slug: &str) -> Result<bool> {
        match self.load(slug)? {
            Some(source) => Ok(self.files.remove_file(&source.path)?),
            None => Ok(false),
        }
    }

    /// Stores an uploaded image under the content directory's images
    /// directory and returns the Markdown that embeds it.
    pub fn save_image(&self, name: &str, contents: &[u8]) -> Result<String> {
        let file_name =
            secure_file_name(name).ok_or_else(|| Error::InvalidFileName(name.to_owned()))?;
        self.files
            .write(&self.content_dir.join(IMAGES_DIR).join(&file_name), contents)?;
        Ok(format!("![{0}](/{1}/{0})", file_name, IMAGES_DIR))
    }

    /// Renders `markdown` exactly as a post body would be rendered.
    pub fn preview(&self, markdown: &str) -> Result<String> {
        Ok(markdown::to_safe_html(markdown)?)
    }

    fn sources(&self) -> Result<Vec<PostSource>> {
        let mut sources = Vec::new();
        for path in self.files.list_markdown_files(&self.content_dir)? {
            if path.file_name().map_or(false, |name| name == ABOUT_FILE) {
                continue;
            }
            let input = match self.files.read_to_string(&path) {
                Ok(input) => input,
                Err(err) => {
                    warn!(file = %path.display(), "skipping unreadable post: {}", err);
                    continue;
                }
            };
            match self.decode(&path, &input) {
                Ok(source) => sources.push(source),
                Err(err) => warn!(file = %path.display(), "skipping post: {}", err),
            }
        }
        Ok(sources)
    }

    fn decode(&self, path: &Path, input: &str) -> parser::Result<PostSource> {
        let (yaml, body) = parser::split_frontmatter(input)?;
        let frontmatter = Frontmatter::decode(yaml)?;
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(PostSource {
            title: frontmatter
                .title
                .unwrap_or_else(|| DEFAULT_TITLE.to_owned()),
            slug: frontmatter.slug.unwrap_or(stem),
            date: frontmatter.date.ok_or(parser::Error::MissingDate)?,
            tags: frontmatter.tags.iter().map(|t| t.trim().to_owned()).collect(),
            publish: frontmatter.publish.unwrap_or(self.publish_by_default),
            body: body.trim().to_owned(),
            path: path.to_owned(),
        })
    }
}

/// The result of a fallible store operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error reading or writing post sources.
#[derive(Debug)]
pub enum Error {
    /// Returned for file-system failures.
    Fs(fsops::Error),

    /// Returned when a draft's slug (given or derived) isn't valid.
    InvalidSlug(String),

    /// Returned when an upload's name has no usable characters.
    InvalidFileName(String),

    /// Returned when a preview can't be sanitized.
    Sanitize(sanitize::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Fs(err) => err.fmt(f),
            Error::InvalidSlug(slug) => write!(f, "invalid slug `{}`", slug),
            Error::InvalidFileName(name) => write!(f, "invalid file name `{}`", name),
            Error::Sanitize(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fs(err) => Some(err),
            Error::Sanitize(err) => Some(err),
            _ => None,
        }
    }
}

impl From<fsops::Error> for Error {
    fn from(err: fsops::Error) -> Error {
        Error::Fs(err)
    }
}

impl From<sanitize::Error> for Error {
    fn from(err: sanitize::Error) -> Error {
        Error::Sanitize(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fsops::LocalFs;
    use crate::parser::Parser;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn draft(title: &str) -> PostDraft {
        PostDraft {
            title: title.to_owned(),
            slug: None,
            date: date("2024-01-15"),
            tags: vec!["Rust".to_owned(), " web ".to_owned()],
            publish: true,
            body: "Hello *there*.".to_owned(),
            previous_slug: None,
        }
    }

    #[test]
    fn test_saved_source_parses() {
        let draft = draft("Hello: a \"quoted\" world");
        let source = draft.to_source("hello");
        let post = Parser::default().parse("hello", &source).unwrap();
        assert_eq!(post.title, "Hello: a \"quoted\" world");
        assert_eq!(post.slug, "hello");
        assert_eq!(post.tag_names(), vec!["rust", "web"]);
        assert!(!post.draft);
        assert_eq!(post.content, "\nHello *there*.\n");
    }

    #[test]
    fn test_yaml_scalar() {
        assert_eq!(yaml_scalar("Hello world"), "Hello world");
        assert_eq!(yaml_scalar("yes"), "\"yes\"");
        assert_eq!(yaml_scalar("2024"), "\"2024\"");
        assert_eq!(yaml_scalar("a: b"), "\"a: b\"");
        assert_eq!(yaml_scalar("#hash"), "\"#hash\"");
        assert_eq!(yaml_scalar(""), "\"\"");
    }

    #[test]
    fn test_secure_file_name() {
        assert_eq!(secure_file_name("my photo.png").as_deref(), Some("my_photo.png"));
        assert_eq!(secure_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(secure_file_name("C:\\x\\..\\a.jpg").as_deref(), Some("a.jpg"));
        assert_eq!(secure_file_name(".hidden").as_deref(), Some("hidden"));
        assert_eq!(secure_file_name("../"), None);
    }

    #[test]
    fn test_save_list_load_delete() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let store = PostStore::new(&LocalFs, tmp.path(), true);

        let path = store.save(&draft("First Post"))?;
        assert_eq!(path, tmp.path().join("first-post.md"));

        let mut second = draft("Second");
        second.date = date("2024-02-01");
        second.publish = false;
        store.save(&second)?;
        LocalFs.write(&tmp.path().join("about.md"), b"# About")?;
        LocalFs.write(&tmp.path().join("junk.md"), b"no frontmatter")?;

        let listed = store.list()?;
        let slugs: Vec<&str> = listed.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["second", "first-post"]);
        assert!(listed[0].draft);
        assert_eq!(listed[1].file_name, "first-post.md");

        let loaded = store.load("first-post")?.unwrap();
        assert_eq!(loaded.title, "First Post");
        assert_eq!(loaded.tags, vec!["Rust", "web"]);
        assert_eq!(loaded.body, "Hello *there*.");
        assert!(store.load("nope")?.is_none());

        assert!(store.delete("second")?);
        assert!(!store.delete("second")?);
        assert_eq!(store.list()?.len(), 1);
        Ok(())
    }

    #[test]
    fn test_rename_removes_old_file() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let store = PostStore::new(&LocalFs, tmp.path(), true);
        store.save(&draft("Old Name"))?;

        let mut renamed = draft("New Name");
        renamed.previous_slug = Some("old-name".to_owned());
        store.save(&renamed)?;

        assert!(!tmp.path().join("old-name.md").exists());
        assert!(tmp.path().join("new-name.md").exists());
        Ok(())
    }

    #[test]
    fn test_invalid_slug() {
        let tmp = tempfile::tempdir().unwrap();
        let store = PostStore::new(&LocalFs, tmp.path(), true);
        let mut bad = draft("Title");
        bad.slug = Some("Bad Slug!".to_owned());
        assert!(matches!(store.save(&bad), Err(Error::InvalidSlug(_))));
    }

    #[test]
    fn test_save_image() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let store = PostStore::new(&LocalFs, tmp.path(), true);
        let snippet = store.save_image("cat pic.png", b"\x89PNG")?;
        assert_eq!(snippet, "![cat_pic.png](/images/cat_pic.png)");
        assert!(tmp.path().join("images/cat_pic.png").exists());
        Ok(())
    }

    #[test]
    fn test_preview_is_sanitized() -> Result<()> {
        let tmp = tempfile::tempdir().unwrap();
        let store = PostStore::new(&LocalFs, tmp.path(), true);
        let html = store.preview("Hi <script>alert(1)</script>")?;
        assert!(!html.contains("script"));
        assert!(html.contains("Hi"));
        Ok(())
    }
}
