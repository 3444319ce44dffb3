//! Defines the [`Parser`] and [`Error`] types: the logic for turning a
//! source file's contents into a validated [`Post`]. Parsing is a pure
//! function of the file name stem and contents; reading files is the
//! caller's business (see [`crate::build`]).

use std::{fmt, path::Path};

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;

use crate::{markdown, post, post::Post, sanitize, tag::Tag};

/// Title given to posts whose frontmatter has none.
pub const DEFAULT_TITLE: &str = "Untitled";

lazy_static! {
    static ref FRONTMATTER_REGEX: Regex = Regex::new(
        r"(?s)\A---[ \t]*\r?\n(.*?)\r?\n---[ \t]*\r?\n(.*)\z"
    )
    .unwrap();
    static ref SLUG_REGEX: Regex =
        Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").unwrap();
}

/// Returns whether `s` is a valid slug: lowercase ASCII letters and digits
/// in runs joined by single hyphens.
pub fn is_valid_slug(s: &str) -> bool {
    SLUG_REGEX.is_match(s)
}

/// Splits a source file into its frontmatter text and its body. The file
/// must open with a `---` line, followed by the frontmatter, a closing
/// `---` line, and the body (which may be empty).
pub fn split_frontmatter(input: &str) -> Result<(&str, &str)> {
    let input = input.strip_prefix('\u{feff}').unwrap_or(input);
    let captures = FRONTMATTER_REGEX
        .captures(input)
        .ok_or(Error::MalformedFrontmatter)?;
    match (captures.get(1), captures.get(2)) {
        (Some(yaml), Some(body)) => Ok((yaml.as_str(), body.as_str())),
        _ => Err(Error::MalformedFrontmatter),
    }
}

/// Parses [`Post`] objects from source file contents.
#[derive(Clone, Debug)]
pub struct Parser {
    /// Whether a post without a `publish` key is published (`true`) or a
    /// draft (`false`).
    publish_by_default: bool,
}

impl Default for Parser {
    fn default() -> Self {
        Parser::new(true)
    }
}

impl Parser {
    /// Constructs a new parser. See fields on [`Parser`] for argument
    /// descriptions.
    pub fn new(publish_by_default: bool) -> Parser {
        Parser { publish_by_default }
    }

    /// Parses the contents of the source file at `path`. Errors are
    /// annotated with the file name.
    pub fn parse_file(&self, path: &Path, input: &str) -> Result<Post> {
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.parse(&stem, input).map_err(|e| {
            Error::Annotated(format!("parsing post `{}`", path.display()), Box::new(e))
        })
    }

    /// Parses a single [`Post`]. `stem` is the source file name without its
    /// extension and is the slug when the frontmatter doesn't give one.
    ///
    /// ```md
    /// ---
    /// title: Hello, world!
    /// date: 2021-04-16
    /// slug: hello
    /// tags: [greet]
    /// publish: true
    /// ---
    /// # Hello
    ///
    /// World
    /// ```
    pub fn parse(&self, stem: &str, input: &str) -> Result<Post> {
        let (yaml, body) = split_frontmatter(input)?;
        let frontmatter = Frontmatter::decode(yaml)?;

        let title = frontmatter
            .title
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_TITLE.to_owned());
        let date = frontmatter.date.ok_or(Error::MissingDate)?;
        let slug = frontmatter.slug.unwrap_or_else(|| stem.to_owned());
        if !is_valid_slug(&slug) {
            return Err(Error::InvalidSlug(slug));
        }

        let mut tags: Vec<Tag> = Vec::with_capacity(frontmatter.tags.len());
        for tag in frontmatter.tags.iter().filter_map(|t| Tag::parse(t)) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }

        let draft = !frontmatter.publish.unwrap_or(self.publish_by_default);
        let reading_time = post::reading_time(body);
        let html_content = markdown::to_safe_html(body)?;

        Ok(Post {
            title,
            date,
            slug,
            content: body.to_owned(),
            html_content,
            tags,
            draft,
            reading_time,
        })
    }
}

/// A frontmatter scalar as YAML decoded it. Titles like `2024` or dates
/// written as plain scalars arrive as whichever variant YAML picked and are
/// normalized in [`Frontmatter::decode`].
#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_string(self) -> String {
        match self {
            Scalar::Text(s) => s,
            Scalar::Integer(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
#[serde(untagged)]
enum TagList {
    Many(Vec<Scalar>),
    One(Scalar),
}

#[derive(Deserialize, Default)]
struct RawFrontmatter {
    #[serde(default)]
    title: Option<Scalar>,

    #[serde(default)]
    date: Option<Scalar>,

    #[serde(default)]
    slug: Option<Scalar>,

    #[serde(default)]
    tags: Option<TagList>,

    #[serde(default)]
    publish: Option<bool>,
}

/// Decoded frontmatter with every field in its final representation.
/// Unknown keys are ignored.
#[derive(Debug, Default, PartialEq)]
pub struct Frontmatter {
    /// The post title, if given.
    pub title: Option<String>,

    /// The post date, if given.
    pub date: Option<NaiveDate>,

    /// The post slug, if given.
    pub slug: Option<String>,

    /// The raw tags. A single string is split on commas.
    pub tags: Vec<String>,

    /// The `publish` flag, if given.
    pub publish: Option<bool>,
}

impl Frontmatter {
    /// Decodes the YAML between the frontmatter fences.
    pub fn decode(yaml: &str) -> Result<Frontmatter> {
        let raw: RawFrontmatter = if yaml.trim().is_empty() {
            RawFrontmatter::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        let date = match raw.date {
            None => None,
            Some(Scalar::Text(s)) => Some(
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map_err(|_| Error::InvalidDate(s))?,
            ),
            Some(other) => return Err(Error::InvalidDate(other.into_string())),
        };

        let tags = match raw.tags {
            None => Vec::new(),
            Some(TagList::Many(tags)) => {
                tags.into_iter().map(Scalar::into_string).collect()
            }
            Some(TagList::One(tags)) => tags
                .into_string()
                .split(',')
                .map(str::to_owned)
                .collect(),
        };

        Ok(Frontmatter {
            title: raw.title.map(Scalar::into_string),
            date,
            slug: raw.slug.map(|s| s.into_string().trim().to_owned()),
            tags,
            publish: raw.publish,
        })
    }
}

/// Represents the result of a [`Post`]-parse operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error parsing a [`Post`] object.
#[derive(Debug)]
pub enum Error {
    /// Returned when a source file doesn't open with a `---`-fenced
    /// frontmatter block.
    MalformedFrontmatter,

    /// Returned when there was an error parsing the frontmatter as YAML.
    DeserializeYaml(serde_yaml::Error),

    /// Returned when the frontmatter has no `date`.
    MissingDate,

    /// Returned when the `date` isn't a `YYYY-MM-DD` date.
    InvalidDate(String),

    /// Returned when the slug (given or derived from the file name) isn't
    /// lowercase letters, digits, and single hyphens.
    InvalidSlug(String),

    /// Returned when the post body can't be sanitized.
    Sanitize(sanitize::Error),

    /// An error with an annotation.
    Annotated(String, Box<Error>),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::MalformedFrontmatter => write!(
                f,
                "post must begin with a `---` fenced frontmatter block"
            ),
            Error::DeserializeYaml(err) => err.fmt(f),
            Error::MissingDate => write!(f, "frontmatter is missing `date`"),
            Error::InvalidDate(date) => {
                write!(f, "invalid date `{}` (expected YYYY-MM-DD)", date)
            }
            Error::InvalidSlug(slug) => write!(
                f,
                "invalid slug `{}` (expected lowercase letters, digits, and hyphens)",
                slug
            ),
            Error::Sanitize(err) => err.fmt(f),
            Error::Annotated(annotation, err) => {
                write!(f, "{}: {}", &annotation, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::DeserializeYaml(err) => Some(err),
            Error::Sanitize(err) => Some(err),
            Error::Annotated(_, err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts a [`serde_yaml::Error`] into an [`Error`]. It allows us to use
    /// the `?` operator for [`serde_yaml`] deserialization functions.
    fn from(err: serde_yaml::Error) -> Error {
        Error::DeserializeYaml(err)
    }
}

impl From<sanitize::Error> for Error {
    fn from(err: sanitize::Error) -> Error {
        Error::Sanitize(err)
    }
}
