//! Creates new post source files.

use crate::fsops::{self, FileOps};
use crate::store::PostDraft;
use chrono::NaiveDate;
use std::fmt;
use std::path::{Path, PathBuf};

/// Body given to freshly created posts.
pub const PLACEHOLDER_BODY: &str = "Write your content here.";

/// Creates `{slug}.md` in `content_dir` for a new draft titled `title`,
/// dated `today`, and returns its path. The slug is derived from the title.
/// An existing file is never overwritten.
pub fn create_post<F: FileOps>(
    files: &F,
    title: &str,
    content_dir: &Path,
    today: NaiveDate,
) -> Result<PathBuf> {
    let slug = slug::slugify(title);
    if slug.is_empty() {
        return Err(Error::EmptySlug(title.to_owned()));
    }

    let path = content_dir.join(format!("{}.md", slug));
    if files.exists(&path) {
        return Err(Error::Exists(path));
    }

    let draft = PostDraft {
        title: title.trim().to_owned(),
        slug: Some(slug.clone()),
        date: today,
        tags: Vec::new(),
        publish: false,
        body: PLACEHOLDER_BODY.to_owned(),
        previous_slug: None,
    };
    files.write(&path, draft.to_source(&slug).as_bytes())?;
    Ok(path)
}

/// The result of creating a post.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a failure to create a post.
#[derive(Debug)]
pub enum Error {
    /// Returned when the post's file already exists.
    Exists(PathBuf),

    /// Returned when the title has nothing to build a slug from.
    EmptySlug(String),

    /// Returned when the file can't be written.
    Fs(fsops::Error),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Exists(path) => write!(f, "post already exists: '{}'", path.display()),
            Error::EmptySlug(title) => {
                write!(f, "title `{}` doesn't produce a usable slug", title)
            }
            Error::Fs(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Fs(err) => Some(err),
            _ => None,
        }
    }
}

impl From<fsops::Error> for Error {
    fn from(err: fsops::Error) -> Error {
        Error::Fs(err)
    }
}
