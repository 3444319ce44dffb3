//! Site configuration, loaded from a `config.yaml` project file.

use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// The name of the project file.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

const DEFAULT_POSTS_PER_PAGE: usize = 10;
const DEFAULT_DEBOUNCE_MS: u64 = 1000;

#[derive(Deserialize, Default)]
struct Project {
    content_dir: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    static_dir: Option<PathBuf>,
    templates_dir: Option<PathBuf>,
    site_name: Option<String>,
    site_description: Option<String>,
    base_url: Option<String>,
    author: Option<String>,
    twitter_handle: Option<String>,
    github_handle: Option<String>,
    posts_per_page: Option<usize>,
    publish_by_default: Option<bool>,
    watch_debounce_ms: Option<u64>,
}

/// Everything a build needs to know about the site. Directory paths are
/// absolute or relative to the process working directory; relative paths in
/// the project file are resolved against the project file's directory.
#[derive(Clone, Debug)]
pub struct Config {
    /// Directory holding post sources, `about.md`, and `images/`.
    pub content_dir: PathBuf,

    /// Directory the site is written to. Emptied at the start of each build.
    pub output_dir: PathBuf,

    /// Directory copied verbatim into the output root.
    pub static_dir: PathBuf,

    /// Directory holding the page templates.
    pub templates_dir: PathBuf,

    pub site_name: String,
    pub site_description: String,

    /// Prefix for every absolute URL the site emits (feed, sitemap,
    /// templates). Used as given, so it normally ends in `/`.
    pub base_url: String,

    pub author: String,
    pub twitter_handle: String,
    pub github_handle: String,

    /// Number of posts per index page. Never zero.
    pub posts_per_page: usize,

    /// Whether a post without a `publish` key is published.
    pub publish_by_default: bool,

    /// Minimum interval between two watch-triggered rebuilds.
    pub watch_debounce: Duration,
}

impl Config {
    /// Searches `dir` and then each of its ancestors for
    /// [`CONFIG_FILE_NAME`] and loads the first one found.
    pub fn from_directory(dir: &Path) -> Result<Config> {
        for candidate in dir.ancestors() {
            let path = candidate.join(CONFIG_FILE_NAME);
            if path.is_file() {
                return Config::from_project_file(&path);
            }
        }
        Err(Error::NotFound(dir.to_owned()))
    }

    /// Loads the project file at `path`.
    pub fn from_project_file(path: &Path) -> Result<Config> {
        let yaml = std::fs::read_to_string(path).map_err(|err| Error::Io {
            path: path.to_owned(),
            err,
        })?;
        let root = path.parent().unwrap_or_else(|| Path::new("."));
        Config::from_yaml(&yaml, root)
    }

    /// Parses project file contents. Relative directories are resolved
    /// against `root`.
    pub fn from_yaml(yaml: &str, root: &Path) -> Result<Config> {
        let project: Project = if yaml.trim().is_empty() {
            Project::default()
        } else {
            serde_yaml::from_str(yaml)?
        };

        fn required<T>(value: Option<T>, key: &'static str) -> Result<T> {
            value.ok_or(Error::Missing(key))
        }
        let dir = |value: Option<PathBuf>, key: &'static str| -> Result<PathBuf> {
            Ok(root.join(required(value, key)?))
        };

        let posts_per_page = project.posts_per_page.unwrap_or(DEFAULT_POSTS_PER_PAGE);
        if posts_per_page == 0 {
            return Err(Error::Invalid {
                key: "posts_per_page",
                reason: "must be at least 1".to_owned(),
            });
        }

        Ok(Config {
            content_dir: dir(project.content_dir, "content_dir")?,
            output_dir: dir(project.output_dir, "output_dir")?,
            static_dir: dir(project.static_dir, "static_dir")?,
            templates_dir: dir(project.templates_dir, "templates_dir")?,
            site_name: required(project.site_name, "site_name")?,
            site_description: project
                .site_description
                .unwrap_or_else(|| "A blog".to_owned()),
            base_url: project.base_url.unwrap_or_else(|| "/".to_owned()),
            author: project.author.unwrap_or_default(),
            twitter_handle: project.twitter_handle.unwrap_or_default(),
            github_handle: project.github_handle.unwrap_or_default(),
            posts_per_page,
            publish_by_default: project.publish_by_default.unwrap_or(true),
            watch_debounce: Duration::from_millis(
                project.watch_debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS),
            ),
        })
    }

    /// The URL of the RSS feed.
    pub fn feed_url(&self) -> String {
        format!("{}feed.xml", self.base_url)
    }
}

/// The result of loading configuration.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents a configuration problem. All of these are fatal and are
/// reported before any output is touched.
#[derive(Debug)]
pub enum Error {
    /// Returned when no project file exists in the directory or any of its
    /// ancestors.
    NotFound(PathBuf),

    /// Returned when the project file can't be read.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned when the project file isn't valid YAML of the right shape.
    Yaml(serde_yaml::Error),

    /// Returned when a required key is absent.
    Missing(&'static str),

    /// Returned when a key has an unusable value.
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::NotFound(dir) => write!(
                f,
                "could not find `{}` in '{}' or any parent directory",
                CONFIG_FILE_NAME,
                dir.display()
            ),
            Error::Io { path, err } => {
                write!(f, "reading '{}': {}", path.display(), err)
            }
            Error::Yaml(err) => write!(f, "loading configuration: {}", err),
            Error::Missing(key) => {
                write!(f, "missing required configuration key `{}`", key)
            }
            Error::Invalid { key, reason } => {
                write!(f, "invalid configuration key `{}`: {}", key, reason)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            Error::Yaml(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_yaml::Error> for Error {
    /// Converts [`serde_yaml::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator.
    fn from(err: serde_yaml::Error) -> Error {
        Error::Yaml(err)
    }
}
