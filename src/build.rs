//! Exports the [`Builder`] which stitches together the high-level steps of
//! building the output static site: parsing the posts ([`crate::parser`]),
//! laying out and rendering pages ([`crate::write`]), emitting the feed,
//! sitemap and search index, and copying static assets into the output
//! directory. [`build_site`] runs a [`Builder`] over the local file system
//! with the project's templates.

use crate::config::Config;
use crate::feed::{self, Error as FeedError};
use crate::fsops::{Error as FsError, FileOps, LocalFs};
use crate::markdown;
use crate::parser::{self, Frontmatter, Parser};
use crate::post::Post;
use crate::search;
use crate::sitemap;
use crate::tag::Tag;
use crate::template::{Error as TemplateError, Renderer, TemplateSet};
use crate::write::{group_by_tag, Page, SiteWriter};
use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use tracing::{debug, error, info, warn};

/// Source file holding the about page. It is never treated as a post.
pub const ABOUT_FILE: &str = "about.md";

/// Directory under the content directory whose files are copied to the
/// same-named directory under the output directory.
pub const IMAGES_DIR: &str = "images";

/// Title of the about page when `about.md` doesn't give one.
pub const DEFAULT_ABOUT_TITLE: &str = "About";

lazy_static! {
    static ref RUN_LOCK: Mutex<()> = Mutex::new(());
}

/// Builds the site described by `config` into its output directory, using
/// the templates in its templates directory and the local file system.
/// Concurrent calls in the same process run one after another.
pub fn build_site(config: &Config) -> Result<BuildReport> {
    let _guard = RUN_LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let templates = TemplateSet::load(&config.templates_dir).map_err(Error::Template)?;
    Builder::new(config, &LocalFs, &templates).build()
}

/// The outcome of a successful build.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BuildReport {
    /// Published posts.
    pub published: usize,

    /// Draft posts that were parsed and left out of the output.
    pub drafts: usize,

    /// Source files that failed to read or parse, plus post pages that
    /// failed to render or write.
    pub failed: usize,
}

/// The single coordinator of a build run. It receives its file-system and
/// templating collaborators at construction and owns the output directory
/// for the duration of [`Builder::build`].
pub struct Builder<'a, F: FileOps, R: Renderer> {
    config: &'a Config,
    files: &'a F,
    renderer: &'a R,
    now: DateTime<Utc>,
}

impl<'a, F: FileOps, R: Renderer> Builder<'a, F, R> {
    pub fn new(config: &'a Config, files: &'a F, renderer: &'a R) -> Builder<'a, F, R> {
        Builder {
            config,
            files,
            renderer,
            now: Utc::now(),
        }
    }

    /// Sets the time recorded as the feed's `lastBuildDate`.
    pub fn with_build_time(mut self, now: DateTime<Utc>) -> Builder<'a, F, R> {
        self.now = now;
        self
    }

    /// Wipes and fully repopulates the output directory.
    ///
    /// A source file that can't be read or parsed is logged and skipped, as
    /// is a post page that fails to render or write. Anything else that
    /// goes wrong aborts the run, possibly leaving the output directory
    /// partially written.
    pub fn build(&self) -> Result<BuildReport> {
        let mut report = BuildReport::default();
        let output = &self.config.output_dir;

        self.files.clean_directory(output).map_err(Error::Clean)?;

        let (posts, drafts, failed) = self.load_posts()?;
        report.drafts = drafts;
        report.failed = failed;
        report.published = posts.len();

        let writer = SiteWriter::new(self.config);

        for (i, post) in posts.iter().enumerate() {
            if let Err(err) = self.write_page(&writer.post_page(&posts, i)) {
                error!(slug = %post.slug, "skipping post page: {}", err);
                report.failed += 1;
            }
        }

        for page in writer.index_pages(&posts) {
            self.write_page(&page)?;
        }

        self.write_page(&writer.archive_page(&posts))?;

        let groups = group_by_tag(&posts);
        for page in writer.tag_pages(&groups) {
            self.write_page(&page)?;
        }

        let (about_title, about_html) = self.about()?;
        self.write_page(&writer.about_page(&about_title, &about_html))?;
        self.write_page(&writer.not_found_page())?;

        let rss = feed::render_rss(&posts, self.config, self.now).map_err(Error::Feed)?;
        self.write("feed.xml", rss.as_bytes())?;
        self.write_page(&writer.rss_page(&posts))?;

        let tags: Vec<&Tag> = groups.iter().map(|(tag, _)| *tag).collect();
        let sitemap = sitemap::render_sitemap(&posts, &tags, self.config).map_err(Error::Feed)?;
        self.write("sitemap.xml", sitemap.as_bytes())?;

        let index = search::render_search_index(&posts).map_err(Error::Json)?;
        self.write("search.json", index.as_bytes())?;

        self.copy_assets()?;

        info!(
            published = report.published,
            drafts = report.drafts,
            failed = report.failed,
            "Built {} posts ({} drafts skipped)",
            report.published,
            report.drafts
        );
        Ok(report)
    }

    /// Reads and parses every post source, returning the published posts
    /// newest first along with the draft and failure counts. Posts sharing
    /// a date keep their file-name order.
    fn load_posts(&self) -> Result<(Vec<Post>, usize, usize)> {
        let parser = Parser::new(self.config.publish_by_default);
        let sources = self
            .files
            .list_markdown_files(&self.config.content_dir)
            .map_err(Error::List)?;

        let mut posts = Vec::with_capacity(sources.len());
        let mut drafts = 0;
        let mut failed = 0;
        for path in sources {
            if path.file_name().map_or(false, |name| name == ABOUT_FILE) {
                continue;
            }
            let input = match self.files.read_to_string(&path) {
                Ok(input) => input,
                Err(err) => {
                    error!(file = %path.display(), "skipping unreadable post: {}", err);
                    failed += 1;
                    continue;
                }
            };
            match parser.parse_file(&path, &input) {
                Ok(post) if post.draft => {
                    debug!(file = %path.display(), "skipping draft");
                    drafts += 1;
                }
                Ok(post) => posts.push(post),
                Err(err) => {
                    error!(file = %path.display(), "{}", err);
                    failed += 1;
                }
            }
        }

        let mut seen: HashMap<&str, usize> = HashMap::new();
        for post in &posts {
            *seen.entry(post.slug.as_str()).or_default() += 1;
        }
        for (slug, count) in seen.into_iter().filter(|(_, count)| *count > 1) {
            warn!(slug, count, "duplicate slug; the last page written wins");
        }

        posts.sort_by(|a, b| b.date.cmp(&a.date));
        Ok((posts, drafts, failed))
    }

    /// Loads the about page's title and HTML. A missing `about.md` gives an
    /// empty page.
    fn about(&self) -> Result<(String, String)> {
        let path = self.config.content_dir.join(ABOUT_FILE);
        if !self.files.exists(&path) {
            return Ok((DEFAULT_ABOUT_TITLE.to_owned(), String::new()));
        }
        let input = self.files.read_to_string(&path).map_err(Error::Read)?;
        Ok(about_page(&input))
    }

    fn copy_assets(&self) -> Result<()> {
        let output = &self.config.output_dir;
        let report = self
            .files
            .copy_tree(&self.config.static_dir, output)
            .map_err(Error::Copy)?;
        debug!(copied = report.copied, skipped = report.skipped, "copied static assets");

        let images = output.join(IMAGES_DIR);
        self.files.remove_tree(&images).map_err(Error::Copy)?;
        let report = self
            .files
            .copy_tree(&self.config.content_dir.join(IMAGES_DIR), &images)
            .map_err(Error::Copy)?;
        debug!(copied = report.copied, skipped = report.skipped, "copied images");
        Ok(())
    }

    fn write_page(&self, page: &Page) -> Result<()> {
        let html = self
            .renderer
            .render(page.template, &page.context)
            .map_err(Error::Template)?;
        self.write(&page.path, html.as_bytes())
    }

    fn write(&self, relative: &str, contents: &[u8]) -> Result<()> {
        self.files
            .write(&self.config.output_dir.join(relative), contents)
            .map_err(Error::Write)
    }
}

/// Splits `about.md` into its title and HTML. The frontmatter block is
/// optional; its `title` names the page. The body is site-owner content and
/// is rendered without sanitizing.
pub fn about_page(input: &str) -> (String, String) {
    let (title, body) = match parser::split_frontmatter(input) {
        Ok((yaml, body)) => {
            let title = Frontmatter::decode(yaml).ok().and_then(|f| f.title);
            (title, body)
        }
        Err(_) => (None, input),
    };
    let title = title
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_ABOUT_TITLE.to_owned());
    (title, markdown::to_html(body))
}

/// The result of a fallible build.
pub type Result<T> = std::result::Result<T, Error>;

/// The error type for building a site. Every variant aborts the run.
#[derive(Debug)]
pub enum Error {
    /// Returned when the output directory can't be cleaned.
    Clean(FsError),

    /// Returned when the content directory can't be listed.
    List(FsError),

    /// Returned when a page source such as `about.md` can't be read.
    Read(FsError),

    /// Returned when an output file can't be written.
    Write(FsError),

    /// Returned when templates can't be loaded or a site-level page can't
    /// be rendered.
    Template(TemplateError),

    /// Returned for errors emitting the feed or the sitemap.
    Feed(FeedError),

    /// Returned for errors serializing the search index.
    Json(serde_json::Error),

    /// Returned when static assets or images can't be copied.
    Copy(FsError),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Clean(err) => write!(f, "cleaning output directory: {}", err),
            Error::List(err) => write!(f, "listing posts: {}", err),
            Error::Read(err) => write!(f, "reading page source: {}", err),
            Error::Write(err) => write!(f, "writing output: {}", err),
            Error::Template(err) => err.fmt(f),
            Error::Feed(err) => write!(f, "writing feed: {}", err),
            Error::Json(err) => write!(f, "writing search index: {}", err),
            Error::Copy(err) => write!(f, "copying assets: {}", err),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Clean(err) => Some(err),
            Error::List(err) => Some(err),
            Error::Read(err) => Some(err),
            Error::Write(err) => Some(err),
            Error::Template(err) => Some(err),
            Error::Feed(err) => Some(err),
            Error::Json(err) => Some(err),
            Error::Copy(err) => Some(err),
        }
    }
}
