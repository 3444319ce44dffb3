//! The templating collaborator. Builds hand a template name and a
//! [`Value`] context to a [`Renderer`] and get markup back; [`TemplateSet`]
//! is the [`gtmpl`]-backed implementation that loads a theme directory.

use gtmpl::{Context, Template, Value};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Page templates every theme must provide.
pub const REQUIRED_TEMPLATES: &[&str] = &[
    "post.html",
    "index.html",
    "archive.html",
    "tags.html",
    "tag.html",
    "about.html",
    "404.html",
    "rss.html",
];

/// Renders named templates against structured data.
pub trait Renderer {
    /// Renders the template `name` with `context`. Fails if there is no such
    /// template or if executing it fails.
    fn render(&self, name: &str, context: &Value) -> Result<String>;
}

/// A set of parsed page templates keyed by file name.
pub struct TemplateSet {
    templates: HashMap<String, Template>,
}

impl TemplateSet {
    /// Loads every `*.html` file in `dir`. Files whose name starts with `_`
    /// are partials: their contents are prepended (in file-name order) to
    /// every page template, so `{{define}}` blocks in them are available
    /// everywhere. Every name in [`REQUIRED_TEMPLATES`] must be present.
    pub fn load(dir: &Path) -> Result<TemplateSet> {
        let mut files: Vec<PathBuf> = Vec::new();
        for entry in fs::read_dir(dir).map_err(|err| Error::Io {
            path: dir.to_owned(),
            err,
        })? {
            let entry = entry.map_err(|err| Error::Io {
                path: dir.to_owned(),
                err,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().map_or(false, |ext| ext == "html") {
                files.push(path);
            }
        }
        files.sort();

        let mut partials = String::new();
        let mut pages: Vec<(String, String)> = Vec::new();
        for path in files {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let contents = fs::read_to_string(&path).map_err(|err| Error::Io {
                path: path.clone(),
                err,
            })?;
            if name.starts_with('_') {
                partials.push_str(&contents);
                partials.push(' ');
            } else {
                pages.push((name, contents));
            }
        }

        let set = TemplateSet::from_sources(&partials, pages)?;
        for required in REQUIRED_TEMPLATES {
            if !set.templates.contains_key(*required) {
                return Err(Error::Missing((*required).to_owned()));
            }
        }
        Ok(set)
    }

    /// Parses page templates from memory, each prefixed with `partials`.
    pub fn from_sources<I>(partials: &str, pages: I) -> Result<TemplateSet>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut templates = HashMap::new();
        for (name, source) in pages {
            let text = format!("{}{}", partials, source);
            let mut template = Template::default();
            template
                .parse(&text)
                .map_err(|err| Error::Parse {
                    name: name.clone(),
                    err: err.to_string(),
                })?;
            templates.insert(name, template);
        }
        Ok(TemplateSet { templates })
    }
}

impl Renderer for TemplateSet {
    fn render(&self, name: &str, context: &Value) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| Error::Missing(name.to_owned()))?;
        let render_err = |err: String| Error::Render {
            name: name.to_owned(),
            err,
        };
        let context =
            Context::from(context.clone()).map_err(|e| render_err(e.to_string()))?;
        let mut out: Vec<u8> = Vec::new();
        template
            .execute(&mut out, &context)
            .map_err(|e| render_err(e.to_string()))?;
        String::from_utf8(out).map_err(|e| render_err(e.to_string()))
    }
}

/// The result of a fallible template operation.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents an error loading or rendering templates.
#[derive(Debug)]
pub enum Error {
    /// Returned for I/O problems while reading template files.
    Io { path: PathBuf, err: std::io::Error },

    /// Returned for errors parsing a template file.
    Parse { name: String, err: String },

    /// Returned when a required or requested template doesn't exist.
    Missing(String),

    /// Returned for errors executing a template.
    Render { name: String, err: String },
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as presentable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io { path, err } => {
                write!(f, "reading template '{}': {}", path.display(), err)
            }
            Error::Parse { name, err } => {
                write!(f, "parsing template `{}`: {}", name, err)
            }
            Error::Missing(name) => write!(f, "missing template `{}`", name),
            Error::Render { name, err } => {
                write!(f, "rendering template `{}`: {}", name, err)
            }
        }
    }
}

impl std::error::Error for Error {
    /// Implements the [`std::error::Error`] trait for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Io { err, .. } => Some(err),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(pairs: &[(&str, Value)]) -> Value {
        Value::Object(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_owned(), v.clone()))
                .collect(),
        )
    }

    #[test]
    fn test_render() -> Result<()> {
        let set = TemplateSet::from_sources(
            "",
            vec![(
                "page.html".to_owned(),
                "<h1>{{.title}}</h1>{{range .items}}<li>{{.}}</li>{{end}}".to_owned(),
            )],
        )?;
        let context = object(&[
            ("title", Value::from("Hello")),
            (
                "items",
                Value::Array(vec![Value::from("a"), Value::from("b")]),
            ),
        ]);
        assert_eq!(
            set.render("page.html", &context)?,
            "<h1>Hello</h1><li>a</li><li>b</li>"
        );
        Ok(())
    }

    #[test]
    fn test_partials_are_shared() -> Result<()> {
        let set = TemplateSet::from_sources(
            r#"{{define "header"}}<header>{{.site_name}}</header>{{end}}"#,
            vec![(
                "page.html".to_owned(),
                r#"{{template "header" .}}<main></main>"#.to_owned(),
            )],
        )?;
        let context = object(&[("site_name", Value::from("Blog"))]);
        assert_eq!(
            set.render("page.html", &context)?,
            "<header>Blog</header><main></main>"
        );
        Ok(())
    }

    #[test]
    fn test_unknown_template() {
        let set = TemplateSet::from_sources("", Vec::new()).unwrap();
        assert!(matches!(
            set.render("nope.html", &Value::Nil),
            Err(Error::Missing(_))
        ));
    }

    #[test]
    fn test_load_requires_all_pages() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("post.html"), "{{.title}}").unwrap();
        assert!(matches!(
            TemplateSet::load(tmp.path()),
            Err(Error::Missing(_))
        ));
    }

    #[test]
    fn test_load_missing_directory() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            TemplateSet::load(&tmp.path().join("nope")),
            Err(Error::Io { .. })
        ));
    }
}
