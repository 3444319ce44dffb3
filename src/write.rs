//! Lays out the site graph. Given the sorted, published posts, this module
//! decides which pages exist, where each one lives, and what data its
//! template receives. It builds [`Page`]s and does no I/O;
//! [`crate::build::Builder`] renders and writes them.
//!
//! The graph is made of:
//!
//! 1. one page per post (`{slug}.html`), linked to its newer and older
//!    neighbours
//! 2. the index, paginated into `index.html`, `page/2.html`, `page/3.html`...
//! 3. the archive (`archive.html`), grouped by year
//! 4. the tag index (`tags.html`) and one page per tag (`tag/{tag}.html`)
//! 5. the static pages: `about.html`, `404.html`, and the feed wrapper
//!    `rss.html`

use crate::config::Config;
use crate::feed::MAX_ITEMS;
use crate::post::Post;
use crate::tag::Tag;
use gtmpl::Value;
use std::collections::{BTreeMap, HashMap};

/// An output HTML file: which template renders it, where it goes, and the
/// data it's rendered with.
pub struct Page {
    /// The template name, e.g. `post.html`.
    pub template: &'static str,

    /// The output path relative to the output root.
    pub path: String,

    /// The template context, including the site block.
    pub context: Value,
}

/// Splits `items` into consecutive pages of `per_page` items. The last page
/// may be shorter; no items yields exactly one empty page.
pub fn paginate<T>(items: &[T], per_page: usize) -> Vec<&[T]> {
    if items.is_empty() {
        return vec![items];
    }
    items.chunks(per_page.max(1)).collect()
}

/// The output path of index page `number` (1-based).
pub fn index_page_path(number: usize) -> String {
    match number {
        0 | 1 => String::from("index.html"),
        n => format!("page/{}.html", n),
    }
}

/// Groups posts by the calendar year of their date, newest year first.
/// Within a year, posts keep their input order.
pub fn group_by_year(posts: &[Post]) -> Vec<(i32, Vec<&Post>)> {
    let mut years: BTreeMap<i32, Vec<&Post>> = BTreeMap::new();
    for post in posts {
        years.entry(post.year()).or_default().push(post);
    }
    years.into_iter().rev().collect()
}

/// Groups posts by tag, in tag-name order. A post with N tags appears in N
/// groups; within a group posts keep their input order.
pub fn group_by_tag(posts: &[Post]) -> Vec<(&Tag, Vec<&Post>)> {
    let mut tags: BTreeMap<&str, (&Tag, Vec<&Post>)> = BTreeMap::new();
    for post in posts {
        for tag in &post.tags {
            tags.entry(tag.name.as_str())
                .or_insert_with(|| (tag, Vec::new()))
                .1
                .push(post);
        }
    }
    tags.into_values().collect()
}

/// Builds [`Page`]s for a site.
pub struct SiteWriter<'a> {
    config: &'a Config,
}

impl<'a> SiteWriter<'a> {
    pub fn new(config: &'a Config) -> SiteWriter<'a> {
        SiteWriter { config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn post_value(&self, post: &Post) -> Value {
        post.to_value(&self.config.base_url)
    }

    fn post_values<'p>(&self, posts: impl IntoIterator<Item = &'p Post>) -> Value {
        Value::Array(posts.into_iter().map(|p| self.post_value(p)).collect())
    }

    /// Wraps page-specific fields together with the site block every
    /// template receives.
    fn context(&self, fields: Vec<(&str, Value)>) -> Value {
        let escape = |s: &str| Value::from(htmlescape::encode_minimal(s));
        let mut m: HashMap<String, Value> = HashMap::new();
        m.insert("site_name".to_owned(), escape(&self.config.site_name));
        m.insert(
            "site_description".to_owned(),
            escape(&self.config.site_description),
        );
        m.insert(
            "base_url".to_owned(),
            Value::from(self.config.base_url.clone()),
        );
        m.insert("author".to_owned(), escape(&self.config.author));
        m.insert(
            "twitter_handle".to_owned(),
            escape(&self.config.twitter_handle),
        );
        m.insert(
            "github_handle".to_owned(),
            escape(&self.config.github_handle),
        );
        m.insert("feed_url".to_owned(), Value::from(self.config.feed_url()));
        for (key, value) in fields {
            m.insert(key.to_owned(), value);
        }
        Value::Object(m)
    }

    /// The page for `posts[i]`. `newer` and `older` are its neighbours in
    /// the sorted listing, or nil at either end.
    pub fn post_page(&self, posts: &[Post], i: usize) -> Page {
        let post = &posts[i];
        let neighbour = |j: Option<usize>| match j.and_then(|j| posts.get(j)) {
            Some(p) => self.post_value(p),
            None => Value::Nil,
        };
        Page {
            template: "post.html",
            path: post.path(),
            context: self.context(vec![
                ("title", Value::from(htmlescape::encode_minimal(&post.title))),
                ("post", self.post_value(post)),
                ("newer", neighbour(i.checked_sub(1))),
                ("older", neighbour(Some(i + 1))),
            ]),
        }
    }

    /// The paginated index. Page 1 is `index.html`; page `n` is
    /// `page/{n}.html`.
    pub fn index_pages(&self, posts: &[Post]) -> Vec<Page> {
        let pages = paginate(posts, self.config.posts_per_page);
        let total = pages.len();
        pages
            .into_iter()
            .enumerate()
            .map(|(i, chunk)| {
                let number = i + 1;
                let link = |n: usize| {
                    if n >= 1 && n <= total {
                        Value::from(self.url(&index_page_path(n)))
                    } else {
                        Value::Nil
                    }
                };
                Page {
                    template: "index.html",
                    path: index_page_path(number),
                    context: self.context(vec![
                        ("title", Value::from(htmlescape::encode_minimal(&self.config.site_name))),
                        ("posts", self.post_values(chunk.iter())),
                        ("current_page", Value::from(number as i64)),
                        ("total_pages", Value::from(total as i64)),
                        ("has_prev", Value::from(number > 1)),
                        ("has_next", Value::from(number < total)),
                        ("prev_url", link(number - 1)),
                        ("next_url", link(number + 1)),
                    ]),
                }
            })
            .collect()
    }

    /// The archive page, years newest first.
    pub fn archive_page(&self, posts: &[Post]) -> Page {
        let years: Vec<Value> = group_by_year(posts)
            .into_iter()
            .map(|(year, posts)| {
                let mut m: HashMap<String, Value> = HashMap::new();
                m.insert("year".to_owned(), Value::from(year as i64));
                m.insert("count".to_owned(), Value::from(posts.len() as i64));
                m.insert("posts".to_owned(), self.post_values(posts));
                Value::Object(m)
            })
            .collect();
        Page {
            template: "archive.html",
            path: String::from("archive.html"),
            context: self.context(vec![
                ("title", Value::from("Archive")),
                ("years", Value::Array(years)),
            ]),
        }
    }

    /// The tag index (`tags.html`) followed by one page per tag.
    pub fn tag_pages(&self, groups: &[(&Tag, Vec<&Post>)]) -> Vec<Page> {
        let base_url = &self.config.base_url;
        let tag_value = |tag: &Tag, count: usize| {
            let mut value = tag.to_value(base_url);
            if let Value::Object(m) = &mut value {
                m.insert("count".to_owned(), Value::from(count as i64));
            }
            value
        };

        let mut pages = Vec::with_capacity(groups.len() + 1);
        pages.push(Page {
            template: "tags.html",
            path: String::from("tags.html"),
            context: self.context(vec![
                ("title", Value::from("Tags")),
                (
                    "tags",
                    Value::Array(
                        groups
                            .iter()
                            .map(|(tag, posts)| tag_value(tag, posts.len()))
                            .collect(),
                    ),
                ),
            ]),
        });

        for (tag, posts) in groups {
            pages.push(Page {
                template: "tag.html",
                path: tag.path(),
                context: self.context(vec![
                    ("title", Value::from(htmlescape::encode_minimal(&tag.name))),
                    ("tag", tag_value(tag, posts.len())),
                    ("posts", self.post_values(posts.iter().copied())),
                ]),
            });
        }
        pages
    }

    /// The about page. `content` is rendered HTML.
    pub fn about_page(&self, title: &str, content: &str) -> Page {
        Page {
            template: "about.html",
            path: String::from("about.html"),
            context: self.context(vec![
                ("title", Value::from(htmlescape::encode_minimal(title))),
                ("content", Value::from(content.to_owned())),
            ]),
        }
    }

    /// The 404 page.
    pub fn not_found_page(&self) -> Page {
        Page {
            template: "404.html",
            path: String::from("404.html"),
            context: self.context(vec![("title", Value::from("Page not found"))]),
        }
    }

    /// The human-readable wrapper around the feed, listing the same items.
    pub fn rss_page(&self, posts: &[Post]) -> Page {
        Page {
            template: "rss.html",
            path: String::from("rss.html"),
            context: self.context(vec![
                ("title", Value::from("RSS Feed")),
                ("posts", self.post_values(posts.iter().take(MAX_ITEMS))),
            ]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::tests::post;
    use std::path::Path;

    fn config(posts_per_page: usize) -> Config {
        Config::from_yaml(
            &format!(
                "content_dir: c\noutput_dir: o\nstatic_dir: s\ntemplates_dir: t\nsite_name: Blog\nbase_url: /\nposts_per_page: {}\n",
                posts_per_page
            ),
            Path::new("/"),
        )
        .unwrap()
    }

    fn field<'v>(value: &'v Value, key: &str) -> &'v Value {
        match value {
            Value::Object(m) => &m[key],
            _ => panic!("not an object"),
        }
    }

    fn len(value: &Value) -> usize {
        match value {
            Value::Array(items) => items.len(),
            _ => panic!("not an array"),
        }
    }

    #[test]
    fn test_paginate_law() {
        for n in 0..40usize {
            for p in 1..12usize {
                let items: Vec<usize> = (0..n).collect();
                let pages = paginate(&items, p);
                if n == 0 {
                    assert_eq!(pages.len(), 1);
                    assert!(pages[0].is_empty());
                } else {
                    assert_eq!(pages.len(), (n + p - 1) / p);
                    let last = pages[pages.len() - 1].len();
                    assert!(last >= 1 && last <= p);
                    let total: usize = pages.iter().map(|p| p.len()).sum();
                    assert_eq!(total, n);
                }
            }
        }
    }

    #[test]
    fn test_index_page_path() {
        assert_eq!(index_page_path(1), "index.html");
        assert_eq!(index_page_path(2), "page/2.html");
        assert_eq!(index_page_path(12), "page/12.html");
    }

    #[test]
    fn test_index_pages() {
        let posts: Vec<Post> = (0..25)
            .map(|i| post(&format!("p{}", i), "2024-01-01", &[]))
            .collect();
        let config = config(10);
        let pages = SiteWriter::new(&config).index_pages(&posts);

        let paths: Vec<&str> = pages.iter().map(|p| p.path.as_str()).collect();
        assert_eq!(paths, vec!["index.html", "page/2.html", "page/3.html"]);
        assert_eq!(len(field(&pages[2].context, "posts")), 5);

        let first = &pages[0].context;
        assert!(matches!(field(first, "has_prev"), Value::Bool(false)));
        assert!(matches!(field(first, "has_next"), Value::Bool(true)));
        assert!(matches!(field(first, "prev_url"), Value::Nil));
        assert!(matches!(field(first, "next_url"), Value::String(s) if s == "/page/2.html"));

        let second = &pages[1].context;
        assert!(matches!(field(second, "prev_url"), Value::String(s) if s == "/index.html"));

        let last = &pages[2].context;
        assert!(matches!(field(last, "has_next"), Value::Bool(false)));
        assert!(matches!(field(last, "next_url"), Value::Nil));
    }

    #[test]
    fn test_empty_index() {
        let config = config(10);
        let pages = SiteWriter::new(&config).index_pages(&[]);
        assert_eq!(pages.len(), 1);
        assert_eq!(pages[0].path, "index.html");
        assert_eq!(len(field(&pages[0].context, "posts")), 0);
        assert!(matches!(field(&pages[0].context, "has_next"), Value::Bool(false)));
    }

    #[test]
    fn test_group_by_year() {
        let posts = vec![
            post("c", "2024-03-01", &[]),
            post("b", "2024-01-01", &[]),
            post("a", "2022-06-01", &[]),
        ];
        let years = group_by_year(&posts);
        assert_eq!(years.len(), 2);
        assert_eq!(years[0].0, 2024);
        let slugs: Vec<&str> = years[0].1.iter().map(|p| p.slug.as_str()).collect();
        assert_eq!(slugs, vec!["c", "b"]);
        assert_eq!(years[1].0, 2022);
    }

    #[test]
    fn test_group_by_tag_round_trip() {
        let posts = vec![
            post("both", "2024-03-01", &["a", "b"]),
            post("only-a", "2024-02-01", &["a"]),
            post("none", "2024-01-01", &[]),
        ];
        let groups = group_by_tag(&posts);
        let names: Vec<&str> = groups.iter().map(|(t, _)| t.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);

        let count = |slug: &str| {
            groups
                .iter()
                .map(|(_, posts)| posts.iter().filter(|p| p.slug == slug).count())
                .collect::<Vec<_>>()
        };
        assert_eq!(count("both"), vec![1, 1]);
        assert_eq!(count("only-a"), vec![1, 0]);
        assert_eq!(count("none"), vec![0, 0]);
    }

    #[test]
    fn test_tag_pages() {
        let posts = vec![post("x", "2024-01-01", &["rust"])];
        let groups = group_by_tag(&posts);
        let config = config(10);
        let pages = SiteWriter::new(&config).tag_pages(&groups);
        assert_eq!(pages[0].path, "tags.html");
        assert_eq!(pages[1].path, "tag/rust.html");
        let tags = field(&pages[0].context, "tags");
        assert_eq!(len(tags), 1);
    }

    #[test]
    fn test_post_page_neighbours() {
        let posts = vec![post("new", "2024-02-01", &[]), post("old", "2024-01-01", &[])];
        let config = config(10);
        let writer = SiteWriter::new(&config);

        let page = writer.post_page(&posts, 0);
        assert_eq!(page.path, "new.html");
        assert!(matches!(field(&page.context, "newer"), Value::Nil));
        assert!(matches!(field(&page.context, "older"), Value::Object(_)));

        let page = writer.post_page(&posts, 1);
        assert!(matches!(field(&page.context, "newer"), Value::Object(_)));
        assert!(matches!(field(&page.context, "older"), Value::Nil));
    }

    #[test]
    fn test_site_block_is_escaped() {
        let mut config = config(10);
        config.site_name = "<b>Blog</b>".to_owned();
        let page = SiteWriter::new(&config).not_found_page();
        assert!(matches!(
            field(&page.context, "site_name"),
            Value::String(s) if s == "&lt;b&gt;Blog&lt;/b&gt;"
        ));
    }
}
