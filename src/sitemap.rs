//! The `sitemap.xml` emitter.

use crate::config::Config;
use crate::post::Post;
use crate::tag::Tag;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Cursor;

pub use crate::feed::Error;

const SITEMAP_NAMESPACE: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Renders the sitemap: the index, archive, and tags pages, then one entry
/// per post and one per tag page. Locations are `base_url` followed by the
/// page path.
pub fn render_sitemap(posts: &[Post], tags: &[&Tag], config: &Config) -> Result<String, Error> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut urlset = BytesStart::new("urlset");
    urlset.push_attribute(("xmlns", SITEMAP_NAMESPACE));
    writer.write_event(Event::Start(urlset))?;

    let base = config.base_url.as_str();
    push_url(&mut writer, base, "index.html", "daily", "1.0")?;
    push_url(&mut writer, base, "archive.html", "weekly", "0.8")?;
    push_url(&mut writer, base, "tags.html", "weekly", "0.7")?;
    for post in posts {
        push_url(&mut writer, base, &post.path(), "monthly", "0.9")?;
    }
    for tag in tags {
        push_url(&mut writer, base, &tag.path(), "weekly", "0.6")?;
    }

    writer.write_event(Event::End(BytesEnd::new("urlset")))?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
    xml.push('\n');
    Ok(xml)
}

fn push_url(
    writer: &mut Writer<Cursor<Vec<u8>>>,
    base_url: &str,
    path: &str,
    changefreq: &str,
    priority: &str,
) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new("url")))?;
    for (tag, text) in [
        ("loc", format!("{}{}", base_url, path)),
        ("changefreq", changefreq.to_owned()),
        ("priority", priority.to_owned()),
    ] {
        writer.write_event(Event::Start(BytesStart::new(tag)))?;
        writer.write_event(Event::Text(BytesText::new(&text)))?;
        writer.write_event(Event::End(BytesEnd::new(tag)))?;
    }
    writer.write_event(Event::End(BytesEnd::new("url")))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::post::tests::post;
    use std::path::Path;

    #[test]
    fn test_entries() -> Result<(), Error> {
        let config = Config::from_yaml(
            "content_dir: c\noutput_dir: o\nstatic_dir: s\ntemplates_dir: t\nsite_name: x\nbase_url: https://example.com/blog/\n",
            Path::new("/"),
        )
        .unwrap();
        let posts = vec![post("hello", "2024-01-15", &["rust"])];
        let rust = Tag::parse("rust").unwrap();

        let xml = render_sitemap(&posts, &[&rust], &config)?;

        assert!(xml.contains(SITEMAP_NAMESPACE));
        assert_eq!(xml.matches("<url>").count(), 5);
        assert!(xml.contains("<loc>https://example.com/blog/index.html</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/archive.html</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/tags.html</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/hello.html</loc>"));
        assert!(xml.contains("<loc>https://example.com/blog/tag/rust.html</loc>"));

        let post_entry = xml.find("hello.html").unwrap();
        assert!(xml[post_entry..].contains("<priority>0.9</priority>"));
        assert_eq!(xml.matches("<priority>1.0</priority>").count(), 1);
        assert_eq!(xml.matches("<changefreq>weekly</changefreq>").count(), 3);
        Ok(())
    }

    #[test]
    fn test_no_trailing_slash_normalization() -> Result<(), Error> {
        let config = Config::from_yaml(
            "content_dir: c\noutput_dir: o\nstatic_dir: s\ntemplates_dir: t\nsite_name: x\nbase_url: https://example.com\n",
            Path::new("/"),
        )
        .unwrap();
        let xml = render_sitemap(&[], &[], &config)?;
        assert!(xml.contains("<loc>https://example.comindex.html</loc>"));
        Ok(())
    }
}
