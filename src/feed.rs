//! Support for creating the RSS 2.0 feed from a list of posts.

use crate::config::Config;
use crate::post::Post;
use chrono::{DateTime, NaiveDate, Utc};
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::fmt;
use std::io::Cursor;

/// The maximum number of items in the feed.
pub const MAX_ITEMS: usize = 20;

const RFC822: &str = "%a, %d %b %Y %H:%M:%S +0000";

/// Renders the feed for `posts`, which must already be sorted newest first;
/// only the first [`MAX_ITEMS`] become items. `now` is the
/// `lastBuildDate`, the only part of the output that isn't a function of the
/// posts and the configuration.
pub fn render_rss(posts: &[Post], config: &Config, now: DateTime<Utc>) -> Result<String> {
    let mut writer = Writer::new_with_indent(Cursor::new(Vec::new()), b' ', 2);

    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    writer.write_event(Event::Start(rss))?;
    writer.write_event(Event::Start(BytesStart::new("channel")))?;

    push_text(&mut writer, "title", &config.site_name)?;
    push_text(&mut writer, "link", &config.base_url)?;
    push_text(&mut writer, "description", &config.site_description)?;
    push_text(&mut writer, "language", "en-us")?;
    push_text(&mut writer, "lastBuildDate", &now.format(RFC822).to_string())?;

    let feed_url = config.feed_url();
    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", feed_url.as_str()));
    self_link.push_attribute(("rel", "self"));
    self_link.push_attribute(("type", "application/rss+xml"));
    writer.write_event(Event::Empty(self_link))?;

    for post in posts.iter().take(MAX_ITEMS) {
        let link = format!("{}{}", config.base_url, post.path());
        writer.write_event(Event::Start(BytesStart::new("item")))?;
        push_text(&mut writer, "title", &post.title)?;
        push_text(&mut writer, "link", &link)?;
        push_text(&mut writer, "guid", &link)?;
        push_text(&mut writer, "pubDate", &rfc822_date(post.date))?;
        push_text(&mut writer, "description", &post.excerpt())?;
        writer.write_event(Event::End(BytesEnd::new("item")))?;
    }

    writer.write_event(Event::End(BytesEnd::new("channel")))?;
    writer.write_event(Event::End(BytesEnd::new("rss")))?;

    let mut xml = String::from_utf8(writer.into_inner().into_inner())?;
    xml.push('\n');
    Ok(xml)
}

/// Formats a date as an RFC 822 timestamp at midnight UTC.
pub fn rfc822_date(date: NaiveDate) -> String {
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.format(RFC822).to_string())
        .unwrap_or_default()
}

fn push_text(writer: &mut Writer<Cursor<Vec<u8>>>, tag: &str, text: &str) -> quick_xml::Result<()> {
    writer.write_event(Event::Start(BytesStart::new(tag)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(tag)))?;
    Ok(())
}

type Result<T> = std::result::Result<T, Error>;

/// Represents a problem creating a feed.
#[derive(Debug)]
pub enum Error {
    /// Returned when writing XML fails.
    Xml(quick_xml::Error),

    /// Returned when there is a generic I/O error.
    Io(std::io::Error),

    /// Returned when the written document isn't UTF-8.
    Utf8(std::string::FromUtf8Error),
}

impl fmt::Display for Error {
    /// Implements [`fmt::Display`] for [`Error`].
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Xml(err) => err.fmt(f),
            Error::Io(err) => err.fmt(f),
            Error::Utf8(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for Error {
    /// Implements [`std::error::Error`] for [`Error`].
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Xml(err) => Some(err),
            Error::Io(err) => Some(err),
            Error::Utf8(err) => Some(err),
        }
    }
}

impl From<quick_xml::Error> for Error {
    /// Converts [`quick_xml::Error`]s into [`Error`]. This allows us to use
    /// the `?` operator in fallible feed operations.
    fn from(err: quick_xml::Error) -> Error {
        Error::Xml(err)
    }
}

impl From<std::io::Error> for Error {
    /// Converts [`std::io::Error`]s into [`Error`]. This allows us to use the
    /// `?` operator in fallible feed operations.
    fn from(err: std::io::Error) -> Error {
        Error::Io(err)
    }
}

impl From<std::string::FromUtf8Error> for Error {
    fn from(err: std::string::FromUtf8Error) -> Error {
        Error::Utf8(err)
    }
}
