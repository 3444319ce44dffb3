//! Allow-list HTML sanitizer. Markdown output (and any raw HTML the author
//! embedded in it) passes through [`sanitize`] before it is stored on a
//! [`crate::post::Post`]. Every element not in [`ALLOWED_ELEMENTS`] is
//! removed (its text content survives, except for raw-text elements such as
//! `<script>`, whose content is removed too), every attribute not in
//! [`ALLOWED_ATTRIBUTES`] is removed, and URL-bearing attributes must pass
//! [`is_safe_url`].

use lazy_static::lazy_static;
use regex::Regex;
use std::fmt;
use url::Url;

/// Elements that survive sanitization.
pub const ALLOWED_ELEMENTS: &[&str] = &[
    "p",
    "h1",
    "h2",
    "h3",
    "h4",
    "h5",
    "h6",
    "ul",
    "ol",
    "li",
    "a",
    "strong",
    "em",
    "code",
    "pre",
    "blockquote",
    "img",
    "br",
    "hr",
    "table",
    "thead",
    "tbody",
    "tr",
    "th",
    "td",
];

/// `(element, attribute)` pairs that survive sanitization.
pub const ALLOWED_ATTRIBUTES: &[(&str, &str)] = &[
    ("a", "href"),
    ("a", "title"),
    ("img", "src"),
    ("img", "alt"),
    ("img", "title"),
    ("code", "class"),
    ("pre", "class"),
];

/// URL schemes permitted in `href` and `src` attributes.
pub const ALLOWED_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Elements whose content is removed along with the element itself.
const RAW_TEXT_ELEMENTS: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "noscript", "template",
    "textarea", "title", "xmp", "noembed", "noframes",
];

/// Raw-text elements whose opener is escaped as text when it is never
/// closed. Any other unclosed raw-text element is an error.
const ESCAPABLE_RAW_TEXT_ELEMENTS: &[&str] = &["textarea", "title"];

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img"];

lazy_static! {
    static ref TAG_REGEX: Regex = Regex::new(
        r#"^<(/?)([A-Za-z][A-Za-z0-9-]*)((?:[^>"']|"[^"]*"|'[^']*')*)>"#
    )
    .unwrap();
    static ref ATTRIBUTE_REGEX: Regex = Regex::new(
        r#"([^\s"'>/=]+)(?:\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s"'=<>`]+)))?"#
    )
    .unwrap();
}

/// Decides whether `value` may appear in the attribute `attribute`. Only
/// `href` and `src` carry URLs; every other attribute is accepted here (the
/// allow-list decides whether it survives at all). A URL is safe when it
/// starts with `/` or `#`, when it is a relative reference with no scheme,
/// or when its scheme is one of [`ALLOWED_SCHEMES`].
pub fn is_safe_url(attribute: &str, value: &str) -> bool {
    if !matches!(attribute, "href" | "src") {
        return true;
    }
    let value = value.trim();
    if value.starts_with('/') || value.starts_with('#') {
        return true;
    }
    match Url::parse(value) {
        Ok(url) => ALLOWED_SCHEMES.contains(&url.scheme()),
        Err(url::ParseError::RelativeUrlWithoutBase) => true,
        Err(_) => false,
    }
}

/// Sanitizes an HTML fragment against the allow-list. Text outside of tags
/// is copied through unchanged, stray `<` characters are escaped, and
/// comments, doctypes, and processing instructions are dropped.
pub fn sanitize(html: &str) -> Result<String> {
    let mut out = String::with_capacity(html.len());
    let mut rest = html;

    while let Some(lt) = rest.find('<') {
        out.push_str(&rest[..lt]);
        rest = &rest[lt..];

        if rest.starts_with("<!--") {
            match rest[4..].find("-->") {
                Some(end) => rest = &rest[4 + end + 3..],
                None => return Err(Error::Unterminated("<!--".to_owned())),
            }
            continue;
        }

        if rest.starts_with("<!") || rest.starts_with("<?") {
            match rest.find('>') {
                Some(end) => rest = &rest[end + 1..],
                None => {
                    out.push_str("&lt;");
                    rest = &rest[1..];
                }
            }
            continue;
        }

        let captures = match TAG_REGEX.captures(rest) {
            Some(captures) => captures,
            None => {
                out.push_str("&lt;");
                rest = &rest[1..];
                continue;
            }
        };

        let whole = captures.get(0).map_or(1, |m| m.end());
        let closing = !captures[1].is_empty();
        let name = captures[2].to_ascii_lowercase();
        let attributes = captures.get(3).map_or("", |m| m.as_str());
        let opener = &rest[..whole];
        rest = &rest[whole..];

        if !closing && RAW_TEXT_ELEMENTS.contains(&name.as_str()) {
            match skip_raw_text(rest, &name) {
                Ok(after) => rest = after,
                Err(_) if ESCAPABLE_RAW_TEXT_ELEMENTS.contains(&name.as_str()) => {
                    out.push_str(&htmlescape::encode_minimal(opener));
                }
                Err(err) => return Err(err),
            }
            continue;
        }

        if !ALLOWED_ELEMENTS.contains(&name.as_str()) {
            continue;
        }

        let is_void = VOID_ELEMENTS.contains(&name.as_str());
        if closing {
            if !is_void {
                out.push_str("</");
                out.push_str(&name);
                out.push('>');
            }
            continue;
        }

        out.push('<');
        out.push_str(&name);
        push_attributes(&mut out, &name, attributes);
        out.push_str(if is_void { " />" } else { ">" });
    }

    out.push_str(rest);
    Ok(out)
}

// Returns the input that follows the closing tag of the raw-text element
// `name`. The element's content is discarded.
fn skip_raw_text<'a>(rest: &'a str, name: &str) -> Result<&'a str> {
    let lower = rest.to_ascii_lowercase();
    let needle = format!("</{}", name);
    let start = lower
        .find(&needle)
        .ok_or_else(|| Error::Unterminated(format!("<{}>", name)))?;
    match lower[start..].find('>') {
        Some(end) => Ok(&rest[start + end + 1..]),
        None => Err(Error::Unterminated(format!("<{}>", name))),
    }
}

fn push_attributes(out: &mut String, element: &str, attributes: &str) {
    let mut seen: Vec<String> = Vec::new();
    for captures in ATTRIBUTE_REGEX.captures_iter(attributes) {
        let name = captures[1].to_ascii_lowercase();
        if seen.contains(&name) {
            continue;
        }
        seen.push(name.clone());

        if !ALLOWED_ATTRIBUTES.contains(&(element, name.as_str())) {
            continue;
        }

        let raw = match captures
            .get(2)
            .or_else(|| captures.get(3))
            .or_else(|| captures.get(4))
        {
            Some(value) => value.as_str(),
            None => continue,
        };

        // The decoded value is both checked and emitted. Undecodable values
        // are emitted as literal text.
        let value = htmlescape::decode_html(raw).unwrap_or_else(|_| raw.to_owned());
        if !is_safe_url(&name, &value) {
            continue;
        }

        out.push(' ');
        out.push_str(&name);
        out.push_str("=\"");
        out.push_str(&htmlescape::encode_minimal(&value));
        out.push('"');
    }
}

/// The result of a sanitization.
pub type Result<T> = std::result::Result<T, Error>;

/// Represents markup the sanitizer refuses to interpret.
#[derive(Debug)]
pub enum Error {
    /// Returned when a comment or raw-text element (e.g. `<script>`) is
    /// never closed, which would otherwise swallow the rest of the document.
    Unterminated(String),
}

impl fmt::Display for Error {
    /// Displays an [`Error`] as human-readable text.
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Unterminated(what) => {
                write!(f, "unterminated `{}` in post body", what)
            }
        }
    }
}

impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keeps_allowed_markup() -> Result<()> {
        let html = "<h1>Hi</h1>\n<p>World <strong>bold</strong> <em>it</em></p>\n";
        assert_eq!(sanitize(html)?, html);
        Ok(())
    }

    #[test]
    fn test_strips_script_and_content() -> Result<()> {
        let html = "<p>a</p><script>alert('x')</script><p>b</p>";
        assert_eq!(sanitize(html)?, "<p>a</p><p>b</p>");

        let html = "<p>a<SCRIPT type=\"text/javascript\">alert(1)</SCRIPT>b</p>";
        assert_eq!(sanitize(html)?, "<p>ab</p>");
        Ok(())
    }

    #[test]
    fn test_unterminated_script_is_an_error() {
        assert!(sanitize("<p>x</p><script>alert(1)").is_err());
        assert!(sanitize("<!-- never closed").is_err());
    }

    #[test]
    fn test_unclosed_title_is_escaped() -> Result<()> {
        assert_eq!(
            sanitize("<p>the <title> element</p>")?,
            "<p>the &lt;title&gt; element</p>"
        );
        assert_eq!(
            sanitize("<p>a <TEXTAREA rows=\"2\"> b</p>")?,
            "<p>a &lt;TEXTAREA rows=&quot;2&quot;&gt; b</p>"
        );
        assert_eq!(sanitize("<title>x</title><p>y</p>")?, "<p>y</p>");
        Ok(())
    }

    #[test]
    fn test_strips_event_handlers() -> Result<()> {
        let html = r#"<a href="/x" onclick="steal()">x</a>"#;
        let out = sanitize(html)?;
        assert_eq!(out, r#"<a href="/x">x</a>"#);
        assert!(!out.contains("onclick"));
        Ok(())
    }

    #[test]
    fn test_drops_disallowed_elements_but_keeps_text() -> Result<()> {
        let html = r#"<div class="x"><span>hello</span> <del>gone</del></div>"#;
        assert_eq!(sanitize(html)?, "hello gone");
        Ok(())
    }

    #[test]
    fn test_rejects_unsafe_urls() -> Result<()> {
        assert_eq!(
            sanitize(r#"<a href="javascript:alert(1)">x</a>"#)?,
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<a href="jav&#x61;script:alert(1)">x</a>"#)?,
            "<a>x</a>"
        );
        assert_eq!(
            sanitize(r#"<img src="data:text/html;base64,AAAA" alt="a">"#)?,
            r#"<img alt="a" />"#
        );
        Ok(())
    }

    #[test]
    fn test_keeps_code_language_class() -> Result<()> {
        let html = "<pre><code class=\"language-rust\">fn main() {}\n</code></pre>\n";
        assert_eq!(sanitize(html)?, html);
        Ok(())
    }

    #[test]
    fn test_strips_table_alignment() -> Result<()> {
        let html = r#"<table><thead><tr><th style="text-align: left">a</th></tr></thead></table>"#;
        assert_eq!(
            sanitize(html)?,
            "<table><thead><tr><th>a</th></tr></thead></table>"
        );
        Ok(())
    }

    #[test]
    fn test_escapes_stray_angle_bracket() -> Result<()> {
        assert_eq!(sanitize("a < b")?, "a &lt; b");
        Ok(())
    }

    #[test]
    fn test_is_safe_url() {
        assert!(is_safe_url("href", "https://example.com/"));
        assert!(is_safe_url("href", "http://example.com/"));
        assert!(is_safe_url("href", "mailto:me@example.com"));
        assert!(is_safe_url("href", "/about.html"));
        assert!(is_safe_url("href", "#top"));
        assert!(is_safe_url("src", "images/cat.png"));
        assert!(!is_safe_url("href", "javascript:alert(1)"));
        assert!(!is_safe_url("href", " JavaScript:alert(1)"));
        assert!(!is_safe_url("src", "data:image/png;base64,AAAA"));
        assert!(!is_safe_url("href", "ftp://example.com/"));
        assert!(is_safe_url("title", "javascript:anything"));
    }
}
