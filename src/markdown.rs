//! Markdown to HTML conversion. Fenced code blocks are part of CommonMark;
//! tables are enabled on top. Everything a post author writes goes through
//! [`to_safe_html`], which hands the rendered markup to
//! [`crate::sanitize::sanitize`].

use crate::sanitize;
use pulldown_cmark::{html, Options, Parser};

fn options() -> Options {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_TABLES);
    options
}

/// Converts markdown to HTML without sanitizing it. Raw HTML embedded in
/// the markdown is passed through untouched, so this is only for trusted,
/// site-owner content.
pub fn to_html(markdown: &str) -> String {
    let mut out = String::with_capacity(markdown.len() * 3 / 2);
    html::push_html(&mut out, Parser::new_ext(markdown, options()));
    out
}

/// Converts markdown to HTML and sanitizes the result against the
/// allow-list in [`crate::sanitize`].
pub fn to_safe_html(markdown: &str) -> sanitize::Result<String> {
    sanitize::sanitize(&to_html(markdown))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heading_and_paragraph() -> sanitize::Result<()> {
        let html = to_safe_html("# Hi\n\nWorld")?;
        assert_eq!(html, "<h1>Hi</h1>\n<p>World</p>\n");
        Ok(())
    }

    #[test]
    fn test_fenced_code_keeps_language_hint() -> sanitize::Result<()> {
        let html = to_safe_html("```rust\nlet x = 1 < 2;\n```\n")?;
        assert_eq!(
            html,
            "<pre><code class=\"language-rust\">let x = 1 &lt; 2;\n</code></pre>\n"
        );
        Ok(())
    }

    #[test]
    fn test_tables() -> sanitize::Result<()> {
        let html = to_safe_html("| a | b |\n|---|:-:|\n| 1 | 2 |\n")?;
        assert!(html.contains("<table>"));
        assert!(html.contains("<th>a</th>"));
        assert!(html.contains("<td>2</td>"));
        assert!(!html.contains("style"));
        Ok(())
    }

    #[test]
    fn test_embedded_html_is_sanitized() -> sanitize::Result<()> {
        let md = "Hello\n\n<script>alert(1)</script>\n\n<p onclick=\"x()\">there</p>\n";
        let html = to_safe_html(md)?;
        assert!(!html.contains("<script"));
        assert!(!html.contains("onclick"));
        assert!(html.contains("there"));
        Ok(())
    }

    #[test]
    fn test_markdown_javascript_link_loses_href() -> sanitize::Result<()> {
        let html = to_safe_html("[click](javascript:alert(1))")?;
        assert_eq!(html, "<p><a>click</a></p>\n");
        Ok(())
    }

    #[test]
    fn test_trusted_html_passes_through() {
        let html = to_html("<div class=\"bio\">me</div>\n");
        assert_eq!(html, "<div class=\"bio\">me</div>\n");
    }
}
