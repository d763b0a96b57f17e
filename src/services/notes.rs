//! Rendering of analyst notes.
//!
//! Notes are stored raw and rendered to sanitized HTML on the way out.

use pulldown_cmark::{Event, Options, Parser, Tag, html};

pub trait NoteRenderer: Send + Sync {
    fn render(&self, raw: &str) -> String;
}

/// Markdown to HTML with raw HTML escaped and script links removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct MarkdownRenderer;

fn is_safe_link(dest: &str) -> bool {
    let lowered = dest.trim().to_ascii_lowercase();
    !(lowered.starts_with("javascript:")
        || lowered.starts_with("vbscript:")
        || lowered.starts_with("data:"))
}

impl NoteRenderer for MarkdownRenderer {
    fn render(&self, raw: &str) -> String {
        let mut options = Options::empty();
        options.insert(Options::ENABLE_TABLES);
        options.insert(Options::ENABLE_STRIKETHROUGH);

        let events = Parser::new_ext(raw, options).map(|event| match event {
            Event::Html(text) | Event::InlineHtml(text) => Event::Text(text),
            Event::Start(Tag::Link {
                link_type,
                dest_url,
                title,
                id,
            }) if !is_safe_link(&dest_url) => Event::Start(Tag::Link {
                link_type,
                dest_url: "#".into(),
                title,
                id,
            }),
            Event::Start(Tag::Image {
                link_type,
                dest_url,
                title,
                id,
            }) if !is_safe_link(&dest_url) => Event::Start(Tag::Image {
                link_type,
                dest_url: "#".into(),
                title,
                id,
            }),
            other => other,
        });

        let mut out = String::with_capacity(raw.len() * 3 / 2);
        html::push_html(&mut out, events);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_renders_markdown() {
        let html = MarkdownRenderer.render("**admin** panel on `8443`");
        assert!(html.contains("<strong>admin</strong>"));
        assert!(html.contains("<code>8443</code>"));
    }

    #[test]
    fn test_escapes_raw_html() {
        let html = MarkdownRenderer.render("<script>alert(1)</script>");
        assert!(!html.contains("<script>"));
        assert!(html.contains("&lt;script&gt;"));

        let inline = MarkdownRenderer.render("hello <img src=x onerror=alert(1)> world");
        assert!(!inline.contains("<img"));
    }

    #[test]
    fn test_neutralizes_script_links() {
        let html = MarkdownRenderer.render("[click](javascript:alert(1))");
        assert!(!html.contains("javascript:"));
        assert!(html.contains("href=\"#\""));

        let ok = MarkdownRenderer.render("[site](https://example.com)");
        assert!(ok.contains("href=\"https://example.com\""));
    }

    #[test]
    fn test_empty_note() {
        assert_eq!(MarkdownRenderer.render(""), "");
    }
}
