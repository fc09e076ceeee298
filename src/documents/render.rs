//! Stored bytes to displayable HTML.

use maud::html;
use pulldown_cmark::{html as md_html, Options, Parser};

use super::names::RenderMode;

pub fn render(raw: &str, mode: RenderMode) -> String {
    match mode {
        RenderMode::Markdown => markdown_to_html(raw),
        RenderMode::Plain => plain_to_html(raw),
    }
}

pub fn render_bytes(raw: &[u8], mode: RenderMode) -> String {
    render(&String::from_utf8_lossy(raw), mode)
}

fn markdown_to_html(markdown: &str) -> String {
    let mut options = Options::empty();
    options.insert(Options::ENABLE_STRIKETHROUGH);
    options.insert(Options::ENABLE_TABLES);
    options.insert(Options::ENABLE_FOOTNOTES);

    let parser = Parser::new_ext(markdown, options);
    let mut out = String::new();
    md_html::push_html(&mut out, parser);
    out
}

/// One `<p>` per line, no separator. Empty lines between text are kept as
/// `<p></p>`, trailing empty lines are dropped. `\r\n` from browser textareas
/// counts as a single break.
fn plain_to_html(text: &str) -> String {
    let mut lines: Vec<&str> = text.lines().collect();
    while lines.last().is_some_and(|l| l.is_empty()) {
        lines.pop();
    }
    html! {
        @for line in lines {
            p { (line) }
        }
    }
    .into_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markdown_heading() {
        let out = render("# Title", RenderMode::Markdown);
        assert!(out.contains("<h1>Title</h1>"), "got {out}");
    }

    #[test]
    fn markdown_emphasis_lists_and_code() {
        let out = render("*em* and `code`\n\n- one\n- two\n", RenderMode::Markdown);
        assert!(out.contains("<em>em</em>"));
        assert!(out.contains("<code>code</code>"));
        assert!(out.contains("<li>one</li>"));
    }

    #[test]
    fn plain_wraps_each_line() {
        assert_eq!(render("line1\nline2", RenderMode::Plain), "<p>line1</p><p>line2</p>");
    }

    #[test]
    fn plain_keeps_blank_lines_and_drops_nothing_for_empty_input() {
        assert_eq!(render("a\n\nb", RenderMode::Plain), "<p>a</p><p></p><p>b</p>");
        assert_eq!(render("", RenderMode::Plain), "");
        assert_eq!(render("a\r\nb\r\n", RenderMode::Plain), "<p>a</p><p>b</p>");
    }

    #[test]
    fn plain_drops_trailing_blank_lines() {
        assert_eq!(render("a\n\n", RenderMode::Plain), "<p>a</p>");
        assert_eq!(render("a\r\n\r\n\r\n", RenderMode::Plain), "<p>a</p>");
        assert_eq!(render("\n\n", RenderMode::Plain), "");
        assert_eq!(render("\na", RenderMode::Plain), "<p></p><p>a</p>");
    }

    #[test]
    fn plain_escapes_markup() {
        assert_eq!(render("<b>hi</b>", RenderMode::Plain), "<p>&lt;b&gt;hi&lt;/b&gt;</p>");
    }

    #[test]
    fn rendering_is_deterministic() {
        let raw = "# Notes\n\nSome *text*.\n";
        assert_eq!(render(raw, RenderMode::Markdown), render(raw, RenderMode::Markdown));
        assert_eq!(render(raw, RenderMode::Plain), render(raw, RenderMode::Plain));
    }
}
