//! HTML handling for fetched pages: detection, meta-refresh redirects and a
//! Markdown-flavoured text rendering.

use scraper::{ElementRef, Html, Selector};

/// Whether a response should be treated as HTML.
pub fn is_html(content_type: Option<&str>, body: &str) -> bool {
    if let Some(content_type) = content_type {
        let content_type = content_type.to_ascii_lowercase();
        if content_type.contains("html") {
            return true;
        }
        if content_type.starts_with("text/plain") || content_type.contains("markdown") {
            return false;
        }
    }
    let head: String = body
        .trim_start()
        .chars()
        .take(15)
        .collect::<String>()
        .to_ascii_lowercase();
    head.starts_with("<!doctype html") || head.starts_with("<html")
}

/// Extracts the target of a `<meta http-equiv="refresh" content="0; url=...">`
/// tag, if the page has one.
pub fn meta_refresh_target(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("meta[http-equiv]").ok()?;

    document
        .select(&selector)
        .filter(|meta| {
            meta.value()
                .attr("http-equiv")
                .is_some_and(|value| value.eq_ignore_ascii_case("refresh"))
        })
        .filter_map(|meta| meta.value().attr("content"))
        .find_map(|content| {
            content.split(';').skip(1).find_map(|part| {
                let part = part.trim();
                let (key, value) = part.split_once('=')?;
                if !key.trim().eq_ignore_ascii_case("url") {
                    return None;
                }
                let value = value.trim().trim_matches(['"', '\'']);
                (!value.is_empty()).then(|| value.to_string())
            })
        })
}

/// Renders an HTML document as Markdown-flavoured text.
pub fn html_to_markdown(html: &str) -> String {
    let document = Html::parse_document(html);
    let root = Selector::parse("body")
        .ok()
        .and_then(|selector| document.select(&selector).next())
        .unwrap_or_else(|| document.root_element());

    let mut out = String::new();
    render(root, &mut out);
    tidy(&out)
}

fn render(element: ElementRef, out: &mut String) {
    for child in element.children() {
        if let Some(text) = child.value().as_text() {
            push_text(out, text);
            continue;
        }
        let Some(el) = ElementRef::wrap(child) else {
            continue;
        };

        match el.value().name() {
            "script" | "style" | "noscript" | "head" | "template" => {}
            tag @ ("h1" | "h2" | "h3" | "h4" | "h5" | "h6") => {
                let level = tag[1..].parse::<usize>().unwrap_or(1);
                out.push_str("\n\n");
                out.push_str(&"#".repeat(level));
                out.push(' ');
                out.push_str(&collapse_whitespace(&el.text().collect::<String>()));
                out.push_str("\n\n");
            }
            "p" | "div" | "section" | "article" | "header" | "footer" | "main" | "nav"
            | "aside" | "table" | "ul" | "ol" | "dl" | "blockquote" | "figure" => {
                out.push_str("\n\n");
                render(el, out);
                out.push_str("\n\n");
            }
            "tr" | "dt" | "dd" => {
                out.push('\n');
                render(el, out);
                out.push('\n');
            }
            "br" => out.push('\n'),
            "hr" => out.push_str("\n\n---\n\n"),
            "li" => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
                out.push_str("- ");
                render(el, out);
                out.push('\n');
            }
            "pre" => {
                let code = el.text().collect::<String>();
                out.push_str("\n\n```\n");
                out.push_str(code.trim_end_matches('\n'));
                out.push_str("\n```\n\n");
            }
            "code" => {
                out.push('`');
                out.push_str(&el.text().collect::<String>());
                out.push('`');
            }
            "a" => {
                let text = collapse_whitespace(&el.text().collect::<String>());
                match el.value().attr("href") {
                    Some(href) if !text.is_empty() => {
                        out.push_str(&format!("[{text}]({href})"));
                    }
                    _ => out.push_str(&text),
                }
            }
            "strong" | "b" => wrap_inline(el, out, "**"),
            "em" | "i" => wrap_inline(el, out, "*"),
            _ => render(el, out),
        }
    }
}

fn wrap_inline(el: ElementRef, out: &mut String, marker: &str) {
    let text = collapse_whitespace(&el.text().collect::<String>());
    if text.is_empty() {
        return;
    }
    out.push_str(marker);
    out.push_str(&text);
    out.push_str(marker);
}

fn push_text(out: &mut String, text: &str) {
    let collapsed = collapse_whitespace(text);
    if collapsed.is_empty() {
        if !text.is_empty() && !out.ends_with(char::is_whitespace) {
            out.push(' ');
        }
        return;
    }
    if text.starts_with(char::is_whitespace) && !out.ends_with(char::is_whitespace) {
        out.push(' ');
    }
    out.push_str(&collapsed);
    if text.ends_with(char::is_whitespace) {
        out.push(' ');
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

// Trims lines and squeezes blank runs, leaving fenced blocks untouched.
fn tidy(raw: &str) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut in_fence = false;

    for line in raw.lines() {
        if line.trim() == "```" {
            in_fence = !in_fence;
            lines.push("```");
            continue;
        }
        if in_fence {
            lines.push(line);
            continue;
        }
        let line = line.trim();
        if line.is_empty() && lines.last().is_none_or(|last| last.is_empty()) {
            continue;
        }
        lines.push(line);
    }

    while lines.last().is_some_and(|last| last.is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}
