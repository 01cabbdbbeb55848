//! Post-conversion cleanup pipeline for Markdown output.
//!
//! Each cleanup pass is a function `&str -> String` applied in sequence.
//! Passes that rewrite prose leave fenced code untouched.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Run the full cleanup pipeline on raw Markdown text.
pub(crate) fn run_pipeline(md: &str, base_url: Option<&Url>) -> String {
    let mut result = md.to_string();

    result = normalize_headings(&result);
    result = clean_blank_lines(&result);
    result = strip_leftover_html(&result);
    result = resolve_links(&result, base_url);
    result = normalize_whitespace(&result);
    result = ensure_trailing_newline(&result);

    result
}

/// Split `md` into lines, flagging the ones that belong to fenced code.
///
/// Fence lines count as code. A fence closes only on a line of at least as
/// many backticks as opened it, so longer fences can wrap code that itself
/// contains fences. Fences inside blockquotes are recognised through their
/// `>` prefix.
fn fenced_lines(md: &str) -> Vec<(&str, bool)> {
    let mut lines = Vec::new();
    let mut open_fence: Option<usize> = None;

    for line in md.lines() {
        let ticks = fence_width(line);
        match (open_fence, ticks) {
            (None, Some(width)) => {
                open_fence = Some(width);
                lines.push((line, true));
            }
            (Some(open), Some(width))
                if width >= open && fence_body(line).trim_end().len() == width =>
            {
                open_fence = None;
                lines.push((line, true));
            }
            (Some(_), _) => lines.push((line, true)),
            (None, None) => lines.push((line, false)),
        }
    }

    lines
}

/// Apply `f` to every line outside fenced code blocks.
fn map_prose_lines(md: &str, mut f: impl FnMut(&str) -> String) -> String {
    fenced_lines(md)
        .into_iter()
        .map(|(line, code)| if code { line.to_string() } else { f(line) })
        .collect::<Vec<_>>()
        .join("\n")
}

/// `line` without its indentation and blockquote markers.
fn fence_body(line: &str) -> &str {
    line.trim_start_matches(|c: char| c == '>' || c.is_whitespace())
}

/// Number of leading backticks if `line` is a code fence.
fn fence_width(line: &str) -> Option<usize> {
    let width = fence_body(line).chars().take_while(|&c| c == '`').count();
    (width >= 3).then_some(width)
}

// ---------------------------------------------------------------------------
// Pass 1: Normalize heading levels
// ---------------------------------------------------------------------------

/// Ensure there's at most one H1.
fn normalize_headings(md: &str) -> String {
    static H_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"^(#{1,6})\s+(.+)$").expect("valid regex"));

    let mut h1_count = 0;
    map_prose_lines(md, |line| {
        if let Some(caps) = H_RE.captures(line) {
            if &caps[1] == "#" {
                h1_count += 1;
                if h1_count > 1 {
                    return format!("## {}", &caps[2]);
                }
            }
        }
        line.to_string()
    })
}

// ---------------------------------------------------------------------------
// Pass 2: Clean up excessive blank lines
// ---------------------------------------------------------------------------

/// Collapse runs of 3+ blank lines into exactly 2. Blank lines inside
/// fenced code are kept.
fn clean_blank_lines(md: &str) -> String {
    let mut lines = Vec::new();
    let mut blank_run = 0;

    for (line, code) in fenced_lines(md) {
        if !code && line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 2 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        lines.push(line);
    }

    lines.join("\n")
}

// ---------------------------------------------------------------------------
// Pass 3: Strip leftover HTML tags
// ---------------------------------------------------------------------------

/// Remove stray HTML tags that survived the conversion.
///
/// `<br>` is kept since table cells rely on it. Inner text is preserved.
fn strip_leftover_html(md: &str) -> String {
    map_prose_lines(md, strip_html_tags)
}

/// Strip HTML tags from a single line, preserving inner text.
fn strip_html_tags(line: &str) -> String {
    static ANCHOR_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r#"<a\s+(?:name|id)="[^"]*"\s*>\s*</a>"#).expect("valid regex")
    });
    static HTML_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(r"</?(?:div|span|font|section|article|aside|header|footer|figure|figcaption|details|summary|u|mark)(?:\s[^>]*)?>")
            .expect("valid regex")
    });

    let without_anchors = ANCHOR_RE.replace_all(line, "");
    HTML_TAG_RE.replace_all(&without_anchors, "").to_string()
}

// ---------------------------------------------------------------------------
// Pass 4: Resolve relative links
// ---------------------------------------------------------------------------

/// Resolve relative URLs in Markdown links against a base URL.
fn resolve_links(md: &str, base_url: Option<&Url>) -> String {
    let Some(base) = base_url else {
        return md.to_string();
    };

    static LINK_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(!?)\[([^\]]*)\]\(([^)\s]+)\)").expect("valid regex"));

    map_prose_lines(md, |line| {
        LINK_RE
            .replace_all(line, |caps: &regex::Captures| {
                let bang = &caps[1];
                let text = &caps[2];
                let href = &caps[3];

                if !bang.is_empty() || is_absolute(href) {
                    return caps[0].to_string();
                }

                match base.join(href) {
                    Ok(resolved) => format!("[{text}]({resolved})"),
                    Err(_) => caps[0].to_string(),
                }
            })
            .to_string()
    })
}

fn is_absolute(href: &str) -> bool {
    href.starts_with("http://")
        || href.starts_with("https://")
        || href.starts_with('#')
        || href.starts_with("mailto:")
        || href.starts_with("data:")
}

// ---------------------------------------------------------------------------
// Pass 5: Normalize whitespace
// ---------------------------------------------------------------------------

/// Trim trailing whitespace on every line outside fenced code.
fn normalize_whitespace(md: &str) -> String {
    map_prose_lines(md, |line| line.trim_end().to_string())
}

// ---------------------------------------------------------------------------
// Pass 6: Ensure trailing newline
// ---------------------------------------------------------------------------

/// Ensure the file ends with exactly one newline.
fn ensure_trailing_newline(md: &str) -> String {
    let trimmed = md.trim_end_matches('\n');
    format!("{trimmed}\n")
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_headings_demotes_duplicate_h1() {
        let input = "# Title\n\nSome text\n\n# Another Title\n\nMore text";
        let result = normalize_headings(input);
        assert_eq!(
            result,
            "# Title\n\nSome text\n\n## Another Title\n\nMore text"
        );
    }

    #[test]
    fn normalize_headings_ignores_code_comments() {
        let input = "# Title\n\n```bash\n# install\nmake\n```";
        assert_eq!(normalize_headings(input), input);
    }

    #[test]
    fn clean_blank_lines_collapses_excess() {
        let input = "Line 1\n\n\n\n\nLine 2";
        let result = clean_blank_lines(input);
        assert_eq!(result, "Line 1\n\n\nLine 2");
    }

    #[test]
    fn clean_blank_lines_keeps_double() {
        let input = "Line 1\n\nLine 2";
        assert_eq!(clean_blank_lines(input), input);
    }

    #[test]
    fn strip_leftover_html_removes_wrappers_and_anchors() {
        let input = "<a name=\"Xk2p\"></a>## Setup\n\n<span style=\"color:red\">Important</span>";
        let result = strip_leftover_html(input);
        assert_eq!(result, "## Setup\n\nImportant");
    }

    #[test]
    fn strip_leftover_html_preserves_code_blocks() {
        let input = "# Title\n\n```html\n<div>Preserved</div>\n```\n\n<div>Gone</div>";
        let result = strip_leftover_html(input);
        assert!(result.contains("<div>Preserved</div>"));
        assert!(result.ends_with("\nGone"));
    }

    #[test]
    fn longer_fences_wrap_inner_fences() {
        let input = "````md\n```\n<div>kept</div>\n```\n````\n<div>x</div>";
        let result = strip_leftover_html(input);
        assert!(result.contains("<div>kept</div>"));
        assert!(result.ends_with("\nx"));
    }

    #[test]
    fn resolve_links_relative_resolved() {
        let base = Url::parse("https://www.yuque.com/alice/notes/intro").unwrap();
        let input = "[Next](/alice/notes/setup) and [Abs](https://other.com/page)";
        assert_eq!(
            resolve_links(input, Some(&base)),
            "[Next](https://www.yuque.com/alice/notes/setup) and [Abs](https://other.com/page)"
        );
    }

    #[test]
    fn resolve_links_leaves_images_and_anchors() {
        let base = Url::parse("https://docs.example.com/page").unwrap();
        let input = "![img](a.png) [Section](#section-1)";
        assert_eq!(resolve_links(input, Some(&base)), input);
    }

    #[test]
    fn normalize_whitespace_trims_trailing() {
        let input = "Line 1   \nLine 2\t\nLine 3";
        assert_eq!(normalize_whitespace(input), "Line 1\nLine 2\nLine 3");
    }

    #[test]
    fn code_keeps_trailing_whitespace_and_blank_runs() {
        let input = "Intro   \n\n```\none  \n\n\n\ntwo\t\n```\n\n\n\n\nEnd";
        let result = normalize_whitespace(&clean_blank_lines(input));
        assert_eq!(result, "Intro\n\n```\none  \n\n\n\ntwo\t\n```\n\n\nEnd");
    }

    #[test]
    fn quoted_fences_are_code() {
        let input = "> ```\n> <div>kept</div>\n> ```\n<div>x</div>";
        let result = strip_leftover_html(input);
        assert!(result.contains("> <div>kept</div>"));
        assert!(result.ends_with("\nx"));
    }

    #[test]
    fn ensure_trailing_newline_normalizes_multiple() {
        assert_eq!(ensure_trailing_newline("Content"), "Content\n");
        assert_eq!(ensure_trailing_newline("Content\n\n\n"), "Content\n");
    }

    #[test]
    fn full_pipeline_cleans_markdown() {
        let input = "# Title\n\n\n\n\n\n## Section\n\n<div>Some content</div>   \n\n```python\nprint('hi')\n```\n\nEnd";
        let base = Url::parse("https://example.com/page").unwrap();
        let result = run_pipeline(input, Some(&base));

        assert!(!result.contains("\n\n\n\n"));
        assert!(!result.contains("<div>"));
        assert!(result.contains("Some content\n"));
        assert!(result.contains("```python\nprint('hi')\n```"));
        assert!(result.ends_with("End\n"));
    }
}
