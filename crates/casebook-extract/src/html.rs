//! Minimal HTML-to-text conversion
//!
//! Narrative clinical documents arrive as simple generated HTML; a small
//! state machine is enough. Script and style elements are dropped whole,
//! block-level tags become line breaks, the common entities are decoded,
//! and whitespace is folded.

/// Strip markup from an HTML document, returning readable plain text
pub fn strip_html(html: &str) -> String {
    let mut out = String::with_capacity(html.len() / 2);
    let mut chars = html.char_indices().peekable();
    let mut skip_until_close: Option<&'static str> = None;

    while let Some((idx, ch)) = chars.next() {
        if ch != '<' {
            if skip_until_close.is_none() {
                out.push(ch);
            }
            continue;
        }

        let rest = &html[idx..];
        let close = rest.find('>').map(|end| &rest[..=end]);
        let tag = match close {
            Some(tag) => tag,
            // Unterminated tag: drop the remainder
            None => break,
        };

        // Advance past the tag body
        for _ in 0..tag.chars().count().saturating_sub(1) {
            chars.next();
        }

        let name = tag_name(tag).to_ascii_lowercase();
        if let Some(waiting_for) = skip_until_close {
            if tag.starts_with("</") && name == waiting_for {
                skip_until_close = None;
            }
            continue;
        }

        match name.as_str() {
            "script" => skip_until_close = Some("script"),
            "style" => skip_until_close = Some("style"),
            "p" | "br" | "div" | "tr" | "li" | "h1" | "h2" | "h3" | "h4" | "table" => {
                out.push('\n')
            }
            "td" | "th" => out.push(' '),
            _ => {}
        }
    }

    fold_whitespace(&decode_entities(&out))
}

fn tag_name(tag: &str) -> &str {
    tag.trim_start_matches('<')
        .trim_start_matches('/')
        .trim_end_matches('>')
        .split(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .next()
        .unwrap_or("")
        .trim()
        .trim_end_matches('/')
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&apos;", "'")
        // &amp; last so it cannot re-introduce other entities
        .replace("&amp;", "&")
}

fn fold_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_simple_tags() {
        assert_eq!(strip_html("<p>Hello <b>world</b></p>"), "Hello world");
    }

    #[test]
    fn test_drops_script_and_style_bodies() {
        let html = "<style>body { color: red }</style><p>kept</p><script>var x = '<p>';</script>";
        assert_eq!(strip_html(html), "kept");
    }

    #[test]
    fn test_block_tags_become_line_breaks() {
        let html = "<div>first</div><div>second</div>";
        assert_eq!(strip_html(html), "first\nsecond");
    }

    #[test]
    fn test_entities_are_decoded() {
        assert_eq!(
            strip_html("dose &gt; 50&nbsp;Gy &amp; boost"),
            "dose > 50 Gy & boost"
        );
    }

    #[test]
    fn test_table_cells_are_separated() {
        let html = "<table><tr><td>dose</td><td>5400</td></tr></table>";
        assert_eq!(strip_html(html), "dose 5400");
    }

    #[test]
    fn test_unterminated_tag_truncates() {
        assert_eq!(strip_html("before <unclosed"), "before");
    }
}
