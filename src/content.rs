use std::sync::LazyLock;

use regex::{Captures, Regex};
use scraper::Html;

static SCRIPT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<script\b[^>]*>.*?</script>").unwrap());
static IFRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<iframe\b[^>]*>.*?</iframe>").unwrap());
static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<([a-zA-Z][a-zA-Z0-9]*)([^>]*)>").unwrap());
static TARGET_REL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s+(?:target|rel)\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap()
});
static STYLE_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s+style\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());
static LOADING_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s+loading\s*=\s*("[^"]*"|'[^']*'|[^\s>]+)"#).unwrap());
static CLASS_ATTR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)\s(class\s*=\s*)(?:"([^"]*)"|'([^']*)')"#).unwrap());
static IMGMAX_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[?&]imgmax=\d+").unwrap());
static WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Clean export artifacts out of post HTML: drop scripts and iframes, make
/// links open in a new tab, lazy-load images, strip inline styles from
/// everything except images, and remove `imgmax` URL parameters.
pub fn clean_html(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }

    let html = SCRIPT_RE.replace_all(html, "");
    let html = IFRAME_RE.replace_all(&html, "");
    let html = TAG_RE.replace_all(&html, |caps: &Captures| rewrite_tag(&caps[1], &caps[2]));
    IMGMAX_RE.replace_all(&html, "").into_owned()
}

fn rewrite_tag(name: &str, attrs: &str) -> String {
    match name.to_ascii_lowercase().as_str() {
        "a" => {
            let kept = TARGET_REL_RE.replace_all(attrs, "");
            format!(
                r#"<a{} target="_blank" rel="noopener noreferrer">"#,
                kept.trim_end()
            )
        }
        "img" => rewrite_img(attrs),
        _ => format!("<{}{}>", name, STYLE_ATTR_RE.replace_all(attrs, "")),
    }
}

fn rewrite_img(attrs: &str) -> String {
    let (attrs, self_closing) = match attrs.trim_end().strip_suffix('/') {
        Some(rest) => (rest.trim_end().to_string(), true),
        None => (attrs.to_string(), false),
    };

    let kept = LOADING_ATTR_RE.replace_all(&attrs, "");
    let with_class = if CLASS_ATTR_RE.is_match(&kept) {
        CLASS_ATTR_RE
            .replace(&kept, |caps: &Captures| {
                let existing = caps
                    .get(2)
                    .or_else(|| caps.get(3))
                    .map(|m| m.as_str())
                    .unwrap_or("");
                format!(r#" {}"{} post-image""#, &caps[1], existing)
            })
            .into_owned()
    } else {
        format!(r#"{} class="post-image""#, kept.trim_end())
    };

    let close = if self_closing { " />" } else { ">" };
    format!(r#"<img{} loading="lazy"{}"#, with_class.trim_end(), close)
}

/// Plain-text preview, whitespace collapsed, truncated at a word boundary.
pub fn extract_preview(html: &str, max_length: usize) -> String {
    if html.is_empty() {
        return String::new();
    }

    let fragment = Html::parse_fragment(html);
    let text = fragment
        .root_element()
        .text()
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    let text = WS_RE.replace_all(&text, " ").trim().to_string();

    if text.chars().count() <= max_length {
        return text;
    }
    let truncated: String = text.chars().take(max_length).collect();
    let head = match truncated.rsplit_once(' ') {
        Some((head, _)) => head,
        None => truncated.as_str(),
    };
    format!("{}...", head)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripts_and_iframes_are_removed() {
        let html = r#"<p>hello</p><script type="text/javascript">alert(1)</script><iframe src="https://tracker.example"></iframe><p>world</p>"#;
        let cleaned = clean_html(html);
        assert!(!cleaned.contains("script"));
        assert!(!cleaned.contains("iframe"));
        assert!(cleaned.contains("<p>hello</p>"));
        assert!(cleaned.contains("<p>world</p>"));
    }

    #[test]
    fn anchors_open_in_new_tab() {
        let cleaned = clean_html(r#"<a href="https://example.com">link</a>"#);
        assert_eq!(
            cleaned,
            r#"<a href="https://example.com" target="_blank" rel="noopener noreferrer">link</a>"#
        );
    }

    #[test]
    fn existing_anchor_target_is_replaced() {
        let cleaned = clean_html(r#"<a target="_self" href="/x">link</a>"#);
        assert_eq!(
            cleaned,
            r#"<a href="/x" target="_blank" rel="noopener noreferrer">link</a>"#
        );
    }

    #[test]
    fn images_get_lazy_loading_and_class() {
        let cleaned = clean_html(r#"<img src="a.jpg" />"#);
        assert_eq!(
            cleaned,
            r#"<img src="a.jpg" class="post-image" loading="lazy" />"#
        );
    }

    #[test]
    fn existing_image_class_is_merged() {
        let cleaned = clean_html(r#"<img class="wide" src="a.jpg">"#);
        assert_eq!(
            cleaned,
            r#"<img class="wide post-image" src="a.jpg" loading="lazy">"#
        );
    }

    #[test]
    fn inline_styles_stripped_except_on_images() {
        let cleaned = clean_html(r#"<div style="color:red"><img src="a.jpg" style="width:50%"></div>"#);
        assert!(cleaned.starts_with("<div>"));
        assert!(cleaned.contains(r#"style="width:50%""#));
    }

    #[test]
    fn imgmax_parameters_are_removed() {
        let cleaned = clean_html(
            r#"<img src="https://blogger.googleusercontent.com/a.jpg?imgmax=800">"#,
        );
        assert!(!cleaned.contains("imgmax"));
        assert!(cleaned.contains("a.jpg"));
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_html(""), "");
        assert_eq!(extract_preview("", 200), "");
    }

    #[test]
    fn preview_strips_markup_and_collapses_whitespace() {
        let preview = extract_preview("<p>First   line</p>\n<p>second line</p>", 200);
        assert_eq!(preview, "First line second line");
    }

    #[test]
    fn preview_truncates_at_word_boundary() {
        let preview = extract_preview("<p>one two three four five</p>", 12);
        assert_eq!(preview, "one two...");
    }

    #[test]
    fn short_preview_has_no_ellipsis() {
        let preview = extract_preview("<p>short</p>", 200);
        assert_eq!(preview, "short");
    }
}
