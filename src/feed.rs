use std::collections::HashSet;
use std::sync::LazyLock;

use anyhow::Result;
use chrono::NaiveDate;
use quick_xml::events::Event;
use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::info;

static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src=["']([^"']*blogger\.googleusercontent\.com[^"']*)["']"#)
        .unwrap()
});
static LINK_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<a[^>]+href=["']([^"']*blogger\.googleusercontent\.com[^"']*)["']"#).unwrap()
});

/// A single blog post, created by the extractor and filled in by the
/// downstream stages (date, sanitized content, preview, local image paths).
#[derive(Debug, Clone)]
pub struct BlogPost {
    pub title: String,
    /// Raw ISO timestamp from the export, kept only as an id fallback.
    pub published: String,
    pub content_html: String,
    pub labels: Vec<String>,
    pub post_id: String,
    pub date: Option<NaiveDate>,
    pub image_urls: Vec<String>,
    pub has_images: bool,
    pub preview: String,
}

/// Extract all blog posts from an Atom-style export.
///
/// An `<entry>` is a post iff one of its `<category>` terms contains
/// `kind#post`; the remaining non-`kind#` terms are its labels.
pub fn parse_export(xml: &str) -> Result<Vec<BlogPost>> {
    let mut reader = quick_xml::Reader::from_str(xml);
    let mut posts = Vec::new();
    let mut entries = 0usize;
    let mut buf = Vec::new();

    let mut in_entry = false;
    let mut field: Option<Field> = None;
    let mut title = String::new();
    let mut published = String::new();
    let mut content = String::new();
    let mut terms: Vec<String> = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.name().as_ref() {
                b"entry" => {
                    in_entry = true;
                    entries += 1;
                    title.clear();
                    published.clear();
                    content.clear();
                    terms.clear();
                }
                b"title" if in_entry => field = Some(Field::Title),
                b"published" if in_entry => field = Some(Field::Published),
                b"content" if in_entry => field = Some(Field::Content),
                b"category" if in_entry => {
                    if let Some(term) = category_term(&e)? {
                        terms.push(term);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(e)) if in_entry && e.name().as_ref() == b"category" => {
                if let Some(term) = category_term(&e)? {
                    terms.push(term);
                }
            }
            Ok(Event::Text(e)) if in_entry && field.is_some() => {
                let text = e.unescape()?;
                match field {
                    Some(Field::Title) => title.push_str(&text),
                    Some(Field::Published) => published.push_str(&text),
                    Some(Field::Content) => content.push_str(&text),
                    None => {}
                }
            }
            Ok(Event::CData(e)) if in_entry && field == Some(Field::Content) => {
                content.push_str(&String::from_utf8_lossy(e.as_ref()));
            }
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"title" | b"published" | b"content" => field = None,
                b"entry" => {
                    in_entry = false;
                    if terms.iter().any(|t| t.contains("kind#post")) {
                        posts.push(build_post(&title, &published, &content, &terms));
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(e.into()),
            _ => {}
        }
        buf.clear();
    }

    info!("Found {} entries in export, {} are posts", entries, posts.len());
    Ok(posts)
}

fn category_term(e: &quick_xml::events::BytesStart) -> Result<Option<String>> {
    Ok(e.try_get_attribute("term")?
        .map(|attr| attr.unescape_value().map(|v| v.into_owned()))
        .transpose()?)
}

fn build_post(title: &str, published: &str, content: &str, terms: &[String]) -> BlogPost {
    let labels: Vec<String> = terms
        .iter()
        .filter(|t| !t.contains("kind#") && !t.is_empty())
        .cloned()
        .collect();

    let image_urls = extract_image_urls(content);

    BlogPost {
        title: if title.trim().is_empty() {
            "Untitled".to_string()
        } else {
            title.to_string()
        },
        published: published.to_string(),
        content_html: content.to_string(),
        labels,
        post_id: String::new(),
        date: None,
        has_images: !image_urls.is_empty(),
        image_urls,
        preview: String::new(),
    }
}

/// Hosted image URLs referenced by `<img src>` or `<a href>`, deduplicated
/// preserving first-seen order.
fn extract_image_urls(html: &str) -> Vec<String> {
    if html.is_empty() {
        return Vec::new();
    }

    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    for caps in IMG_SRC_RE
        .captures_iter(html)
        .chain(LINK_HREF_RE.captures_iter(html))
    {
        let url = caps[1].to_string();
        if seen.insert(url.clone()) {
            urls.push(url);
        }
    }
    urls
}

/// Assign deterministic identifiers: inferred date, else the date portion
/// of the raw timestamp, else a content hash. Collisions within the run
/// get a numeric suffix so every id stays unique.
pub fn assign_post_ids(posts: &mut [BlogPost]) {
    let mut seen: HashSet<String> = HashSet::new();
    for post in posts.iter_mut() {
        let base = if let Some(date) = post.date {
            format!("post-{}", date)
        } else if !post.published.is_empty() {
            let day = post.published.split('T').next().unwrap_or(&post.published);
            format!("post-{}", day)
        } else {
            format!("post-{}", short_hash(&post.content_html))
        };

        let mut id = base.clone();
        let mut n = 2;
        while !seen.insert(id.clone()) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        post.post_id = id;
    }
}

fn short_hash(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Field {
    Title,
    Published,
    Content,
}
