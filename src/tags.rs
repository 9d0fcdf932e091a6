use std::collections::BTreeMap;

use serde::Serialize;
use tracing::info;

use crate::feed::BlogPost;

/// Inverted tag index over a set of posts. Keys are normalized tags
/// (lowercased, trimmed); `all_tags` is always the sorted key set, and a
/// tag's frequency always equals the length of its post-id list.
#[derive(Debug, Default, Serialize)]
pub struct TagIndex {
    #[serde(rename = "tags")]
    pub tag_to_posts: BTreeMap<String, Vec<String>>,
    pub frequencies: BTreeMap<String, usize>,
    #[serde(rename = "allTags")]
    pub all_tags: Vec<String>,
}

pub fn build_index(posts: &[BlogPost]) -> TagIndex {
    let mut tag_to_posts: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut frequencies: BTreeMap<String, usize> = BTreeMap::new();

    for post in posts {
        for label in &post.labels {
            let normalized = label.trim().to_lowercase();
            if normalized.is_empty() {
                continue;
            }
            tag_to_posts
                .entry(normalized.clone())
                .or_default()
                .push(post.post_id.clone());
            *frequencies.entry(normalized).or_insert(0) += 1;
        }
    }

    let all_tags: Vec<String> = tag_to_posts.keys().cloned().collect();
    info!("Indexed {} unique tags", all_tags.len());

    TagIndex {
        tag_to_posts,
        frequencies,
        all_tags,
    }
}

/// Most frequent tags first; ties break alphabetically.
pub fn popular_tags(index: &TagIndex, limit: usize) -> Vec<(String, usize)> {
    let mut tags: Vec<(String, usize)> = index
        .frequencies
        .iter()
        .map(|(tag, count)| (tag.clone(), *count))
        .collect();
    tags.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    tags.truncate(limit);
    tags
}
