use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{Datelike, Local};
use serde::Serialize;
use tracing::info;

use crate::feed::BlogPost;
use crate::render::MONTH_NAMES;
use crate::tags::TagIndex;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct YearPayload<'a> {
    year: i32,
    total_posts: usize,
    posts_with_images: usize,
    total_tags: usize,
    posts: Vec<PostPayload<'a>>,
    tag_index: &'a TagIndex,
    month_summary: BTreeMap<u32, MonthSummary>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PostPayload<'a> {
    id: &'a str,
    date: String,
    title: &'a str,
    content: &'a str,
    preview: &'a str,
    labels: &'a [String],
    has_images: bool,
    month_index: u32,
    day_of_year: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct MonthSummary {
    name: &'static str,
    count: usize,
    has_images: usize,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Metadata {
    year: i32,
    generated_at: String,
    statistics: Statistics,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Statistics {
    total_posts: usize,
    posts_with_images: usize,
    total_tags: usize,
    total_images: usize,
}

/// Write `posts.json` and `metadata.json` for a year into
/// `<output>/<year>/data/`.
pub fn generate(
    output_dir: &Path,
    year: i32,
    posts: &[BlogPost],
    tag_index: &TagIndex,
) -> Result<()> {
    let data_dir = output_dir.join(year.to_string()).join("data");
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let posts_with_images = posts.iter().filter(|p| p.has_images).count();

    let payload = YearPayload {
        year,
        total_posts: posts.len(),
        posts_with_images,
        total_tags: tag_index.all_tags.len(),
        posts: posts.iter().map(post_payload).collect(),
        tag_index,
        month_summary: build_month_summary(posts),
    };

    let posts_file = data_dir.join("posts.json");
    fs::write(&posts_file, serde_json::to_string_pretty(&payload)?)
        .with_context(|| format!("Failed to write {}", posts_file.display()))?;
    info!("Generated posts.json: {}", posts_file.display());

    let metadata = Metadata {
        year,
        generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
        statistics: Statistics {
            total_posts: posts.len(),
            posts_with_images,
            total_tags: tag_index.all_tags.len(),
            total_images: posts.iter().map(|p| p.image_urls.len()).sum(),
        },
    };

    let metadata_file = data_dir.join("metadata.json");
    fs::write(&metadata_file, serde_json::to_string_pretty(&metadata)?)
        .with_context(|| format!("Failed to write {}", metadata_file.display()))?;
    info!("Generated metadata.json: {}", metadata_file.display());

    Ok(())
}

fn post_payload(post: &BlogPost) -> PostPayload<'_> {
    PostPayload {
        id: &post.post_id,
        date: post.date.map(|d| d.to_string()).unwrap_or_default(),
        title: &post.title,
        content: &post.content_html,
        preview: &post.preview,
        labels: &post.labels,
        has_images: post.has_images,
        month_index: post.date.map(|d| d.month0()).unwrap_or(0),
        day_of_year: post.date.map(|d| d.ordinal()).unwrap_or(0),
    }
}

/// Per-month post counts, all twelve months present even when empty.
fn build_month_summary(posts: &[BlogPost]) -> BTreeMap<u32, MonthSummary> {
    let mut summary: BTreeMap<u32, MonthSummary> = (0u32..12)
        .map(|i| {
            (
                i,
                MonthSummary {
                    name: MONTH_NAMES[i as usize],
                    count: 0,
                    has_images: 0,
                },
            )
        })
        .collect();

    for post in posts {
        if let Some(entry) = post.date.and_then(|d| summary.get_mut(&d.month0())) {
            entry.count += 1;
            if post.has_images {
                entry.has_images += 1;
            }
        }
    }

    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn post(id: &str, date: (i32, u32, u32), labels: &[&str], has_images: bool) -> BlogPost {
        BlogPost {
            title: format!("Post {}", id),
            published: String::new(),
            content_html: "<p>body</p>".to_string(),
            labels: labels.iter().map(|l| l.to_string()).collect(),
            post_id: id.to_string(),
            date: NaiveDate::from_ymd_opt(date.0, date.1, date.2),
            image_urls: if has_images {
                vec!["https://host/a.jpg".to_string()]
            } else {
                Vec::new()
            },
            has_images,
            preview: "body".to_string(),
        }
    }

    #[test]
    fn posts_json_has_expected_shape() {
        let dir = tempfile::tempdir().unwrap();
        let posts = [
            post("post-2023-01-02", (2023, 1, 2), &["travel"], true),
            post("post-2023-08-15", (2023, 8, 15), &["family"], false),
        ];
        let index = crate::tags::build_index(&posts);
        generate(dir.path(), 2023, &posts, &index).unwrap();

        let raw = fs::read_to_string(dir.path().join("2023/data/posts.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["year"], 2023);
        assert_eq!(value["totalPosts"], 2);
        assert_eq!(value["postsWithImages"], 1);
        assert_eq!(value["posts"][0]["id"], "post-2023-01-02");
        assert_eq!(value["posts"][0]["date"], "2023-01-02");
        assert_eq!(value["posts"][0]["hasImages"], true);
        assert_eq!(value["posts"][0]["monthIndex"], 0);
        assert_eq!(value["posts"][0]["dayOfYear"], 2);
        assert_eq!(value["posts"][1]["monthIndex"], 7);
        assert_eq!(value["tagIndex"]["allTags"][0], "family");
        assert_eq!(value["tagIndex"]["frequencies"]["travel"], 1);
    }

    #[test]
    fn month_summary_counts_posts_and_images() {
        let dir = tempfile::tempdir().unwrap();
        let posts = [
            post("a", (2023, 1, 2), &[], true),
            post("b", (2023, 1, 9), &[], false),
            post("c", (2023, 12, 25), &[], false),
        ];
        let index = crate::tags::build_index(&posts);
        generate(dir.path(), 2023, &posts, &index).unwrap();

        let raw = fs::read_to_string(dir.path().join("2023/data/posts.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();

        assert_eq!(value["monthSummary"]["0"]["count"], 2);
        assert_eq!(value["monthSummary"]["0"]["hasImages"], 1);
        assert_eq!(value["monthSummary"]["11"]["count"], 1);
        assert_eq!(value["monthSummary"]["5"]["count"], 0);
        assert_eq!(value["monthSummary"]["0"]["name"], "January");
    }

    #[test]
    fn metadata_includes_statistics() {
        let dir = tempfile::tempdir().unwrap();
        let posts = [post("a", (2023, 1, 2), &["travel"], true)];
        let index = crate::tags::build_index(&posts);
        generate(dir.path(), 2023, &posts, &index).unwrap();

        let raw = fs::read_to_string(dir.path().join("2023/data/metadata.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["year"], 2023);
        assert_eq!(value["statistics"]["totalPosts"], 1);
        assert_eq!(value["statistics"]["totalImages"], 1);
        assert!(value["generatedAt"].as_str().is_some());
    }
}
