use std::collections::BTreeMap;
use std::fs;

use anyhow::{Context, Result};
use chrono::Datelike;
use rayon::prelude::*;
use tracing::{info, warn};

use crate::config::Config;
use crate::content;
use crate::dates::DateInference;
use crate::feed::{self, BlogPost};
use crate::images::ImageLocalizer;
use crate::render;
use crate::tags;

#[derive(Debug)]
pub struct RunSummary {
    pub total_posts: usize,
    pub dated_posts: usize,
    pub years: Vec<i32>,
}

/// Run the whole pipeline: extract, infer dates, group by year, clean
/// content, then render every year and the master index.
pub async fn run(config: &Config) -> Result<RunSummary> {
    // ── [1/6] Extract posts ──
    println!("[1/6] Parsing XML file: {}", config.xml_file.display());
    let xml = fs::read_to_string(&config.xml_file)
        .with_context(|| format!("Failed to read export file {}", config.xml_file.display()))?;
    let mut posts = feed::parse_export(&xml)?;
    let total_posts = posts.len();
    println!("      OK - Extracted {} posts", total_posts);

    // ── [2/6] Infer dates from titles ──
    println!("[2/6] Parsing dates from titles...");
    let mut dates = DateInference::new();
    for post in posts.iter_mut() {
        post.date = dates.infer(&post.title);
    }
    let dated_posts = posts.iter().filter(|p| p.date.is_some()).count();
    println!(
        "      OK - Successfully parsed {}/{} dates ({:.1}%)",
        dated_posts,
        total_posts,
        dates.success_rate(total_posts)
    );

    feed::assign_post_ids(&mut posts);

    // ── [3/6] Group by year ──
    println!("[3/6] Grouping posts by year...");
    let mut by_year: BTreeMap<i32, Vec<BlogPost>> = BTreeMap::new();
    for post in posts {
        match post.date {
            Some(date) => by_year.entry(date.year()).or_default().push(post),
            None => warn!("Skipping undated post: {}", post.title),
        }
    }
    let years: Vec<i32> = by_year.keys().copied().collect();
    println!(
        "      OK - Found {} years: {}",
        years.len(),
        years
            .iter()
            .map(|y| y.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    if years.is_empty() {
        println!("\nWARNING - No posts with valid dates found. Exiting.");
        return Ok(RunSummary {
            total_posts,
            dated_posts,
            years,
        });
    }

    // ── [4/6] Clean content, derive previews ──
    println!("[4/6] Processing content for all posts...");
    let preview_len = config.max_preview_length;
    for year_posts in by_year.values_mut() {
        year_posts.par_iter_mut().for_each(|post| {
            post.content_html = content::clean_html(&post.content_html);
            post.preview = content::extract_preview(&post.content_html, preview_len);
        });
    }
    println!("      OK - Cleaned HTML for {} posts", dated_posts);

    // ── [5/6] Per-year processing ──
    println!("[5/6] Processing each year...\n");
    for (year, year_posts) in by_year.iter_mut() {
        process_year(*year, year_posts, config, &dates).await?;
    }

    // ── [6/6] Master index ──
    println!("[6/6] Generating master index page...");
    render::html::generate_index_page(&config.output_dir, &years)?;
    println!("      OK - Generated index.html with {} years", years.len());

    Ok(RunSummary {
        total_posts,
        dated_posts,
        years,
    })
}

async fn process_year(
    year: i32,
    posts: &mut Vec<BlogPost>,
    config: &Config,
    dates: &DateInference,
) -> Result<()> {
    info!("Processing year {} ({} posts)", year, posts.len());
    println!("  === Processing {} ===", year);
    println!("      {} posts", posts.len());

    posts.sort_by_key(|p| p.date);

    let with_images = posts.iter().filter(|p| p.has_images).count();
    if with_images > 0 {
        println!("      Downloading images for {}...", year);
        let mut localizer = ImageLocalizer::new(config, year)?;
        localizer.process_posts(posts).await?;
        let report = localizer.report();
        println!("      OK - Downloaded {} images", report.downloaded);
        if report.failed > 0 {
            println!("      WARNING - {} images failed", report.failed);
            for url in &report.failed_urls {
                warn!("Image left un-localized: {}", url);
            }
        }
    } else {
        println!("      No images to download");
    }

    let index = tags::build_index(posts);
    println!("      Indexed {} tags", index.all_tags.len());

    render::json::generate(&config.output_dir, year, posts, &index)?;
    render::html::generate_reflection_page(&config.output_dir, year, posts, &index)?;
    render::report::generate(&config.output_dir, year, posts, &index, dates)?;
    println!("      OK - Generated report: generation_report.txt");

    println!("      OK - {} reflection complete\n", year);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const EXPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <published>2023-01-02T08:00:00.000Z</published>
    <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/blogger/2008/kind#post"/>
    <category term="Travel"/>
    <title type="text">Monday 2nd January, 2023</title>
    <content type="html">&lt;p&gt;Started the year with a walk.&lt;/p&gt;</content>
  </entry>
  <entry>
    <published>2023-08-15T08:00:00.000Z</published>
    <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/blogger/2008/kind#post"/>
    <category term="Family"/>
    <title type="text">Tuesday 15th August, 2023</title>
    <content type="html">&lt;p&gt;A long dinner.&lt;/p&gt;</content>
  </entry>
  <entry>
    <published>2021-05-01T08:00:00.000Z</published>
    <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/blogger/2008/kind#post"/>
    <title type="text">Saturday 1st May, 2021</title>
    <content type="html">&lt;p&gt;Older post.&lt;/p&gt;</content>
  </entry>
  <entry>
    <category scheme="http://schemas.google.com/g/2005#kind" term="http://schemas.google.com/blogger/2008/kind#post"/>
    <title type="text">completely dateless gibberish</title>
    <content type="html">&lt;p&gt;No date here.&lt;/p&gt;</content>
  </entry>
</feed>"#;

    #[tokio::test]
    async fn end_to_end_without_images() {
        let dir = tempfile::tempdir().unwrap();
        let xml_file = dir.path().join("export.xml");
        fs::write(&xml_file, EXPORT).unwrap();

        let config = Config::new(xml_file, dir.path().join("out"));
        let summary = run(&config).await.unwrap();

        assert_eq!(summary.total_posts, 4);
        assert_eq!(summary.dated_posts, 3);
        assert_eq!(summary.years, [2021, 2023]);

        let out = dir.path().join("out");
        assert!(out.join("index.html").exists());
        assert!(out.join("2023/reflection.html").exists());
        assert!(out.join("2023/data/posts.json").exists());
        assert!(out.join("2023/generation_report.txt").exists());
        assert!(out.join("2021/reflection.html").exists());

        let raw = fs::read_to_string(out.join("2023/data/posts.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["totalPosts"], 2);
        assert_eq!(value["posts"][0]["date"], "2023-01-02");
        assert_eq!(value["posts"][1]["date"], "2023-08-15");

        let report = fs::read_to_string(out.join("2023/generation_report.txt")).unwrap();
        assert!(report.contains("completely dateless gibberish"));
    }

    #[tokio::test]
    async fn missing_export_file_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::new(dir.path().join("nope.xml"), dir.path().join("out"));
        let err = run(&config).await.unwrap_err();
        assert!(err.to_string().contains("Failed to read export file"));
    }

    #[tokio::test]
    async fn zero_dated_posts_exits_gracefully() {
        let dir = tempfile::tempdir().unwrap();
        let xml_file = dir.path().join("export.xml");
        fs::write(
            &xml_file,
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns="http://www.w3.org/2005/Atom">
  <entry>
    <category term="http://schemas.google.com/blogger/2008/kind#post"/>
    <title type="text">nothing datelike</title>
    <content type="html">&lt;p&gt;x&lt;/p&gt;</content>
  </entry>
</feed>"#,
        )
        .unwrap();

        let config = Config::new(xml_file, dir.path().join("out"));
        let summary = run(&config).await.unwrap();
        assert_eq!(summary.total_posts, 1);
        assert_eq!(summary.dated_posts, 0);
        assert!(summary.years.is_empty());
        assert!(!dir.path().join("out/index.html").exists());
    }
}
