use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use crate::dates::DateInference;
use crate::feed::BlogPost;
use crate::tags::{self, TagIndex};

const TOP_TAG_LIMIT: usize = 20;
const FAILED_TITLE_LIMIT: usize = 10;

/// Write the plain-text generation report for one year.
pub fn generate(
    output_dir: &Path,
    year: i32,
    posts: &[BlogPost],
    tag_index: &TagIndex,
    dates: &DateInference,
) -> Result<()> {
    let report_path = output_dir.join(year.to_string()).join("generation_report.txt");
    let report = build_report(year, posts, tag_index, dates);

    fs::write(&report_path, report)
        .with_context(|| format!("Failed to write {}", report_path.display()))?;
    info!("Report saved to: {}", report_path.display());
    Ok(())
}

fn build_report(year: i32, posts: &[BlogPost], tag_index: &TagIndex, dates: &DateInference) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "Yearly Reflection - Generation Report");
    let _ = writeln!(out, "{}\n", "=".repeat(60));
    let _ = writeln!(out, "Generated: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Year: {}\n", year);

    let _ = writeln!(out, "Statistics:");
    let _ = writeln!(out, "  Total Posts: {}", posts.len());
    let _ = writeln!(
        out,
        "  Posts with Images: {}",
        posts.iter().filter(|p| p.has_images).count()
    );
    let _ = writeln!(out, "  Total Tags: {}", tag_index.all_tags.len());
    let _ = writeln!(
        out,
        "  Total Images: {}\n",
        posts.iter().map(|p| p.image_urls.len()).sum::<usize>()
    );

    let _ = writeln!(out, "Top {} Tags:", TOP_TAG_LIMIT);
    for (i, (tag, count)) in tags::popular_tags(tag_index, TOP_TAG_LIMIT).iter().enumerate() {
        let _ = writeln!(out, "  {:2}. {:<30} {:>3}", i + 1, tag, count);
    }

    let failed = dates.failed_titles();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nDate Parsing Failures ({}):", failed.len());
        for title in failed.iter().take(FAILED_TITLE_LIMIT) {
            let _ = writeln!(out, "  - {}", title);
        }
        if failed.len() > FAILED_TITLE_LIMIT {
            let _ = writeln!(out, "  ... and {} more", failed.len() - FAILED_TITLE_LIMIT);
        }
    }

    out
}
