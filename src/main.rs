mod config;
mod content;
mod dates;
mod feed;
mod images;
mod pipeline;
mod render;
mod tags;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};

use crate::config::Config;
use crate::dates::DateInference;

#[derive(Parser)]
#[command(
    name = "reflection_gen",
    about = "Generate yearly reflection pages from a blog XML export"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: extract, date, localize images, render
    Generate {
        /// Path to the blog XML export file
        xml_file: PathBuf,
        /// Output directory for the generated site
        #[arg(short, long, default_value = "reflection")]
        output_dir: PathBuf,
        /// Per-image download timeout in seconds
        #[arg(long, default_value = "30")]
        image_timeout: u64,
        /// Download attempts per image
        #[arg(long, default_value = "3")]
        image_retries: u32,
        /// Concurrent image downloads
        #[arg(long, default_value = "8")]
        image_concurrency: usize,
        /// Max preview length in characters
        #[arg(long, default_value = "200")]
        preview_length: usize,
    },
    /// Parse titles only and print the date-inference report
    Check {
        /// Path to the blog XML export file
        xml_file: PathBuf,
        /// Max failed titles to display
        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Generate {
            xml_file,
            output_dir,
            image_timeout,
            image_retries,
            image_concurrency,
            preview_length,
        } => {
            let mut config = Config::new(xml_file, output_dir);
            config.image_timeout = Duration::from_secs(image_timeout);
            config.image_retry_count = image_retries;
            config.image_concurrency = image_concurrency;
            config.max_preview_length = preview_length;

            println!("{}", "=".repeat(70));
            println!("  Yearly Reflection Generator");
            println!("{}\n", "=".repeat(70));

            let summary = pipeline::run(&config).await?;

            if !summary.years.is_empty() {
                println!();
                println!("{}", "=".repeat(70));
                println!("  OK - All Years Generated Successfully!");
                println!("{}\n", "=".repeat(70));
                println!("Reflection pages created in: {}", config.output_dir.display());
                println!("Open the index page:");
                println!("  {}", config.output_dir.join("index.html").display());
                println!(
                    "\nYears generated: {}",
                    summary
                        .years
                        .iter()
                        .map(|y| y.to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                );
            }
            Ok(())
        }
        Commands::Check { xml_file, limit } => check_dates(&xml_file, limit),
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

/// Dry run: extract posts and report date-inference results without
/// writing any output.
fn check_dates(xml_file: &PathBuf, limit: usize) -> anyhow::Result<()> {
    use anyhow::Context;

    let xml = std::fs::read_to_string(xml_file)
        .with_context(|| format!("Failed to read export file {}", xml_file.display()))?;
    let posts = feed::parse_export(&xml)?;

    let mut dates = DateInference::new();
    let mut parsed = 0usize;
    for post in &posts {
        if dates.infer(&post.title).is_some() {
            parsed += 1;
        }
    }

    println!("Posts:     {}", posts.len());
    println!("Parsed:    {}", parsed);
    println!("Failed:    {}", dates.failure_count());
    println!("Rate:      {:.1}%", dates.success_rate(posts.len()));

    let failed = dates.failed_titles();
    if !failed.is_empty() {
        println!("\nFailed titles:");
        for title in failed.iter().take(limit) {
            println!("  - {}", title);
        }
        if failed.len() > limit {
            println!("  ... and {} more", failed.len() - limit);
        }
    }

    Ok(())
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
