use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{Datelike, NaiveDate};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::feed::BlogPost;

const MONTH_FOLDERS: [&str; 12] = [
    "jan", "feb", "mar", "apr", "may", "jun", "jul", "aug", "sep", "oct", "nov", "dec",
];
const BASE_BACKOFF_MS: u64 = 2000;

pub struct DownloadReport {
    pub downloaded: usize,
    pub failed: usize,
    pub failed_urls: Vec<String>,
}

/// Downloads a year's remote images into month folders and rewrites post
/// HTML to the local relative paths. Failed downloads keep the remote URL.
pub struct ImageLocalizer {
    client: Client,
    year: i32,
    images_dir: PathBuf,
    retry_count: u32,
    concurrency: usize,
    cache: HashMap<String, String>, // URL -> year-relative path
    failed: Vec<String>,
}

struct Target {
    absolute: PathBuf,
    relative: String,
}

impl ImageLocalizer {
    pub fn new(config: &Config, year: i32) -> Result<Self> {
        let images_dir = config
            .output_dir
            .join(year.to_string())
            .join("assets")
            .join("images");
        for folder in MONTH_FOLDERS {
            std::fs::create_dir_all(images_dir.join(folder))
                .with_context(|| format!("Failed to create {}", images_dir.display()))?;
        }

        let client = Client::builder()
            .timeout(config.image_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            year,
            images_dir,
            retry_count: config.image_retry_count,
            concurrency: config.image_concurrency,
            cache: HashMap::new(),
            failed: Vec::new(),
        })
    }

    /// Download every referenced image once, then rewrite post HTML.
    pub async fn process_posts(&mut self, posts: &mut [BlogPost]) -> Result<()> {
        let mut jobs: Vec<(String, NaiveDate)> = Vec::new();
        let mut seen = HashSet::new();
        for post in posts.iter() {
            if let Some(date) = post.date {
                for url in &post.image_urls {
                    if seen.insert(url.clone()) {
                        jobs.push((url.clone(), date));
                    }
                }
            }
        }
        if jobs.is_empty() {
            return Ok(());
        }

        info!("Downloading {} unique images for {}", jobs.len(), self.year);
        let pb = ProgressBar::new(jobs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40} {pos}/{len} ({per_sec}, eta {eta})")?
                .progress_chars("=> "),
        );

        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let (tx, mut rx) =
            tokio::sync::mpsc::channel::<(String, Option<String>)>(self.concurrency * 2);

        for (url, date) in jobs {
            let client = self.client.clone();
            let sem = Arc::clone(&semaphore);
            let tx = tx.clone();
            let target = self.local_target(&url, date);
            let retries = self.retry_count;

            tokio::spawn(async move {
                let _permit = sem.acquire().await.unwrap();
                let saved = download_with_retry(&client, &url, &target.absolute, retries).await;
                let _ = tx.send((url, saved.then_some(target.relative))).await;
            });
        }

        // Drop our copy of tx so rx closes when all tasks finish
        drop(tx);

        while let Some((url, local)) = rx.recv().await {
            match local {
                Some(relative) => {
                    self.cache.insert(url, relative);
                }
                None => self.failed.push(url),
            }
            pb.inc(1);
        }
        pb.finish_and_clear();

        for post in posts.iter_mut() {
            for url in &post.image_urls {
                if let Some(relative) = self.cache.get(url) {
                    post.content_html = post.content_html.replace(url, relative);
                } else {
                    warn!(
                        "Keeping original URL for failed download: {}",
                        truncate_url(url)
                    );
                }
            }
        }

        info!(
            "Downloaded {} unique images, {} failed",
            self.cache.len(),
            self.failed.len()
        );
        Ok(())
    }

    pub fn report(&self) -> DownloadReport {
        DownloadReport {
            downloaded: self.cache.len(),
            failed: self.failed.len(),
            failed_urls: self.failed.clone(),
        }
    }

    fn local_target(&self, url: &str, date: NaiveDate) -> Target {
        let folder = MONTH_FOLDERS[date.month0() as usize];
        let filename = image_filename(url, date);
        Target {
            absolute: self.images_dir.join(folder).join(&filename),
            relative: format!("assets/images/{}/{}", folder, filename),
        }
    }
}

async fn download_with_retry(client: &Client, url: &str, target: &Path, retries: u32) -> bool {
    if target.exists() {
        return true;
    }

    for attempt in 0..retries {
        match download_one(client, url, target).await {
            Ok(()) => return true,
            Err(e) => {
                if attempt + 1 < retries {
                    let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
                    debug!(
                        "Download failed for {} (attempt {}/{}), backing off {:.1}s: {}",
                        truncate_url(url),
                        attempt + 1,
                        retries,
                        backoff.as_secs_f64(),
                        e
                    );
                    tokio::time::sleep(backoff).await;
                } else {
                    warn!(
                        "Failed to download after {} attempts: {}",
                        retries,
                        truncate_url(url)
                    );
                }
            }
        }
    }
    false
}

async fn download_one(client: &Client, url: &str, target: &Path) -> Result<()> {
    let response = client.get(url).send().await?.error_for_status()?;

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    if !content_type.to_lowercase().contains("image") {
        warn!("URL does not appear to be an image: {}", content_type);
    }

    let bytes = response.bytes().await?;
    tokio::fs::write(target, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(())
}

/// `<iso date>_<8-hex url hash><ext>`, extension taken from the URL path
/// with the query stripped, `.jpg` when the path has none.
fn image_filename(url: &str, date: NaiveDate) -> String {
    let path = url.split('?').next().unwrap_or(url);
    let ext = Path::new(path)
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_else(|| ".jpg".to_string());
    format!("{}_{}{}", date, short_url_hash(url), ext)
}

fn short_url_hash(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    digest
        .iter()
        .take(4)
        .map(|b| format!("{:02x}", b))
        .collect()
}

fn truncate_url(url: &str) -> String {
    if url.chars().count() <= 80 {
        url.to_string()
    } else {
        let head: String = url.chars().take(80).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn filenames_are_deterministic() {
        let url = "https://blogger.googleusercontent.com/img/a/photo.png?imgmax=1600";
        let a = image_filename(url, date(2023, 12, 30));
        let b = image_filename(url, date(2023, 12, 30));
        assert_eq!(a, b);
        assert!(a.starts_with("2023-12-30_"));
        assert!(a.ends_with(".png"));
    }

    #[test]
    fn extension_defaults_to_jpg() {
        let name = image_filename(
            "https://blogger.googleusercontent.com/img/a/noext",
            date(2023, 1, 5),
        );
        assert!(name.ends_with(".jpg"));
    }

    #[test]
    fn query_does_not_leak_into_extension() {
        let name = image_filename(
            "https://blogger.googleusercontent.com/a.jpg?imgmax=800",
            date(2023, 1, 5),
        );
        assert!(name.ends_with(".jpg"));
        assert!(!name.contains("imgmax"));
    }

    #[test]
    fn different_urls_hash_differently() {
        let a = image_filename("https://host/a.jpg", date(2023, 1, 5));
        let b = image_filename("https://host/b.jpg", date(2023, 1, 5));
        assert_ne!(a, b);
    }

    #[test]
    fn month_folders_cover_the_year() {
        assert_eq!(MONTH_FOLDERS[date(2023, 1, 1).month0() as usize], "jan");
        assert_eq!(MONTH_FOLDERS[date(2023, 12, 31).month0() as usize], "dec");
    }
}
