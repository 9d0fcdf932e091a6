use std::path::PathBuf;
use std::time::Duration;

/// Run configuration, assembled in `main` from CLI arguments.
#[derive(Debug, Clone)]
pub struct Config {
    pub xml_file: PathBuf,
    pub output_dir: PathBuf,
    pub image_timeout: Duration,
    pub image_retry_count: u32,
    pub image_concurrency: usize,
    pub max_preview_length: usize,
}

impl Config {
    pub fn new(xml_file: PathBuf, output_dir: PathBuf) -> Self {
        Self {
            xml_file,
            output_dir,
            image_timeout: Duration::from_secs(30),
            image_retry_count: 3,
            image_concurrency: 8,
            max_preview_length: 200,
        }
    }
}
