//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use vgen_media::RenderConfig;
use vgen_timeline::DEFAULT_MAX_CHUNK_SIZE;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum concurrent jobs
    pub max_concurrent_jobs: usize,
    /// Per-job scratch directories are created here
    pub work_dir: PathBuf,
    /// Published videos
    pub output_dir: PathBuf,
    /// Template documents
    pub templates_dir: PathBuf,
    /// Base for relative template asset paths
    pub assets_dir: Option<PathBuf>,
    /// Job timeout
    pub job_timeout: Duration,
    /// Single FFmpeg run timeout
    pub ffmpeg_timeout: Duration,
    /// Graceful shutdown timeout
    pub shutdown_timeout: Duration,
    /// Caption chunk size in characters
    pub max_caption_chars: usize,
    /// Background clip download timeout
    pub fetch_timeout: Duration,
    /// Retries for external collaborator calls
    pub collaborator_retries: u32,
    /// Fixed seed for procedural scripts; random when unset
    pub script_seed: Option<u64>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: PathBuf::from("/tmp/vgen"),
            output_dir: PathBuf::from("./output"),
            templates_dir: PathBuf::from("templates"),
            assets_dir: None,
            job_timeout: Duration::from_secs(3600), // 1 hour
            ffmpeg_timeout: Duration::from_secs(1800),
            shutdown_timeout: Duration::from_secs(30),
            max_caption_chars: DEFAULT_MAX_CHUNK_SIZE,
            fetch_timeout: Duration::from_secs(60),
            collaborator_retries: 2,
            script_seed: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: env_or("VGEN_MAX_JOBS", defaults.max_concurrent_jobs).max(1),
            work_dir: env_or("VGEN_WORK_DIR", defaults.work_dir),
            output_dir: env_or("VGEN_OUTPUT_DIR", defaults.output_dir),
            templates_dir: env_or("VGEN_TEMPLATES_DIR", defaults.templates_dir),
            assets_dir: env_parse("VGEN_ASSETS_DIR"),
            job_timeout: Duration::from_secs(env_or("VGEN_JOB_TIMEOUT", 3600)),
            ffmpeg_timeout: Duration::from_secs(env_or("VGEN_FFMPEG_TIMEOUT", 1800)),
            shutdown_timeout: Duration::from_secs(env_or("VGEN_SHUTDOWN_TIMEOUT", 30)),
            max_caption_chars: env_or("VGEN_MAX_CAPTION_CHARS", defaults.max_caption_chars).max(1),
            fetch_timeout: Duration::from_secs(env_or("VGEN_FETCH_TIMEOUT", 60)),
            collaborator_retries: env_or(
                "VGEN_COLLABORATOR_RETRIES",
                defaults.collaborator_retries,
            ),
            script_seed: env_parse("VGEN_SCRIPT_SEED"),
        }
    }

    /// Render settings derived from this config.
    pub fn render_config(&self) -> RenderConfig {
        RenderConfig::default().with_ffmpeg_timeout(self.ffmpeg_timeout.as_secs())
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| s.trim().parse().ok())
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env_parse(key).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_concurrent_jobs, 2);
        assert_eq!(config.max_caption_chars, 15);
        assert_eq!(config.job_timeout, Duration::from_secs(3600));
        assert_eq!(config.render_config().ffmpeg_timeout_secs, 1800);
    }

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("VGEN_MAX_CAPTION_CHARS", "20");
        std::env::set_var("VGEN_SCRIPT_SEED", "42");
        std::env::set_var("VGEN_FETCH_TIMEOUT", "not a number");

        let config = WorkerConfig::from_env();
        assert_eq!(config.max_caption_chars, 20);
        assert_eq!(config.script_seed, Some(42));
        assert_eq!(config.fetch_timeout, Duration::from_secs(60));

        std::env::remove_var("VGEN_MAX_CAPTION_CHARS");
        std::env::remove_var("VGEN_SCRIPT_SEED");
        std::env::remove_var("VGEN_FETCH_TIMEOUT");
    }
}
