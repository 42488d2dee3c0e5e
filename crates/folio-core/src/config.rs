use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{FolioError, FolioResult};

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// JSON snapshot file. `None` keeps everything in memory.
    pub data_file: Option<PathBuf>,
    /// Insert the sample projects when the store starts empty.
    pub seed_sample_data: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: None,
            seed_sample_data: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Maximum number of simultaneously live rendering contexts.
    pub capacity: usize,
    /// Contexts unused for longer than this are released by the sweep.
    pub idle_timeout_ms: f64,
    /// How often the idle sweep runs.
    pub sweep_interval_ms: f64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            capacity: 1,
            idle_timeout_ms: 30_000.0,
            sweep_interval_ms: 30_000.0,
        }
    }
}

/// Frame rate and particle budget for one quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct TierSettings {
    pub fps: f64,
    pub particles: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct TierTable {
    pub low: TierSettings,
    pub medium: TierSettings,
    pub high: TierSettings,
}

impl Default for TierTable {
    fn default() -> Self {
        Self {
            low: TierSettings {
                fps: 15.0,
                particles: 500,
            },
            medium: TierSettings {
                fps: 30.0,
                particles: 800,
            },
            high: TierSettings {
                fps: 60.0,
                particles: 1200,
            },
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// A sample whose gap since the previous one exceeds this is slow.
    pub slow_frame_ms: f64,
    /// Consecutive slow samples tolerated before the tier drops.
    pub slow_frame_limit: u32,
    /// Forced pause after a tier drop.
    pub recovery_pause_ms: f64,
    /// Time out of view before the animation tears itself down.
    pub visibility_grace_ms: f64,
    /// Fraction of the remaining pointer distance covered per frame.
    pub pointer_smoothing: f64,
    /// Seed for the particle layout.
    pub seed: u64,
    #[serde(default)]
    pub tiers: TierTable,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            slow_frame_ms: 200.0,
            slow_frame_limit: 3,
            recovery_pause_ms: 100.0,
            visibility_grace_ms: 3_000.0,
            pointer_smoothing: 0.05,
            seed: 0x5eed,
            tiers: TierTable::default(),
        }
    }
}

/// Source for the repository list served at `/api/github`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GithubConfig {
    pub api_url: String,
    /// Personal access token; lists the token owner's repositories.
    pub token: Option<String>,
    /// Account whose public repositories are listed when there is no token.
    pub user: Option<String>,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.github.com".to_string(),
            token: None,
            user: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct FolioConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub pool: PoolConfig,
    #[serde(default)]
    pub animation: AnimationConfig,
    #[serde(default)]
    pub github: GithubConfig,
}

impl FolioConfig {
    pub fn load_from_file(path: &Path) -> FolioResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: FolioConfig =
            toml::from_str(&contents).map_err(|e| FolioError::config(e.to_string(), path))?;
        config.validate().map_err(|msg| FolioError::config(msg, path))?;
        Ok(config)
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    pub fn load_or_default(path: &Path) -> FolioResult<Self> {
        if path.exists() {
            Self::load_from_file(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn save_to_file(&self, path: &Path) -> FolioResult<()> {
        let contents =
            toml::to_string_pretty(self).map_err(|e| FolioError::config(e.to_string(), path))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), String> {
        if self.pool.capacity == 0 {
            return Err("pool.capacity must be at least 1".into());
        }
        for (name, tier) in [
            ("low", self.animation.tiers.low),
            ("medium", self.animation.tiers.medium),
            ("high", self.animation.tiers.high),
        ] {
            if tier.fps <= 0.0 {
                return Err(format!("animation.tiers.{name}.fps must be positive"));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FolioConfig::default();
        assert_eq!(config.pool.capacity, 1);
        assert_eq!(config.animation.slow_frame_limit, 3);
        assert_eq!(config.animation.tiers.medium.fps, 30.0);
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let config: FolioConfig = toml::from_str(
            r#"
            [pool]
            capacity = 3
            idle_timeout_ms = 5000.0
            sweep_interval_ms = 1000.0
            "#,
        )
        .unwrap();
        assert_eq!(config.pool.capacity, 3);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.animation.tiers.low.particles, 500);
    }

    #[test]
    fn test_github_section() {
        let config: FolioConfig = toml::from_str(
            r#"
            [github]
            user = "ada"
            "#,
        )
        .unwrap();
        assert_eq!(config.github.user.as_deref(), Some("ada"));
        assert_eq!(config.github.token, None);
        assert_eq!(config.github.api_url, "https://api.github.com");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.config.toml");
        let mut config = FolioConfig::default();
        config.server.port = 8080;
        config.save_to_file(&path).unwrap();

        let loaded = FolioConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.server.port, 8080);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.config.toml");
        let mut config = FolioConfig::default();
        config.pool.capacity = 0;
        config.save_to_file(&path).unwrap();

        let err = FolioConfig::load_from_file(&path).unwrap_err();
        assert!(err.to_string().contains("capacity"));
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = FolioConfig::load_or_default(Path::new("/nonexistent/folio.toml")).unwrap();
        assert_eq!(config.pool.capacity, 1);
    }
}
