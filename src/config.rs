use anyhow::Result;
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::lifecycle::SignaturePolicy;
use crate::signature::pad::{DEFAULT_CANVAS_HEIGHT, DEFAULT_CANVAS_WIDTH, MAX_CANVAS_DIMENSION};
use crate::signature::Rgb;

/// Main configuration structure for haulsign
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct HaulsignConfig {
    /// Where documents are persisted
    pub store: StoreConfig,
    /// Signature canvas settings
    pub signature: SignatureConfig,
    /// Transition rules
    pub lifecycle: LifecycleConfig,
    /// Logging settings
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    Memory,
    Filesystem,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Storage backend
    pub backend: StoreBackend,
    /// Directory for the file system backend
    pub directory: PathBuf,
    /// Database URL (SQLite file path or connection string)
    pub database_url: String,
    /// Maximum connections in pool
    pub max_connections: u32,
    /// Enable automatic migrations
    pub auto_migrate: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Filesystem,
            directory: PathBuf::from(".haulsign/documents"),
            database_url: "sqlite://.haulsign/haulsign.db".to_string(),
            max_connections: 10,
            auto_migrate: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SignatureConfig {
    /// Canvas width in logical pixels
    pub canvas_width: u32,
    /// Canvas height in logical pixels
    pub canvas_height: u32,
    /// Ink colour as #RRGGBB
    pub ink_color: String,
}

impl Default for SignatureConfig {
    fn default() -> Self {
        Self {
            canvas_width: DEFAULT_CANVAS_WIDTH,
            canvas_height: DEFAULT_CANVAS_HEIGHT,
            ink_color: "#000000".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Signatures needed before a rate confirmation counts as signed
    pub signature_policy: SignaturePolicy,
    /// Refetch and retry once when a write loses a version race
    pub retry_on_conflict: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            signature_policy: SignaturePolicy::CarrierAuthoritative,
            retry_on_conflict: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level, used when RUST_LOG is not set
    pub log_level: String,
    /// Emit JSON lines instead of human readable logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl HaulsignConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Default values
    /// 2. Configuration files (haulsign.toml, .haulsign-rc)
    /// 3. Environment variables (HAULSIGN_STORE__BACKEND=sqlite)
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("."))
    }

    /// Same as [`HaulsignConfig::load`] with files looked up in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let mut builder = Config::builder();

        let toml_file = dir.join("haulsign.toml");
        if toml_file.exists() {
            builder = builder.add_source(File::from(toml_file));
        }

        let rc_file = dir.join(".haulsign-rc");
        if rc_file.exists() {
            builder = builder.add_source(File::from(rc_file).format(config::FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("HAULSIGN")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        let haulsign_config: HaulsignConfig = config.try_deserialize()?;
        haulsign_config.validate()?;
        Ok(haulsign_config)
    }

    /// Reject values that would only fail later, at signing time
    pub fn validate(&self) -> Result<()> {
        let signature = &self.signature;
        for (name, value) in [
            ("canvas_width", signature.canvas_width),
            ("canvas_height", signature.canvas_height),
        ] {
            if value == 0 || value > MAX_CANVAS_DIMENSION {
                anyhow::bail!(
                    "signature.{} must be between 1 and {}, got {}",
                    name,
                    MAX_CANVAS_DIMENSION,
                    value
                );
            }
        }
        signature
            .ink_color
            .parse::<Rgb>()
            .map_err(|e| anyhow::anyhow!("signature.ink_color: {}", e))?;
        Ok(())
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_content = toml::to_string_pretty(self)?;
        std::fs::write(path, toml_content)?;
        Ok(())
    }

    /// Load .env file if it exists
    pub fn load_env_file() -> Result<()> {
        if Path::new(".env").exists() {
            dotenvy::dotenv()?;
            tracing::info!("Loaded environment variables from .env file");
        }
        Ok(())
    }
}

/// Global configuration instance
static CONFIG: std::sync::LazyLock<Result<HaulsignConfig, anyhow::Error>> =
    std::sync::LazyLock::new(|| {
        // Load .env file first
        let _ = HaulsignConfig::load_env_file();
        HaulsignConfig::load()
    });

/// Get the global configuration
pub fn config() -> Result<&'static HaulsignConfig> {
    CONFIG
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
