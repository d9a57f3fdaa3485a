//! 命令行配置
//!
//! 发现顺序：环境变量 `SURVEYCAD_CONFIG`，否则 `./config/default.toml`，都不存在时使用内建默认值。
//! 命令行参数覆盖配置文件。

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use surveycad_core::crs::CoordinateSystem;
use surveycad_file::ValidationOptions;
use thiserror::Error;

/// 配置文件路径环境变量
pub const CONFIG_ENV: &str = "SURVEYCAD_CONFIG";

/// 应用配置的根结构。
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub validation: ValidationOptions,
    #[serde(default)]
    pub project: ProjectConfig,
    #[serde(default)]
    pub standards: StandardsConfig,
}

impl AppConfig {
    /// 从显式路径加载配置。
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// 自动发现配置文件。
    pub fn discover() -> Result<Self, ConfigError> {
        if let Some(path) = env::var_os(CONFIG_ENV) {
            return Self::from_file(PathBuf::from(path));
        }

        let default_path = env::current_dir()
            .map(|dir| dir.join("config").join("default.toml"))
            .map_err(|source| ConfigError::Context {
                message: "failed to read current directory".to_string(),
                source,
            })?;

        if default_path.exists() {
            Self::from_file(default_path)
        } else {
            Ok(Self::default())
        }
    }
}

/// 日志配置，`RUST_LOG` 优先。
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
        }
    }
}

/// 项目默认值
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// 项目 ID
    #[serde(default)]
    pub id: Option<String>,
    /// 项目坐标系，如 `LOCAL`、`EPSG:2226`
    #[serde(default = "ProjectConfig::default_crs")]
    pub crs: String,
    /// 存储快照路径
    #[serde(default)]
    pub store: Option<PathBuf>,
}

impl ProjectConfig {
    fn default_crs() -> String {
        CoordinateSystem::Local.to_string()
    }
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            id: None,
            crs: Self::default_crs(),
            store: None,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StandardsConfig {
    /// 图层标准文件（TOML 或 JSON）
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("{message}: {source}")]
    Context {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.logging.level, "info");
        assert_eq!(config.validation, ValidationOptions::default());
        assert_eq!(config.project.crs, "LOCAL");
        assert!(config.standards.path.is_none());
    }

    #[test]
    fn test_partial_sections() {
        let config = AppConfig::from_toml_str(
            r#"
[logging]
level = "debug"

[validation]
tolerance = 0.005
angular_tolerance = 0.05

[project]
id = "bayfront"
crs = "EPSG:2226"
store = "data/bayfront.svdx"

[standards]
path = "config/standards.toml"
"#,
        )
        .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.validation.tolerance, 0.005);
        assert_eq!(config.validation.angular_tolerance, 0.05);
        assert_eq!(config.validation.hash_decimals, 3);
        assert_eq!(config.project.id.as_deref(), Some("bayfront"));
        assert_eq!(
            config.project.crs.parse::<CoordinateSystem>().unwrap(),
            CoordinateSystem::StatePlane(2226)
        );
        assert_eq!(
            config.standards.path,
            Some(PathBuf::from("config/standards.toml"))
        );
    }

    #[test]
    fn test_from_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "[validation\n").unwrap();
        assert!(matches!(
            AppConfig::from_file(&path),
            Err(ConfigError::Parse { .. })
        ));
        assert!(matches!(
            AppConfig::from_file(dir.path().join("missing.toml")),
            Err(ConfigError::Io { .. })
        ));
    }
}
