//! 配置管理器
//!
//! 查找并加载配置文件，应用环境变量覆盖，并验证结果

use std::path::Path;

use crate::env::{core as core_env, EnvVar};
use crate::translation::error::{TranslationError, TranslationResult};

use super::{constants, EngineConfig};

/// 配置管理器
pub struct ConfigManager {
    config: EngineConfig,
    /// 实际加载的配置文件
    source: Option<String>,
}

impl ConfigManager {
    /// 按搜索路径加载配置
    ///
    /// 优先使用 `LINGUISE_CONFIG` 指定的文件，其次依次查找
    /// [`constants::CONFIG_PATHS`]，都不存在时使用默认配置。
    pub fn new() -> TranslationResult<Self> {
        Self::load_dotenv();

        let source = match core_env::ConfigPath::get() {
            Ok(path) => Some(path),
            Err(_) => Self::find_config_file(),
        };

        match source {
            Some(path) => Self::from_file(&path),
            None => {
                tracing::info!("未找到配置文件，使用默认配置");
                Self::finish(EngineConfig::default(), None)
            }
        }
    }

    /// 从指定文件加载配置
    pub fn from_file(path: &str) -> TranslationResult<Self> {
        let expanded = shellexpand::tilde(path).to_string();
        tracing::info!("加载配置文件: {}", expanded);
        let config = Self::load_from_file(&expanded)?;
        Self::finish(config, Some(expanded))
    }

    /// 使用给定配置（仍然应用环境变量覆盖与验证）
    pub fn from_config(config: EngineConfig) -> TranslationResult<Self> {
        Self::finish(config, None)
    }

    fn finish(mut config: EngineConfig, source: Option<String>) -> TranslationResult<Self> {
        config.apply_env_overrides();
        config.validate()?;
        Ok(Self { config, source })
    }

    /// 获取配置
    pub fn get_config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn into_config(self) -> EngineConfig {
        self.config
    }

    /// 实际加载的配置文件路径
    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    fn find_config_file() -> Option<String> {
        constants::CONFIG_PATHS
            .iter()
            .map(|path| shellexpand::tilde(path).to_string())
            .find(|path| Path::new(path).exists())
    }

    fn load_from_file(path: &str) -> TranslationResult<EngineConfig> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| TranslationError::ConfigError(format!("读取配置文件失败: {}", e)))?;

        if path.ends_with(".json") {
            serde_json::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析JSON配置失败: {}", e)))
        } else {
            toml::from_str(&content)
                .map_err(|e| TranslationError::ConfigError(format!("解析TOML配置失败: {}", e)))
        }
    }

    /// 加载 .env 文件
    fn load_dotenv() {
        for env_file in constants::ENV_FILES {
            if Path::new(env_file).exists() && dotenv::from_filename(env_file).is_ok() {
                tracing::debug!("已加载环境变量文件: {}", env_file);
                break;
            }
        }
    }

    /// 生成示例配置文件
    pub fn generate_example_config(path: &str) -> TranslationResult<()> {
        let config = EngineConfig::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| TranslationError::ConfigError(format!("序列化配置失败: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| TranslationError::ConfigError(format!("写入配置文件失败: {}", e)))?;

        Ok(())
    }
}
