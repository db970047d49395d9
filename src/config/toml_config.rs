use crate::core::fetcher::FetchSettings;
use crate::domain::ports::FilterRules;
use crate::utils::error::{MergeError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergeConfig {
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub converter: ConverterConfig,
    pub report: Option<ReportConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    pub list_file: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub concurrency: usize,
    pub timeout_seconds: u64,
    pub retry_attempts: u32,
    pub retry_delay_seconds: u64,
    pub user_agent: Option<String>,
    /// 每個來源的原始內容另存一份，方便除錯
    pub cache_dir: Option<String>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            concurrency: 10,
            timeout_seconds: 15,
            retry_attempts: 1,
            retry_delay_seconds: 2,
            user_agent: None,
            cache_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: String,
    pub artifact_name: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: "./sub".to_string(),
            artifact_name: "sub_merge_base64.txt".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    pub include: String,
    pub exclude: String,
    pub rename: String,
    pub config: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConverterConfig {
    pub enabled: bool,
    pub executable: String,
    pub targets: Vec<String>,
    pub timeout_seconds: u64,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            executable: "subconverter".to_string(),
            targets: vec!["clash".to_string()],
            timeout_seconds: 120,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    pub readme_file: String,
    #[serde(default = "default_marker")]
    pub marker: String,
    #[serde(default = "default_label")]
    pub label: String,
}

fn default_marker() -> String {
    "### 所有节点".to_string()
}

fn default_label() -> String {
    "合并节点总数".to_string()
}

impl MergeConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MergeError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MergeError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${SUB_LIST})，找不到的變數保持原樣
    fn substitute_env_vars(content: &str) -> Result<String> {
        use regex::Regex;
        let re = Regex::new(r"\$\{([^}]+)\}").map_err(|e| MergeError::ConfigError {
            message: format!("env substitution pattern: {}", e),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn validate_config(&self) -> Result<()> {
        validation::validate_path("sources.list_file", &self.sources.list_file)?;
        validation::validate_range("fetch.concurrency", self.fetch.concurrency, 1, 256)?;
        validation::validate_range("fetch.timeout_seconds", self.fetch.timeout_seconds, 1, 600)?;
        validation::validate_range("fetch.retry_attempts", self.fetch.retry_attempts, 0, 10)?;
        if let Some(agent) = &self.fetch.user_agent {
            validation::validate_non_empty_string("fetch.user_agent", agent)?;
        }
        if let Some(dir) = &self.fetch.cache_dir {
            validation::validate_path("fetch.cache_dir", dir)?;
        }

        validation::validate_path("output.dir", &self.output.dir)?;
        validation::validate_file_name("output.artifact_name", &self.output.artifact_name)?;

        if self.converter.enabled {
            validation::validate_non_empty_string(
                "converter.executable",
                &self.converter.executable,
            )?;
            if self.converter.targets.is_empty() {
                return Err(MergeError::MissingConfigError {
                    field: "converter.targets".to_string(),
                });
            }
            for target in &self.converter.targets {
                // target 會成為檔名的一部分
                validation::validate_file_name("converter.targets", target)?;
            }
            validation::validate_range(
                "converter.timeout_seconds",
                self.converter.timeout_seconds,
                1,
                3600,
            )?;
        }

        if let Some(report) = &self.report {
            validation::validate_path("report.readme_file", &report.readme_file)?;
            validation::validate_non_empty_string("report.marker", &report.marker)?;
            validation::validate_non_empty_string("report.label", &report.label)?;
        }

        Ok(())
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        let defaults = FetchSettings::default();
        FetchSettings {
            concurrency: self.fetch.concurrency,
            timeout: Duration::from_secs(self.fetch.timeout_seconds),
            retry_attempts: self.fetch.retry_attempts,
            retry_delay: Duration::from_secs(self.fetch.retry_delay_seconds),
            user_agent: self.fetch.user_agent.clone().unwrap_or(defaults.user_agent),
            cache_dir: self.fetch.cache_dir.as_ref().map(PathBuf::from),
        }
    }

    pub fn filter_rules(&self) -> FilterRules {
        FilterRules {
            include: self.filter.include.clone(),
            exclude: self.filter.exclude.clone(),
            rename: self.filter.rename.clone(),
            config: self.filter.config.clone(),
        }
    }
}

impl Validate for MergeConfig {
    fn validate(&self) -> Result<()> {
        self.validate_config()
    }
}
