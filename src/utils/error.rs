use thiserror::Error;

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Source list error: {message}")]
    SourceListError { message: String },

    #[error("Converter error: {message}")]
    ConverterError { message: String },

    #[error("Report update error: {message}")]
    ReportError { message: String },

    #[error("No nodes collected: {failed} of {attempted} sources failed and the rest yielded nothing parsable")]
    EmptyCatalog { attempted: usize, failed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    Configuration,
    Data,
    System,
    External,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl MergeError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            MergeError::HttpError(_) => ErrorCategory::Network,
            MergeError::IoError(_) => ErrorCategory::System,
            MergeError::ConfigError { .. }
            | MergeError::ConfigValidationError { .. }
            | MergeError::InvalidConfigValueError { .. }
            | MergeError::MissingConfigError { .. }
            | MergeError::SourceListError { .. } => ErrorCategory::Configuration,
            MergeError::ConverterError { .. } | MergeError::ReportError { .. } => {
                ErrorCategory::External
            }
            MergeError::EmptyCatalog { .. } => ErrorCategory::Data,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            // 轉換器與 README 只是附加產物，主輸出已經寫入
            MergeError::ConverterError { .. } | MergeError::ReportError { .. } => {
                ErrorSeverity::Low
            }
            MergeError::HttpError(_) => ErrorSeverity::Medium,
            MergeError::ConfigError { .. }
            | MergeError::ConfigValidationError { .. }
            | MergeError::InvalidConfigValueError { .. }
            | MergeError::MissingConfigError { .. }
            | MergeError::SourceListError { .. }
            | MergeError::EmptyCatalog { .. } => ErrorSeverity::High,
            MergeError::IoError(_) => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MergeError::HttpError(_) => "Check network connectivity and proxy settings, then retry",
            MergeError::IoError(_) => "Check that the output directory exists and is writable",
            MergeError::ConfigError { .. }
            | MergeError::ConfigValidationError { .. }
            | MergeError::InvalidConfigValueError { .. }
            | MergeError::MissingConfigError { .. } => {
                "Fix the configuration file and run again"
            }
            MergeError::SourceListError { .. } => {
                "Make sure the source list is a JSON array of {id, remarks, url, type, enabled}"
            }
            MergeError::ConverterError { .. } => {
                "Verify the converter executable path and that it runs on this platform"
            }
            MergeError::ReportError { .. } => "Check the README path and marker line",
            MergeError::EmptyCatalog { .. } => {
                "Enable more sources or run with -v to see why each source was rejected"
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MergeError::EmptyCatalog { attempted, failed } => format!(
                "Merge aborted: no usable node from {} source(s) ({} failed). The previous artifact was left untouched.",
                attempted, failed
            ),
            MergeError::IoError(e) => format!("File system error: {}", e),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MergeError>;
