use thiserror::Error;

#[derive(Error, Debug)]
pub enum RiskError {
    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("File not found: {path}")]
    MissingFileError { path: String },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing configuration field: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Data processing error: {message}")]
    ProcessingError { message: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },

    #[error("Model error: {message}")]
    ModelError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Input,
    Processing,
    Model,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskError {
    pub fn missing_file(path: impl AsRef<std::path::Path>) -> Self {
        RiskError::MissingFileError {
            path: path.as_ref().display().to_string(),
        }
    }

    pub fn processing(message: impl Into<String>) -> Self {
        RiskError::ProcessingError {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        RiskError::ValidationError {
            message: message.into(),
        }
    }

    pub fn model(message: impl Into<String>) -> Self {
        RiskError::ModelError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RiskError::ConfigError { .. }
            | RiskError::MissingConfigError { .. }
            | RiskError::InvalidConfigValueError { .. }
            | RiskError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            RiskError::MissingFileError { .. } | RiskError::CsvError(_) | RiskError::ZipError(_) => {
                ErrorCategory::Input
            }
            RiskError::ProcessingError { .. }
            | RiskError::ValidationError { .. }
            | RiskError::SerializationError(_) => ErrorCategory::Processing,
            RiskError::ModelError { .. } => ErrorCategory::Model,
            RiskError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::Input => ErrorSeverity::High,
            ErrorCategory::Processing => ErrorSeverity::Medium,
            ErrorCategory::Model => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            RiskError::MissingFileError { .. } => {
                "Download the Olist dataset from Kaggle and point OLIST_DATA_DIR at the extracted folder or archive"
            }
            RiskError::CsvError(_) => "Check that the CSV files are the unmodified Kaggle exports",
            RiskError::ZipError(_) => "Re-download the dataset archive; it appears to be corrupted",
            RiskError::ConfigError { .. }
            | RiskError::MissingConfigError { .. }
            | RiskError::InvalidConfigValueError { .. }
            | RiskError::ConfigValidationError { .. } => {
                "Review the configuration file and command line flags"
            }
            RiskError::ValidationError { .. } => {
                "Check that the modeling table covers a long enough time range for the split"
            }
            RiskError::ModelError { .. } => "Retrain the model with the train binary",
            RiskError::ProcessingError { .. } | RiskError::SerializationError(_) => {
                "Run again with --verbose to see which step failed"
            }
            RiskError::IoError(_) => "Check file permissions and available disk space",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Configuration => format!("Invalid configuration: {}", self),
            ErrorCategory::Input => format!("Could not read input data: {}", self),
            ErrorCategory::Processing => format!("Processing failed: {}", self),
            ErrorCategory::Model => format!("Model problem: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }

    /// Process exit code derived from severity.
    pub fn exit_code(&self) -> i32 {
        match self.severity() {
            ErrorSeverity::Low => 0,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::High => 1,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl From<toml::de::Error> for RiskError {
    fn from(e: toml::de::Error) -> Self {
        RiskError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        }
    }
}

pub type Result<T> = std::result::Result<T, RiskError>;
