use thiserror::Error;

#[derive(Error, Debug)]
pub enum LevelUpError {
    #[error("Subject {subject} has no experience record")]
    NoExperienceRecord { subject: String },

    #[error("Invalid amount: {reason}")]
    InvalidAmount { reason: String },

    #[error("Invalid level {level}: {reason}")]
    InvalidLevel { level: u32, reason: String },

    #[error("Unknown multiplier policy: {name}")]
    UnknownMultiplierPolicy { name: String },

    #[error("Persistence failure: {message}")]
    Persistence { message: String },

    #[error("Lock poisoned: {resource}")]
    LockPoisoned { resource: String },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("CSV processing error: {0}")]
    CsvError(#[from] csv::Error),

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

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Domain,
    Validation,
    Configuration,
    Persistence,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl LevelUpError {
    pub fn no_record(subject: impl std::fmt::Display) -> Self {
        LevelUpError::NoExperienceRecord {
            subject: subject.to_string(),
        }
    }

    pub fn invalid_amount(reason: impl Into<String>) -> Self {
        LevelUpError::InvalidAmount {
            reason: reason.into(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        LevelUpError::Persistence {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            LevelUpError::NoExperienceRecord { .. } | LevelUpError::UnknownMultiplierPolicy { .. } => {
                ErrorCategory::Domain
            }
            LevelUpError::InvalidAmount { .. } | LevelUpError::InvalidLevel { .. } => {
                ErrorCategory::Validation
            }
            LevelUpError::Persistence { .. }
            | LevelUpError::SerializationError(_)
            | LevelUpError::CsvError(_) => ErrorCategory::Persistence,
            LevelUpError::ConfigError { .. }
            | LevelUpError::ConfigValidationError { .. }
            | LevelUpError::InvalidConfigValueError { .. }
            | LevelUpError::MissingConfigError { .. } => ErrorCategory::Configuration,
            LevelUpError::LockPoisoned { .. } | LevelUpError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Domain | ErrorCategory::Validation => ErrorSeverity::Low,
            ErrorCategory::Persistence => ErrorSeverity::Medium,
            ErrorCategory::Configuration => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 呼叫端可採取的補救建議
    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            LevelUpError::NoExperienceRecord { .. } => {
                "Grant points with add_points first so an experience record exists"
            }
            LevelUpError::InvalidAmount { .. } => {
                "Use a non-negative amount and a finite, non-negative multiplier"
            }
            LevelUpError::InvalidLevel { .. } => "Level numbers start at 1",
            LevelUpError::UnknownMultiplierPolicy { .. } => {
                "Register the policy or fix multiplier.policy in the configuration"
            }
            LevelUpError::Persistence { .. } | LevelUpError::SerializationError(_) => {
                "Check the backing store and retry the operation"
            }
            LevelUpError::CsvError(_) => "Check the level CSV has 'level,next_level_experience' columns",
            LevelUpError::LockPoisoned { .. } => "Restart the process; a previous writer panicked",
            LevelUpError::IoError(_) => "Check file paths and permissions",
            LevelUpError::ConfigError { .. }
            | LevelUpError::ConfigValidationError { .. }
            | LevelUpError::InvalidConfigValueError { .. }
            | LevelUpError::MissingConfigError { .. } => "Fix the configuration file and reload",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self.category() {
            ErrorCategory::Domain => format!("Request rejected: {}", self),
            ErrorCategory::Validation => format!("Invalid input: {}", self),
            ErrorCategory::Configuration => format!("Configuration problem: {}", self),
            ErrorCategory::Persistence => format!("Could not store experience data: {}", self),
            ErrorCategory::System => format!("System error: {}", self),
        }
    }
}

pub type Result<T> = std::result::Result<T, LevelUpError>;
