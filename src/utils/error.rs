use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ServerSmithError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Zip operation failed: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("Directory walk failed: {0}")]
    WalkError(#[from] walkdir::Error),

    #[error("Image error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("Configuration error in '{field}': {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for '{field}': {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing required value: {field}")]
    MissingConfigError { field: String },

    #[error("The Minecraft EULA must be accepted before creating a server")]
    EulaNotAccepted,

    #[error("Directory already exists: {}", .0.display())]
    DirectoryExists(PathBuf),

    #[error("Instance not found: {0}")]
    InstanceNotFound(String),

    #[error("{server_type} version not found: {version}")]
    VersionNotFound {
        server_type: String,
        version: String,
    },

    #[error("Distribution error: {message}")]
    DistributionError { message: String },

    #[error("Installer failed with exit code {0}")]
    InstallerFailed(i32),

    #[error("Server already running: {}", .0.display())]
    AlreadyRunning(PathBuf),

    #[error("No server jar found in {}", .0.display())]
    NoServerJar(PathBuf),

    #[error("Process error: {message}")]
    ProcessError { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Network,
    FileSystem,
    Configuration,
    Validation,
    Process,
    Data,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl ErrorSeverity {
    /// Exit code of a failed command. Never zero: a refused command failed.
    pub fn exit_code(&self) -> i32 {
        match self {
            ErrorSeverity::Low | ErrorSeverity::High => 1,
            ErrorSeverity::Medium => 2,
            ErrorSeverity::Critical => 3,
        }
    }
}

impl ServerSmithError {
    pub fn distribution(message: impl Into<String>) -> Self {
        Self::DistributionError {
            message: message.into(),
        }
    }

    pub fn process(message: impl Into<String>) -> Self {
        Self::ProcessError {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::HttpError(_) | Self::DistributionError { .. } | Self::VersionNotFound { .. } => {
                ErrorCategory::Network
            }
            Self::IoError(_)
            | Self::ZipError(_)
            | Self::WalkError(_)
            | Self::DirectoryExists(_) => ErrorCategory::FileSystem,
            Self::ConfigValidationError { .. } | Self::MissingConfigError { .. } => {
                ErrorCategory::Configuration
            }
            Self::InvalidConfigValueError { .. } | Self::EulaNotAccepted => {
                ErrorCategory::Validation
            }
            Self::InstallerFailed(_)
            | Self::AlreadyRunning(_)
            | Self::NoServerJar(_)
            | Self::ProcessError { .. } => ErrorCategory::Process,
            Self::SerializationError(_) | Self::InstanceNotFound(_) | Self::ImageError(_) => {
                ErrorCategory::Data
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::HttpError(_) | Self::DistributionError { .. } => ErrorSeverity::Medium,
            Self::IoError(_) | Self::ZipError(_) | Self::WalkError(_) => ErrorSeverity::Critical,
            _ => ErrorSeverity::High,
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Network => {
                "Check your internet connection and the configured [sources] URLs, then retry"
            }
            ErrorCategory::FileSystem => {
                "Check that the path exists and that you have permission to write to it"
            }
            ErrorCategory::Configuration => "Review settings.toml and the command-line flags",
            ErrorCategory::Validation => "Correct the highlighted value and run the command again",
            ErrorCategory::Process => {
                "Make sure Java is installed and the instance contains a server jar"
            }
            ErrorCategory::Data => "Run `serversmith list` to see the registered instances",
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            Self::HttpError(e) if e.is_timeout() => "The download server did not respond in time".to_string(),
            Self::HttpError(_) => "Could not reach the download server".to_string(),
            Self::EulaNotAccepted => "You must accept the Minecraft EULA (--accept-eula)".to_string(),
            other => other.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ServerSmithError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_and_severity() {
        let err = ServerSmithError::EulaNotAccepted;
        assert_eq!(err.category(), ErrorCategory::Validation);
        assert_eq!(err.severity(), ErrorSeverity::High);

        let err = ServerSmithError::AlreadyRunning(PathBuf::from("/srv/a"));
        assert_eq!(err.category(), ErrorCategory::Process);
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert_eq!(err.severity().exit_code(), 1);

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = ServerSmithError::from(io);
        assert_eq!(err.category(), ErrorCategory::FileSystem);
        assert_eq!(err.severity(), ErrorSeverity::Critical);
    }

    #[test]
    fn test_failures_never_exit_zero() {
        for severity in [
            ErrorSeverity::Low,
            ErrorSeverity::Medium,
            ErrorSeverity::High,
            ErrorSeverity::Critical,
        ] {
            assert_ne!(severity.exit_code(), 0);
        }
    }

    #[test]
    fn test_user_friendly_message() {
        let err = ServerSmithError::VersionNotFound {
            server_type: "Paper".to_string(),
            version: "0.0.1".to_string(),
        };
        assert_eq!(err.user_friendly_message(), "Paper version not found: 0.0.1");
        assert!(ServerSmithError::EulaNotAccepted
            .user_friendly_message()
            .contains("--accept-eula"));
    }
}
