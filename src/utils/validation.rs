use crate::utils::error::{Result, ServerSmithError};
use url::Url;

pub const MIN_MEMORY_MB: u32 = 256;
pub const MAX_MEMORY_MB: u32 = 1_048_576;

pub trait Validate {
    fn validate(&self) -> Result<()>;
}

pub fn validate_url(field_name: &str, url_str: &str) -> Result<()> {
    if url_str.is_empty() {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: "URL cannot be empty".to_string(),
        });
    }

    match Url::parse(url_str) {
        Ok(url) => match url.scheme() {
            "http" | "https" => Ok(()),
            scheme => Err(ServerSmithError::InvalidConfigValueError {
                field: field_name.to_string(),
                value: url_str.to_string(),
                reason: format!("Unsupported URL scheme: {}", scheme),
            }),
        },
        Err(e) => Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: url_str.to_string(),
            reason: format!("Invalid URL format: {}", e),
        }),
    }
}

pub fn validate_path(field_name: &str, path: &str) -> Result<()> {
    if path.is_empty() {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path cannot be empty".to_string(),
        });
    }

    if path.contains('\0') {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: path.to_string(),
            reason: "Path contains null bytes".to_string(),
        });
    }

    Ok(())
}

pub fn validate_non_empty_string(field_name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: "Value cannot be empty or whitespace-only".to_string(),
        });
    }
    Ok(())
}

pub fn validate_range<T: PartialOrd + std::fmt::Display + Copy>(
    field_name: &str,
    value: T,
    min: T,
    max: T,
) -> Result<()> {
    if value < min || value > max {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: field_name.to_string(),
            value: value.to_string(),
            reason: format!("Value must be between {} and {}", min, max),
        });
    }
    Ok(())
}

/// The instance name becomes a directory under the base directory, so it
/// must be a single path component.
pub fn validate_instance_name(name: &str) -> Result<()> {
    validate_non_empty_string("name", name)?;

    let reason = if name == "." || name == ".." {
        Some("Name cannot be a relative directory reference")
    } else if name.contains(['/', '\\']) {
        Some("Name cannot contain path separators")
    } else if name.contains('\0') {
        Some("Name contains null bytes")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ServerSmithError::InvalidConfigValueError {
            field: "name".to_string(),
            value: name.to_string(),
            reason: reason.to_string(),
        }),
        None => Ok(()),
    }
}

pub fn validate_memory(min_mb: u32, max_mb: u32) -> Result<()> {
    validate_range("min_memory", min_mb, MIN_MEMORY_MB, MAX_MEMORY_MB)?;
    validate_range("max_memory", max_mb, MIN_MEMORY_MB, MAX_MEMORY_MB)?;
    if min_mb > max_mb {
        return Err(ServerSmithError::InvalidConfigValueError {
            field: "min_memory".to_string(),
            value: min_mb.to_string(),
            reason: format!("Minimum memory cannot exceed maximum memory ({} MB)", max_mb),
        });
    }
    Ok(())
}
