use crate::domain::dimension::Dimension;
use image::ImageFormat;
use std::env;
use std::path::PathBuf;
use thiserror::Error;

const DEFAULT_SOURCE_BUCKET: &str = "source-image-bucket";
const DEFAULT_DESTINATION_BUCKET: &str = "processed-image-bucket";
const DEFAULT_TARGET_SIDE: u32 = 300;
const DEFAULT_JPEG_QUALITY: u8 = 75;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} is not a valid number: {value}")]
    InvalidNumber { name: &'static str, value: String },

    #[error("{name} is out of range: {value}")]
    OutOfRange { name: &'static str, value: String },

    #[error("{name} does not name an encodable image format: {value}")]
    UnsupportedFormat { name: &'static str, value: String },

    #[error("{name} must not be empty")]
    Empty { name: &'static str },

    #[error("source and destination bucket are both {bucket}")]
    SameBucket { bucket: String },
}

/// Settings shared by every invocation of the handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerConfig {
    pub source_bucket: String,
    pub destination_bucket: String,
    pub target: Dimension,
    /// Format of the uploaded image. `None` keeps the source format.
    pub output_format: Option<ImageFormat>,
    pub jpeg_quality: u8,
    pub workspace_root: PathBuf,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        HandlerConfig {
            source_bucket: DEFAULT_SOURCE_BUCKET.to_string(),
            destination_bucket: DEFAULT_DESTINATION_BUCKET.to_string(),
            target: Dimension {
                width: DEFAULT_TARGET_SIDE,
                height: DEFAULT_TARGET_SIDE,
            },
            output_format: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            workspace_root: env::temp_dir(),
        }
    }
}

impl HandlerConfig {
    pub fn from_env() -> Result<HandlerConfig, ConfigError> {
        HandlerConfig::from_lookup(|name| env::var(name).ok())
    }

    /// Build from any variable source; unset variables take the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<HandlerConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = HandlerConfig::default();

        let source_bucket = bucket(&lookup, "SOURCE_BUCKET", default.source_bucket)?;
        let destination_bucket =
            bucket(&lookup, "DESTINATION_BUCKET", default.destination_bucket)?;
        if source_bucket == destination_bucket {
            return Err(ConfigError::SameBucket {
                bucket: source_bucket,
            });
        }

        let width = number::<u32, _>(&lookup, "TARGET_WIDTH")?.unwrap_or(default.target.width);
        let height = number::<u32, _>(&lookup, "TARGET_HEIGHT")?.unwrap_or(default.target.height);
        let target = Dimension::new(width, height).ok_or_else(|| ConfigError::OutOfRange {
            name: "TARGET_WIDTH/TARGET_HEIGHT",
            value: format!("{width}x{height}"),
        })?;

        let jpeg_quality = number::<u8, _>(&lookup, "JPEG_QUALITY")?.unwrap_or(default.jpeg_quality);
        if !(1..=100).contains(&jpeg_quality) {
            return Err(ConfigError::OutOfRange {
                name: "JPEG_QUALITY",
                value: jpeg_quality.to_string(),
            });
        }

        let output_format = match lookup("OUTPUT_FORMAT") {
            Some(value) => Some(output_format(&value)?),
            None => default.output_format,
        };

        let workspace_root = lookup("WORKSPACE_DIR")
            .map(PathBuf::from)
            .unwrap_or(default.workspace_root);

        Ok(HandlerConfig {
            source_bucket,
            destination_bucket,
            target,
            output_format,
            jpeg_quality,
            workspace_root,
        })
    }
}

fn bucket<F>(lookup: &F, name: &'static str, default: String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::Empty { name }),
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default),
    }
}

fn number<T, F>(lookup: &F, name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    lookup(name)
        .map(|value| {
            value
                .trim()
                .parse::<T>()
                .map_err(|_| ConfigError::InvalidNumber { name, value })
        })
        .transpose()
}

fn output_format(value: &str) -> Result<ImageFormat, ConfigError> {
    ImageFormat::from_extension(value.trim())
        .filter(|format| format.writing_enabled())
        .ok_or_else(|| ConfigError::UnsupportedFormat {
            name: "OUTPUT_FORMAT",
            value: value.to_string(),
        })
}
