use crate::domain::dimension::Dimension;
use crate::domain::error::HandlerError;
use crate::domain::error::HandlerError::{DecodeError, EncodeError, ResizeError};
use crate::domain::object_key::ObjectKey;
use fast_image_resize::{FilterType, ResizeAlg, ResizeOptions, Resizer};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageFormat, ImageReader};
use std::io::Cursor;
use std::path::Path;
use tracing::{debug, instrument};

const ICO_MAX_SIDE: u32 = 256;
const FALLBACK_FORMAT: ImageFormat = ImageFormat::Png;

fn resize_options() -> ResizeOptions {
    ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Lanczos3))
}

/// Decode the file at `path`, sniffing the format from its content.
#[instrument(skip(key))]
pub fn decode_image(path: &Path, key: &ObjectKey) -> Result<(DynamicImage, ImageFormat), HandlerError> {
    let decode_error = |message: String| DecodeError {
        key: key.to_string(),
        message,
    };

    let reader = ImageReader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(|err| decode_error(err.to_string()))?;
    let format = reader
        .format()
        .ok_or_else(|| decode_error("unrecognised image format".to_string()))?;
    let image = reader.decode().map_err(|err| decode_error(err.to_string()))?;

    debug!(
        "Image decoded at {} ({}x{} {:?})",
        path.display(),
        image.width(),
        image.height(),
        format
    );
    Ok((image, format))
}

/// Resize to exactly `dimension`, stretching if the aspect ratio differs.
/// An empty source is rejected: the resizer would silently leave the
/// output blank.
pub fn resize_image(
    src_image: &DynamicImage,
    dimension: Dimension,
    key: &ObjectKey,
) -> Result<DynamicImage, HandlerError> {
    if src_image.width() == 0 || src_image.height() == 0 {
        return Err(ResizeError {
            key: key.to_string(),
            message: format!(
                "source is {}x{}, nothing to resize",
                src_image.width(),
                src_image.height()
            ),
        });
    }

    let mut dst_image = DynamicImage::new(dimension.width, dimension.height, src_image.color());
    let mut resizer: Resizer = Resizer::new();
    resizer
        .resize(src_image, &mut dst_image, &resize_options())
        .map_err(|err| ResizeError {
            key: key.to_string(),
            message: err.to_string(),
        })?;
    Ok(dst_image)
}

/// Format the resized image is written in. A configured format always
/// wins; otherwise the source format is kept when the codec can write it
/// at `target`, and PNG is used when it cannot.
pub fn output_format(
    configured: Option<ImageFormat>,
    source: ImageFormat,
    target: Dimension,
) -> ImageFormat {
    if let Some(format) = configured {
        return format;
    }
    let fits = match source {
        ImageFormat::Ico => target.width <= ICO_MAX_SIDE && target.height <= ICO_MAX_SIDE,
        _ => true,
    };
    if source.writing_enabled() && fits {
        source
    } else {
        FALLBACK_FORMAT
    }
}

/// JPEG has no alpha channel, so it is always written from RGB8.
pub fn encode_image(
    image: &DynamicImage,
    format: ImageFormat,
    jpeg_quality: u8,
    key: &ObjectKey,
) -> Result<Vec<u8>, HandlerError> {
    let mut buffer = Cursor::new(Vec::new());
    let written = match format {
        ImageFormat::Jpeg => {
            let encoder = JpegEncoder::new_with_quality(&mut buffer, jpeg_quality);
            image.to_rgb8().write_with_encoder(encoder)
        }
        _ => image.write_to(&mut buffer, format),
    };
    written.map_err(|err| EncodeError {
        key: key.to_string(),
        message: format!("{format:?}: {err}"),
    })?;
    Ok(buffer.into_inner())
}
