use std::io::{BufReader, Cursor};
use std::path::Path;

use fast_image_resize::{self as fir, images::Image as FirImage};
use image::{codecs::jpeg::JpegEncoder, DynamicImage, ImageReader, RgbImage};

use crate::error::{Error, Result};

/// Decode image bytes and rotate them upright according to their EXIF orientation.
pub fn decode_upright(bytes: &[u8]) -> Result<DynamicImage> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| Error::DecodeFailure(image::ImageError::IoError(e)))?
        .decode()
        .map_err(Error::DecodeFailure)?;
    let orientation = read_orientation(&mut Cursor::new(bytes));
    Ok(apply_orientation(img, orientation))
}

/// Encode as baseline JPEG. Alpha is dropped.
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = img.to_rgb8();
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality).encode_image(&rgb)?;
    Ok(out)
}

/// Target size whose shorter edge equals `max_short_edge`, or `None` when the
/// image is already at or below it.
pub fn short_edge_target(width: u32, height: u32, max_short_edge: u32) -> Option<(u32, u32)> {
    let short = width.min(height);
    if short <= max_short_edge || short == 0 {
        return None;
    }
    let scale = max_short_edge as f64 / short as f64;
    let scaled = |v: u32| ((v as f64 * scale).round() as u32).max(1);
    if width <= height {
        Some((max_short_edge, scaled(height)))
    } else {
        Some((scaled(width), max_short_edge))
    }
}

/// Downsample so the shorter edge is at most `max_short_edge`. Smaller images
/// come back untouched.
pub fn downscale_short_edge(img: DynamicImage, max_short_edge: u32) -> Result<DynamicImage> {
    let Some((dst_w, dst_h)) = short_edge_target(img.width(), img.height(), max_short_edge) else {
        return Ok(img);
    };

    let rgb = img.to_rgb8();
    let (src_w, src_h) = rgb.dimensions();
    let src = FirImage::from_vec_u8(src_w, src_h, rgb.into_raw(), fir::PixelType::U8x3)
        .map_err(|e| Error::Resize(e.to_string()))?;
    let mut dst = FirImage::new(dst_w, dst_h, fir::PixelType::U8x3);
    fir::Resizer::new()
        .resize(&src, &mut dst, None)
        .map_err(|e| Error::Resize(e.to_string()))?;

    let out = RgbImage::from_raw(dst_w, dst_h, dst.buffer().to_vec())
        .ok_or_else(|| Error::Resize("resized buffer has unexpected length".to_string()))?;
    Ok(DynamicImage::ImageRgb8(out))
}

/// Read pixel dimensions from the container header without decoding pixels.
/// Axes are swapped for EXIF orientations that rotate by 90 degrees.
pub fn probe_dimensions(path: &Path) -> Result<(u32, u32)> {
    let unavailable = |reason: String| Error::MetadataUnavailable {
        path: path.to_path_buf(),
        reason,
    };

    let (width, height) = ImageReader::open(path)
        .map_err(|e| unavailable(e.to_string()))?
        .with_guessed_format()
        .map_err(|e| unavailable(e.to_string()))?
        .into_dimensions()
        .map_err(|e| unavailable(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(unavailable("zero-sized image".to_string()));
    }

    let orientation = std::fs::File::open(path)
        .map(|file| read_orientation(&mut BufReader::new(file)))
        .unwrap_or(1);
    if orientation >= 5 {
        Ok((height, width))
    } else {
        Ok((width, height))
    }
}

/// EXIF orientation tag (1-8). Returns 1 (normal) if missing or unreadable.
fn read_orientation<R: std::io::BufRead + std::io::Seek>(reader: &mut R) -> u8 {
    exif::Reader::new()
        .read_from_container(reader)
        .ok()
        .and_then(|exif| {
            exif.get_field(exif::Tag::Orientation, exif::In::PRIMARY)
                .and_then(|field| field.value.get_uint(0))
        })
        .map(|v| v as u8)
        .unwrap_or(1)
}

/// Orientations:
/// 1: Normal                    5: Mirror + rotate 90° CW
/// 2: Mirror horizontal         6: Rotate 90° CW
/// 3: Rotate 180°               7: Mirror + rotate 90° CCW
/// 4: Mirror vertical           8: Rotate 90° CCW
fn apply_orientation(img: DynamicImage, orientation: u8) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GenericImageView, Rgb};

    fn gradient(w: u32, h: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(w, h, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        }))
    }

    #[test]
    fn test_short_edge_target_portrait() {
        assert_eq!(short_edge_target(1000, 2000, 500), Some((500, 1000)));
    }

    #[test]
    fn test_short_edge_target_landscape() {
        assert_eq!(short_edge_target(1200, 800, 500), Some((750, 500)));
    }

    #[test]
    fn test_short_edge_target_already_small() {
        assert_eq!(short_edge_target(500, 900, 500), None);
        assert_eq!(short_edge_target(300, 200, 500), None);
    }

    #[test]
    fn test_downscale_produces_target_size() {
        let img = downscale_short_edge(gradient(1200, 800), 500).unwrap();
        assert_eq!(img.dimensions(), (750, 500));
    }

    #[test]
    fn test_downscale_leaves_small_image_alone() {
        let img = downscale_short_edge(gradient(320, 240), 500).unwrap();
        assert_eq!(img.dimensions(), (320, 240));
    }

    #[test]
    fn test_encode_then_decode_keeps_size() {
        let bytes = encode_jpeg(&gradient(64, 48), 80).unwrap();
        let img = decode_upright(&bytes).unwrap();
        assert_eq!(img.dimensions(), (64, 48));
    }

    #[test]
    fn test_decode_garbage_is_decode_failure() {
        let err = decode_upright(b"definitely not an image").unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::DecodeFailure);
    }

    #[test]
    fn test_apply_orientation_swaps_axes_for_rotations() {
        for o in 1..=4 {
            assert_eq!(apply_orientation(gradient(4, 2), o).dimensions(), (4, 2));
        }
        for o in 5..=8 {
            assert_eq!(apply_orientation(gradient(4, 2), o).dimensions(), (2, 4));
        }
    }

    #[test]
    fn test_transpose_maps_pixel_positions() {
        let img = gradient(4, 2);
        let transposed = apply_orientation(img.clone(), 5);
        assert_eq!(transposed.get_pixel(1, 3), img.get_pixel(3, 1));
    }

    #[test]
    fn test_probe_dimensions_reads_header() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("probe.png");
        gradient(37, 91).save(&path).unwrap();
        assert_eq!(probe_dimensions(&path).unwrap(), (37, 91));
    }

    #[test]
    fn test_probe_dimensions_missing_file() {
        let err = probe_dimensions(Path::new("/nonexistent/probe.jpg")).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MetadataUnavailable);
    }

    #[test]
    fn test_probe_dimensions_truncated_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("broken.jpg");
        std::fs::write(&path, [0xFF, 0xD8, 0xFF]).unwrap();
        let err = probe_dimensions(&path).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::MetadataUnavailable);
    }
}
