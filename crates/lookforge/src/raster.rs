//! Pixel operations: decode, resize, composite, stitch, encode.
//!
//! Everything here is synchronous and CPU bound; async callers should run
//! it on the blocking pool.

use std::path::Path;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

use crate::error::RasterError;

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

/// Decodes an image file. The format is sniffed from the content, so an
/// extension that lies about it does not matter.
pub fn load(path: &Path) -> Result<DynamicImage, RasterError> {
    let bytes = std::fs::read(path).map_err(|e| RasterError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode(&bytes, path)
}

pub fn decode(bytes: &[u8], path: &Path) -> Result<DynamicImage, RasterError> {
    image::load_from_memory(bytes).map_err(|e| RasterError::Decode {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Scales to exactly `width`, keeping the aspect ratio. Height never drops
/// below one pixel.
pub fn resize_to_width(img: &DynamicImage, width: u32) -> DynamicImage {
    let (w, h) = img.dimensions();
    if w == width {
        return img.clone();
    }
    let height = ((u64::from(h) * u64::from(width) + u64::from(w) / 2) / u64::from(w.max(1))).max(1);
    img.resize_exact(width, height as u32, FilterType::Lanczos3)
}

/// Drops alpha by blending onto white.
pub fn flatten_on_white(img: &DynamicImage) -> RgbImage {
    let rgba = img.to_rgba8();
    let mut out = RgbImage::new(rgba.width(), rgba.height());
    for (x, y, pixel) in rgba.enumerate_pixels() {
        let alpha = u16::from(pixel[3]);
        let blend = |channel: u8| -> u8 {
            (((u16::from(channel) * alpha) + (255 * (255 - alpha))) / 255) as u8
        };
        out.put_pixel(x, y, Rgb([blend(pixel[0]), blend(pixel[1]), blend(pixel[2])]));
    }
    out
}

/// A layer placed on a composite canvas at (`x`, `y`).
pub struct Layer {
    pub image: DynamicImage,
    pub x: i64,
    pub y: i64,
}

/// Draws layers in order onto a white canvas. Parts outside the canvas are
/// clipped.
pub fn composite(width: u32, height: u32, layers: &[Layer]) -> RgbImage {
    let mut canvas = RgbImage::from_pixel(width, height, WHITE);
    for layer in layers {
        let top = flatten_on_white(&layer.image);
        imageops::overlay(&mut canvas, &top, layer.x, layer.y);
    }
    canvas
}

/// Scales every image to `width` and stacks them top to bottom in order.
pub fn stitch_vertical(images: &[DynamicImage], width: u32) -> Result<RgbImage, RasterError> {
    if images.is_empty() || width == 0 {
        return Err(RasterError::Empty);
    }

    let mut layers = Vec::with_capacity(images.len());
    let mut y: i64 = 0;
    for img in images {
        let scaled = resize_to_width(img, width);
        let h = i64::from(scaled.height());
        layers.push(Layer {
            image: scaled,
            x: 0,
            y,
        });
        y += h;
    }

    let total_height = u32::try_from(y).map_err(|_| RasterError::Empty)?;
    Ok(composite(width, total_height, &layers))
}

pub fn encode_jpeg(img: &RgbImage, quality: u8, path: &Path) -> Result<Vec<u8>, RasterError> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100))
        .encode_image(img)
        .map_err(|e| RasterError::Encode {
            path: path.to_path_buf(),
            source: e,
        })?;
    Ok(bytes)
}

/// Loads `inputs`, stitches them to `width`, and writes a JPEG to `output`.
/// Returns the final dimensions.
pub fn stitch_files<P: AsRef<Path>>(
    inputs: &[P],
    width: u32,
    quality: u8,
    output: &Path,
) -> Result<(u32, u32), RasterError> {
    let _span = tracing::info_span!("raster.stitch", sections = inputs.len(), width).entered();

    let images = inputs
        .iter()
        .map(|p| load(p.as_ref()))
        .collect::<Result<Vec<_>, _>>()?;
    let stitched = stitch_vertical(&images, width)?;
    let bytes = encode_jpeg(&stitched, quality, output)?;

    if let Some(parent) = output.parent() {
        std::fs::create_dir_all(parent).map_err(|e| RasterError::Write {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(output, bytes).map_err(|e| RasterError::Write {
        path: output.to_path_buf(),
        source: e,
    })?;

    tracing::info!(
        width = stitched.width(),
        height = stitched.height(),
        "stitched detail page"
    );
    Ok(stitched.dimensions())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};
    use tempfile::TempDir;

    fn solid(width: u32, height: u32, color: [u8; 3]) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb(color)))
    }

    #[test]
    fn test_resize_to_width_keeps_aspect() {
        let img = solid(200, 100, [0, 0, 0]);
        let scaled = resize_to_width(&img, 50);
        assert_eq!(scaled.dimensions(), (50, 25));

        let tall = solid(10, 1000, [0, 0, 0]);
        assert_eq!(resize_to_width(&tall, 20).dimensions(), (20, 2000));
    }

    #[test]
    fn test_composite_places_layers_on_white() {
        let layers = [Layer {
            image: solid(2, 2, [255, 0, 0]),
            x: 1,
            y: 1,
        }];
        let canvas = composite(4, 4, &layers);

        assert_eq!(canvas.get_pixel(0, 0), &WHITE);
        assert_eq!(canvas.get_pixel(1, 1), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(2, 2), &Rgb([255, 0, 0]));
        assert_eq!(canvas.get_pixel(3, 3), &WHITE);
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let clear = DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 0])));
        assert_eq!(flatten_on_white(&clear).get_pixel(0, 0), &WHITE);
    }

    #[test]
    fn test_stitch_vertical_order_and_height() {
        let images = vec![solid(100, 50, [255, 0, 0]), solid(20, 40, [0, 0, 255])];
        let stitched = stitch_vertical(&images, 100).unwrap();

        assert_eq!(stitched.dimensions(), (100, 250));
        assert_eq!(stitched.get_pixel(50, 10), &Rgb([255, 0, 0]));
        let lower = stitched.get_pixel(50, 200);
        assert!(lower[0] < 20 && lower[2] > 235, "got {:?}", lower);
    }

    #[test]
    fn test_stitch_empty_rejected() {
        assert!(matches!(stitch_vertical(&[], 790), Err(RasterError::Empty)));
    }

    #[test]
    fn test_stitch_files_writes_jpeg() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a.jpg");
        let b = temp_dir.path().join("b.jpg");
        // PNG bytes behind a .jpg name still decode
        solid(30, 30, [10, 200, 10]).save_with_format(&a, ImageFormat::Png).unwrap();
        solid(60, 30, [10, 10, 200]).save_with_format(&b, ImageFormat::Png).unwrap();

        let output = temp_dir.path().join("final/detail-page.jpg");
        let (w, h) = stitch_files(&[&a, &b], 60, 95, &output).unwrap();

        assert_eq!((w, h), (60, 90));
        let written = image::open(&output).unwrap();
        assert_eq!(written.dimensions(), (60, 90));
        assert_eq!(
            image::guess_format(&std::fs::read(&output).unwrap()).unwrap(),
            ImageFormat::Jpeg
        );
    }

    #[test]
    fn test_load_garbage_is_decode_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("x.jpg");
        std::fs::write(&path, b"not an image").unwrap();
        assert!(matches!(load(&path), Err(RasterError::Decode { .. })));
    }
}
