//! Upload payloads and tiny real images for tests.

#![allow(dead_code)]

use std::io::Cursor;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{ImageFormat, Rgb, RgbImage};

use lookforge::UploadFile;

/// PNG bytes of a solid `width` x `height` image.
pub fn png_bytes(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    let img = RgbImage::from_pixel(width, height, Rgb(color));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("encode png");
    bytes
}

pub fn png_base64(width: u32, height: u32, color: [u8; 3]) -> String {
    STANDARD.encode(png_bytes(width, height, color))
}

/// An upload named `name` carrying a small grey PNG.
pub fn upload(name: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        data: png_base64(4, 4, [128, 128, 128]),
    }
}

/// Same as [`upload`], with the content sent as a `data:` URL.
pub fn data_url_upload(name: &str) -> UploadFile {
    UploadFile {
        name: name.to_string(),
        data: format!("data:image/png;base64,{}", png_base64(4, 4, [10, 20, 30])),
    }
}

pub fn uploads(names: &[&str]) -> Vec<UploadFile> {
    names.iter().map(|n| upload(n)).collect()
}
