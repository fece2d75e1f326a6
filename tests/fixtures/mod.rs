//! Synthetic camera captures for tests.

#![allow(dead_code)]

use plate_gate::models::upload::ImageUpload;

/// JPEG-looking bytes of `size`, distinct per `seed`.
pub fn jpeg_bytes(size: usize, seed: u8) -> Vec<u8> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend((0..size.saturating_sub(4)).map(|i| (i as u8).wrapping_mul(31) ^ seed));
    bytes.truncate(size);
    bytes
}

pub fn jpeg(filename: &str, seed: u8) -> ImageUpload {
    ImageUpload::new(filename, "image/jpeg", jpeg_bytes(64 * 1024, seed))
}

pub fn gif(filename: &str) -> ImageUpload {
    let mut bytes = b"GIF89a".to_vec();
    bytes.resize(64 * 1024, 0);
    ImageUpload::new(filename, "image/gif", bytes)
}

pub fn tiny_jpeg(filename: &str) -> ImageUpload {
    ImageUpload::new(filename, "image/jpeg", jpeg_bytes(1023, 1))
}
