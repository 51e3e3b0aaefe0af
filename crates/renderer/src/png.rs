//! PNG encoding for RGBA image data (color type 6, 8 bits per channel).
//!
//! Product images are full-color satellite composites with far more than 256
//! distinct colors, so there is no indexed mode.

use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::error::{RenderError, RenderResult};

const PNG_SIGNATURE: [u8; 8] = [137, 80, 78, 71, 13, 10, 26, 10];

/// Create a PNG image from RGBA pixel data.
///
/// # Arguments
/// - `pixels`: RGBA pixel data (4 bytes per pixel, row-major, top row first)
/// - `width`: Image width in pixels
/// - `height`: Image height in pixels
pub fn create_png(pixels: &[u8], width: usize, height: usize) -> RenderResult<Vec<u8>> {
    create_png_with(pixels, width, height, Compression::default())
}

/// Same as [`create_png`] with an explicit zlib compression level.
pub fn create_png_with(
    pixels: &[u8],
    width: usize,
    height: usize,
    compression: Compression,
) -> RenderResult<Vec<u8>> {
    if width == 0 || height == 0 {
        return Err(RenderError::InvalidCanvas { width, height });
    }
    if pixels.len() != width * height * 4 {
        return Err(RenderError::ShapeMismatch {
            band: "rgba",
            expected: width * height * 4,
            actual: pixels.len(),
        });
    }

    let idat_data = deflate_idat_rgba(pixels, width, height, compression)?;

    let mut png = Vec::with_capacity(idat_data.len() + 64);
    png.extend_from_slice(&PNG_SIGNATURE);

    // IHDR chunk
    let mut ihdr_data = Vec::with_capacity(13);
    ihdr_data.extend_from_slice(&(width as u32).to_be_bytes());
    ihdr_data.extend_from_slice(&(height as u32).to_be_bytes());
    ihdr_data.push(8); // bit depth
    ihdr_data.push(6); // color type (RGBA)
    ihdr_data.push(0); // compression method
    ihdr_data.push(0); // filter method
    ihdr_data.push(0); // interlace method
    write_chunk(&mut png, b"IHDR", &ihdr_data);

    write_chunk(&mut png, b"IDAT", &idat_data);
    write_chunk(&mut png, b"IEND", &[]);

    Ok(png)
}

/// Write a PNG chunk: length, type, data, CRC over type + data.
fn write_chunk(png: &mut Vec<u8>, chunk_type: &[u8; 4], data: &[u8]) {
    png.extend_from_slice(&(data.len() as u32).to_be_bytes());
    png.extend_from_slice(chunk_type);
    png.extend_from_slice(data);

    let mut hasher = crc32fast::Hasher::new();
    hasher.update(chunk_type);
    hasher.update(data);
    png.extend_from_slice(&hasher.finalize().to_be_bytes());
}

/// Deflate RGBA scanlines for the IDAT chunk.
///
/// Each row uses the Sub filter: large regions of uniform background
/// compress far better as zero deltas.
fn deflate_idat_rgba(
    pixels: &[u8],
    width: usize,
    height: usize,
    compression: Compression,
) -> std::io::Result<Vec<u8>> {
    let stride = width * 4;
    let mut encoder = ZlibEncoder::new(Vec::new(), compression);
    let mut filtered = vec![0u8; 1 + stride];
    filtered[0] = 1; // filter type: Sub

    for row in pixels.chunks_exact(stride).take(height) {
        filtered[1..5].copy_from_slice(&row[..4]);
        for i in 4..stride {
            filtered[1 + i] = row[i].wrapping_sub(row[i - 4]);
        }
        encoder.write_all(&filtered)?;
    }

    encoder.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    fn inflate(png: &[u8]) -> Vec<u8> {
        // Single IDAT right after signature (8) + IHDR (25)
        let idat_start = 8 + 25;
        let len = u32::from_be_bytes(png[idat_start..idat_start + 4].try_into().unwrap()) as usize;
        let data = &png[idat_start + 8..idat_start + 8 + len];
        let mut out = Vec::new();
        flate2::read::ZlibDecoder::new(data)
            .read_to_end(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_sub_filter_reconstructs() {
        let pixels = [
            10, 20, 30, 255, 15, 20, 25, 255, 0, 0, 0, 0, //
            1, 2, 3, 4, 5, 6, 7, 8, 255, 255, 255, 255,
        ];
        let png = create_png(&pixels, 3, 2).unwrap();
        let raw = inflate(&png);
        assert_eq!(raw.len(), 2 * (1 + 12));

        for (y, line) in raw.chunks_exact(13).enumerate() {
            assert_eq!(line[0], 1);
            let mut recon = line[1..].to_vec();
            for i in 4..12 {
                recon[i] = recon[i].wrapping_add(recon[i - 4]);
            }
            assert_eq!(&recon[..], &pixels[y * 12..(y + 1) * 12]);
        }
    }

    #[test]
    fn test_chunk_crc() {
        let mut out = Vec::new();
        write_chunk(&mut out, b"IEND", &[]);
        // Well-known IEND CRC
        assert_eq!(&out[8..12], &[0xAE, 0x42, 0x60, 0x82]);
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(matches!(
            create_png(&[0u8; 7], 1, 2),
            Err(RenderError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            create_png(&[], 0, 0),
            Err(RenderError::InvalidCanvas { .. })
        ));
    }
}
