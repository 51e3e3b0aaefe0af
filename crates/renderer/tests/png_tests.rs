//! Tests for PNG encoding of rendered products.

use std::io::Read;

use renderer::png::{create_png, create_png_with};

/// Split a PNG into (type, data) chunks, checking every CRC.
fn chunks(png: &[u8]) -> Vec<([u8; 4], Vec<u8>)> {
    assert_eq!(&png[0..8], &[137, 80, 78, 71, 13, 10, 26, 10]);
    let mut out = Vec::new();
    let mut pos = 8;
    while pos < png.len() {
        let len = u32::from_be_bytes(png[pos..pos + 4].try_into().unwrap()) as usize;
        let kind: [u8; 4] = png[pos + 4..pos + 8].try_into().unwrap();
        let data = png[pos + 8..pos + 8 + len].to_vec();
        let crc = u32::from_be_bytes(png[pos + 8 + len..pos + 12 + len].try_into().unwrap());
        assert_eq!(crc, crc32fast::hash(&png[pos + 4..pos + 8 + len]), "bad CRC");
        out.push((kind, data));
        pos += 12 + len;
    }
    out
}

/// Undo the Sub filter of every scanline.
fn decode(png: &[u8], width: usize) -> Vec<u8> {
    let idat: Vec<u8> = chunks(png)
        .into_iter()
        .filter(|(kind, _)| kind == b"IDAT")
        .flat_map(|(_, data)| data)
        .collect();
    let mut raw = Vec::new();
    flate2::read::ZlibDecoder::new(&idat[..])
        .read_to_end(&mut raw)
        .unwrap();

    let stride = width * 4;
    let mut pixels = Vec::new();
    for line in raw.chunks_exact(stride + 1) {
        assert_eq!(line[0], 1, "expected Sub filter");
        let mut row = line[1..].to_vec();
        for i in 4..stride {
            row[i] = row[i].wrapping_add(row[i - 4]);
        }
        pixels.extend(row);
    }
    pixels
}

fn gradient(width: usize, height: usize) -> Vec<u8> {
    let mut pixels = Vec::with_capacity(width * height * 4);
    for y in 0..height {
        for x in 0..width {
            pixels.extend_from_slice(&[(x * 7) as u8, (y * 5) as u8, (x + y) as u8, 255]);
        }
    }
    pixels
}

#[test]
fn test_chunk_layout() {
    let png = create_png(&gradient(4, 3), 4, 3).unwrap();
    let kinds: Vec<[u8; 4]> = chunks(&png).into_iter().map(|(k, _)| k).collect();
    assert_eq!(kinds, vec![*b"IHDR", *b"IDAT", *b"IEND"]);

    let (_, ihdr) = &chunks(&png)[0];
    assert_eq!(&ihdr[0..4], &4u32.to_be_bytes());
    assert_eq!(&ihdr[4..8], &3u32.to_be_bytes());
    assert_eq!(ihdr[8], 8); // bit depth
    assert_eq!(ihdr[9], 6); // RGBA
}

#[test]
fn test_pixels_roundtrip_through_decoder() {
    let pixels = gradient(37, 11);
    let png = create_png(&pixels, 37, 11).unwrap();
    assert_eq!(decode(&png, 37), pixels);
}

#[test]
fn test_uniform_background_compresses() {
    // A 3840x2160 white canvas must stay small
    let pixels = vec![255u8; 3840 * 2160 * 4];
    let png = create_png_with(&pixels, 3840, 2160, flate2::Compression::fast()).unwrap();
    assert!(png.len() < 200_000, "white canvas encoded to {} bytes", png.len());
}

#[test]
fn test_transparent_pixels_preserved() {
    let pixels = [0, 0, 0, 0, 10, 20, 30, 255];
    let png = create_png(&pixels, 2, 1).unwrap();
    assert_eq!(decode(&png, 2), pixels.to_vec());
}
