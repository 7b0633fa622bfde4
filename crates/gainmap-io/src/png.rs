//! PNG format support.
//!
//! PNG is used for paired SDR inputs, for diagnostic overlays and as the
//! plane codec inside the gain map container.
//!
//! # Features
//!
//! - 8-bit and 16-bit support
//! - Gray, gray+alpha, RGB and RGBA (palette and low bit depths expanded)
//! - sRGB decode to linear on read, sRGB encode on write

use crate::{IoError, IoResult};
use gainmap_core::pixel::{linear_to_srgb_u8, srgb_eotf};
use gainmap_core::{ColorSpaceId, Image};
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Seek, Write};
use std::path::Path;

/// Integer samples decoded from or destined for a PNG stream.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Raster {
    pub width: u32,
    pub height: u32,
    /// 1 (gray), 2 (gray+alpha), 3 (RGB) or 4 (RGBA).
    pub channels: usize,
    /// 8 or 16.
    pub bit_depth: u8,
    pub samples: Vec<u16>,
}

impl Raster {
    /// Largest sample value for this bit depth.
    pub fn max_value(&self) -> f32 {
        if self.bit_depth == 16 { 65535.0 } else { 255.0 }
    }
}

/// Reads a PNG file as an SDR image.
///
/// Samples are sRGB-decoded to linear light and the image is tagged
/// [`ColorSpaceId::Srgb`].
///
/// # Example
///
/// ```rust,ignore
/// use gainmap_io::png;
///
/// let sdr = png::read("photo.png")?;
/// ```
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let file = File::open(path.as_ref())?;
    let raster = decode(BufReader::new(file))?;
    let max = raster.max_value();

    let mut rgba = Vec::with_capacity(raster.width as usize * raster.height as usize * 4);
    for px in raster.samples.chunks_exact(raster.channels) {
        let v = |i: usize| srgb_eotf(px[i] as f32 / max);
        let (r, g, b, a) = match raster.channels {
            1 => (v(0), v(0), v(0), 1.0),
            2 => (v(0), v(0), v(0), px[1] as f32 / max),
            3 => (v(0), v(1), v(2), 1.0),
            _ => (v(0), v(1), v(2), px[3] as f32 / max),
        };
        rgba.extend_from_slice(&[r, g, b, a]);
    }

    Ok(Image::from_rgba(raster.width, raster.height, rgba, ColorSpaceId::Srgb)?)
}

/// Writes an image as an 8-bit sRGB RGB PNG.
///
/// Linear samples are clamped to [0, 1] before encoding; alpha is dropped.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let file = File::create(path.as_ref())?;
    let raster = to_srgb_raster(image, 1);
    encode(BufWriter::new(file), &raster)
}

/// Converts linear RGBA to an 8-bit sRGB RGB raster, quantizing codes to
/// multiples of `step`.
pub(crate) fn to_srgb_raster(image: &Image, step: u16) -> Raster {
    let step = step.max(1);
    let samples = image
        .data()
        .chunks_exact(4)
        .flat_map(|px| {
            [px[0], px[1], px[2]].map(|c| {
                let code = linear_to_srgb_u8(c) as u16;
                ((code + step / 2) / step * step).min(255)
            })
        })
        .collect();
    Raster {
        width: image.width(),
        height: image.height(),
        channels: 3,
        bit_depth: 8,
        samples,
    }
}

/// Decodes a PNG stream into integer samples.
pub(crate) fn decode<R: BufRead + Seek>(input: R) -> IoResult<Raster> {
    let mut decoder = png::Decoder::new(input);
    decoder.set_transformations(png::Transformations::EXPAND);
    let mut reader = decoder
        .read_info()
        .map_err(|e: png::DecodingError| IoError::Png(e.to_string()))?;

    let buf_size = reader
        .output_buffer_size()
        .ok_or_else(|| IoError::Png("cannot determine output buffer size".into()))?;
    let mut buf = vec![0u8; buf_size];
    let info = reader
        .next_frame(&mut buf)
        .map_err(|e: png::DecodingError| IoError::Png(e.to_string()))?;
    let bytes = &buf[..info.buffer_size()];

    let channels = match info.color_type {
        png::ColorType::Grayscale => 1,
        png::ColorType::GrayscaleAlpha => 2,
        png::ColorType::Rgb => 3,
        png::ColorType::Rgba => 4,
        other => {
            return Err(IoError::UnsupportedLayout(format!(
                "{:?} {:?}",
                other, info.bit_depth
            )));
        }
    };

    let (bit_depth, samples) = match info.bit_depth {
        png::BitDepth::Eight => (8, bytes.iter().map(|&b| b as u16).collect()),
        png::BitDepth::Sixteen => (16, bytes_to_u16(bytes)),
        other => {
            return Err(IoError::UnsupportedLayout(format!("{:?}", other)));
        }
    };

    Ok(Raster {
        width: info.width,
        height: info.height,
        channels,
        bit_depth,
        samples,
    })
}

/// Encodes integer samples as a PNG stream.
pub(crate) fn encode<W: Write>(output: W, raster: &Raster) -> IoResult<()> {
    let color_type = match raster.channels {
        1 => png::ColorType::Grayscale,
        2 => png::ColorType::GrayscaleAlpha,
        3 => png::ColorType::Rgb,
        4 => png::ColorType::Rgba,
        n => return Err(IoError::Png(format!("unsupported channel count: {}", n))),
    };

    let mut encoder = png::Encoder::new(output, raster.width, raster.height);
    encoder.set_color(color_type);
    encoder.set_compression(png::Compression::default());

    let data: Vec<u8> = if raster.bit_depth == 16 {
        encoder.set_depth(png::BitDepth::Sixteen);
        raster.samples.iter().flat_map(|s| s.to_be_bytes()).collect()
    } else {
        encoder.set_depth(png::BitDepth::Eight);
        if color_type == png::ColorType::Rgb || color_type == png::ColorType::Rgba {
            encoder.set_source_srgb(png::SrgbRenderingIntent::Perceptual);
        }
        raster.samples.iter().map(|&s| s.min(255) as u8).collect()
    };

    let mut png_writer = encoder
        .write_header()
        .map_err(|e| IoError::Png(e.to_string()))?;
    png_writer
        .write_image_data(&data)
        .map_err(|e| IoError::Png(e.to_string()))?;
    png_writer
        .finish()
        .map_err(|e| IoError::Png(e.to_string()))?;
    Ok(())
}

/// Converts big-endian byte slice to u16 vector.
fn bytes_to_u16(bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::io::Cursor;

    #[test]
    fn test_roundtrip_rgb_file() {
        let rgb: Vec<f32> = (0..32 * 8 * 3).map(|i| (i % 97) as f32 / 96.0).collect();
        let image = Image::from_rgb(32, 8, &rgb, ColorSpaceId::LinearSrgb).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rgb.png");
        write(&path, &image).expect("Failed to write PNG");
        let loaded = read(&path).expect("Failed to read PNG");

        assert_eq!(loaded.dimensions(), (32, 8));
        assert_eq!(loaded.color_space(), ColorSpaceId::Srgb);
        let a = image.pixel(5, 3);
        let b = loaded.pixel(5, 3);
        for c in 0..3 {
            assert_relative_eq!(a[c], b[c], epsilon = 0.01);
        }
    }

    #[test]
    fn test_sixteen_bit_gray_in_memory() {
        let raster = Raster {
            width: 3,
            height: 2,
            channels: 1,
            bit_depth: 16,
            samples: vec![0, 1023 << 6, 512 << 6, 65535, 7, 40000],
        };
        let mut bytes = Vec::new();
        encode(&mut bytes, &raster).unwrap();
        let decoded = decode(Cursor::new(bytes.as_slice())).unwrap();
        assert_eq!(decoded, raster);
    }

    #[test]
    fn test_quantized_raster() {
        let image = Image::filled(2, 2, [0.2, 0.5, 1.0, 1.0], ColorSpaceId::LinearSrgb);
        let raster = to_srgb_raster(&image, 16);
        assert!(raster.samples.iter().all(|s| s % 16 == 0 || *s == 255));
    }
}
