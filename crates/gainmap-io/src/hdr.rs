//! Radiance HDR (RGBE / XYZE) codec.
//!
//! ```text
//! #?RADIANCE
//! FORMAT=32-bit_rle_rgbe
//! KEY=value ...
//! <blank>
//! -Y <rows> +X <cols>        <- axis order maps onto an EXIF orientation
//! <scanlines, flat or adaptive RLE>
//! ```
//!
//! Header fields other than `FORMAT`, `EXPOSURE` and `SOFTWARE` survive a
//! read/write cycle as `HDR:<key>` string attributes.

use crate::{IoError, IoResult};
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use gainmap_core::metadata::keys;
use gainmap_core::{AttrValue, Attrs, ColorSpaceId, Image, Orientation};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &str = "#?";

/// Scanline widths the adaptive RLE can describe.
const RLE_WIDTHS: std::ops::RangeInclusive<usize> = 8..=0x7fff;

/// Shortest run worth a run packet.
const MIN_RUN: usize = 4;

/// Slow axis, fast axis and the orientation they describe.
const AXES: [(&str, &str, Orientation); 8] = [
    ("-Y", "+X", Orientation::Normal),
    ("-Y", "-X", Orientation::FlipHorizontal),
    ("+Y", "-X", Orientation::Rotate180),
    ("+Y", "+X", Orientation::FlipVertical),
    ("+X", "+Y", Orientation::Transpose),
    ("-X", "+Y", Orientation::Rotate90),
    ("-X", "-Y", Orientation::Transverse),
    ("+X", "-Y", Orientation::Rotate270),
];

/// Reads a Radiance file.
///
/// RGBE data is tagged [`ColorSpaceId::LinearSrgb`], XYZE data
/// [`ColorSpaceId::CieXyz`]. The declared resolution is recorded in the
/// metadata so callers can compare it against the decoded extent.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<Image> {
    let mut reader = BufReader::new(File::open(path)?);
    let header = Header::parse(&mut reader)?;

    let mut payload = Vec::new();
    reader.read_to_end(&mut payload)?;
    let pixels = decode_pixels(&payload, header.width as usize, header.height as usize)?;
    let rgb: Vec<f32> = pixels.into_iter().flat_map(Rgbe::to_linear).collect();

    let mut attrs = header.attrs;
    attrs.set(keys::IMAGE_WIDTH, AttrValue::UInt(header.width));
    attrs.set(keys::IMAGE_HEIGHT, AttrValue::UInt(header.height));

    Ok(Image::from_rgb(header.width, header.height, &rgb, header.color_space)?
        .with_orientation(header.orientation)
        .with_metadata(attrs))
}

/// Writes a Radiance file with RLE scanlines where the width allows.
///
/// Alpha is dropped. Negative and non-finite samples are stored as black.
pub fn write<P: AsRef<Path>>(path: P, image: &Image) -> IoResult<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    Header::for_image(image).write(&mut writer)?;

    let width = image.width() as usize;
    let mut payload = Vec::with_capacity(image.data().len());
    for row in image.data().chunks_exact(width * 4) {
        let scanline: Vec<Rgbe> = row
            .chunks_exact(4)
            .map(|px| Rgbe::from_linear([px[0], px[1], px[2]]))
            .collect();
        encode_scanline(&mut payload, &scanline)?;
    }

    writer.write_all(&payload)?;
    writer.flush()?;
    Ok(())
}

struct Header {
    color_space: ColorSpaceId,
    width: u32,
    height: u32,
    orientation: Orientation,
    attrs: Attrs,
}

impl Header {
    fn for_image(image: &Image) -> Self {
        Self {
            color_space: image.color_space(),
            width: image.width(),
            height: image.height(),
            orientation: image.orientation(),
            attrs: image.metadata().clone(),
        }
    }

    fn parse<R: BufRead>(reader: &mut R) -> IoResult<Self> {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        if !line.starts_with(MAGIC) {
            return Err(IoError::hdr("missing #? signature"));
        }

        let mut attrs = Attrs::new();
        let mut color_space = ColorSpaceId::LinearSrgb;
        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                return Err(IoError::hdr("header ends before the resolution line"));
            }
            let text = line.trim_end_matches(['\r', '\n']);
            if text.is_empty() || text.starts_with('#') {
                continue;
            }
            if text.starts_with(['+', '-']) {
                let (width, height, orientation) = parse_resolution(text)
                    .ok_or_else(|| IoError::hdr(format!("bad resolution line: {text}")))?;
                return Ok(Self {
                    color_space,
                    width,
                    height,
                    orientation,
                    attrs,
                });
            }
            let Some((key, value)) = text.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key.to_ascii_uppercase().as_str() {
                "FORMAT" if value.to_ascii_lowercase().contains("xyze") => {
                    color_space = ColorSpaceId::CieXyz;
                }
                "FORMAT" => {}
                "EXPOSURE" => attrs.set(
                    "Exposure",
                    value
                        .parse::<f32>()
                        .map(AttrValue::Float)
                        .unwrap_or_else(|_| AttrValue::Str(value.to_string())),
                ),
                "SOFTWARE" => attrs.set(keys::SOFTWARE, AttrValue::Str(value.to_string())),
                _ => attrs.set(format!("HDR:{key}"), AttrValue::Str(value.to_string())),
            }
        }
    }

    fn write<W: Write>(&self, w: &mut W) -> io::Result<()> {
        let format = match self.color_space {
            ColorSpaceId::CieXyz => "32-bit_rle_xyze",
            _ => "32-bit_rle_rgbe",
        };
        writeln!(w, "{MAGIC}RADIANCE")?;
        writeln!(w, "FORMAT={format}")?;
        if let Some(v) = self.attrs.get(keys::SOFTWARE).and_then(AttrValue::as_str) {
            writeln!(w, "SOFTWARE={v}")?;
        }
        if let Some(v) = self.attrs.get("Exposure").and_then(AttrValue::as_f64) {
            writeln!(w, "EXPOSURE={v}")?;
        }
        for (key, value) in self.attrs.iter() {
            if let (Some(field), AttrValue::Str(v)) = (key.strip_prefix("HDR:"), value) {
                writeln!(w, "{field}={v}")?;
            }
        }
        writeln!(w)?;
        writeln!(w, "{}", resolution_line(self.orientation, self.width, self.height))
    }
}

/// Shared-exponent pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Rgbe([u8; 4]);

impl Rgbe {
    const BLACK: Rgbe = Rgbe([0; 4]);

    fn from_linear(rgb: [f32; 3]) -> Self {
        let [r, g, b] = rgb.map(|c| if c > 0.0 { c } else { 0.0 });
        let peak = r.max(g).max(b);
        if !peak.is_finite() || peak < 1.0e-32 {
            return Self::BLACK;
        }
        // peak lies in [2^(exp-1), 2^exp)
        let exp = peak.log2().floor() as i32 + 1;
        let scale = 256.0 / 2.0_f32.powi(exp);
        let mantissa = |c: f32| (c * scale).min(255.0) as u8;
        Self([
            mantissa(r),
            mantissa(g),
            mantissa(b),
            (exp + 128).clamp(0, 255) as u8,
        ])
    }

    fn to_linear(self) -> [f32; 3] {
        let [r, g, b, e] = self.0;
        if e == 0 {
            return [0.0; 3];
        }
        let unit = 2.0_f32.powi(e as i32 - 136);
        [r, g, b].map(|c| c as f32 * unit)
    }
}

fn truncated(_: io::Error) -> IoError {
    IoError::hdr("pixel data ends early")
}

/// Decodes `height` scanlines; each one is RLE when it opens with a
/// matching `2 2 <width>` marker and flat otherwise.
fn decode_pixels(mut data: &[u8], width: usize, height: usize) -> IoResult<Vec<Rgbe>> {
    let mut pixels = Vec::with_capacity(width * height);
    let mut planes = vec![0u8; width * 4];

    for _ in 0..height {
        if starts_rle_scanline(data, width) {
            data = &data[4..];
            for plane in planes.chunks_exact_mut(width) {
                unpack_plane(&mut data, plane)?;
            }
            pixels.extend((0..width).map(|x| {
                Rgbe([
                    planes[x],
                    planes[width + x],
                    planes[2 * width + x],
                    planes[3 * width + x],
                ])
            }));
        } else {
            let mut flat = vec![0u8; width * 4];
            data.read_exact(&mut flat).map_err(truncated)?;
            pixels.extend(flat.chunks_exact(4).map(|p| Rgbe([p[0], p[1], p[2], p[3]])));
        }
    }
    Ok(pixels)
}

fn starts_rle_scanline(data: &[u8], width: usize) -> bool {
    RLE_WIDTHS.contains(&width)
        && data.len() >= 4
        && data[0] == 2
        && data[1] == 2
        && u16::from_be_bytes([data[2], data[3]]) as usize == width
}

fn unpack_plane(data: &mut &[u8], plane: &mut [u8]) -> IoResult<()> {
    let mut x = 0;
    while x < plane.len() {
        let code = data.read_u8().map_err(truncated)? as usize;
        if code > 128 {
            let value = data.read_u8().map_err(truncated)?;
            plane
                .get_mut(x..x + code - 128)
                .ok_or_else(|| IoError::hdr("run crosses the scanline end"))?
                .fill(value);
            x += code - 128;
        } else if code == 0 {
            return Err(IoError::hdr("empty literal packet"));
        } else {
            let dst = plane
                .get_mut(x..x + code)
                .ok_or_else(|| IoError::hdr("literal crosses the scanline end"))?;
            data.read_exact(dst).map_err(truncated)?;
            x += code;
        }
    }
    Ok(())
}

fn encode_scanline(out: &mut Vec<u8>, scanline: &[Rgbe]) -> io::Result<()> {
    let width = scanline.len();
    if !RLE_WIDTHS.contains(&width) {
        out.extend(scanline.iter().flat_map(|p| p.0));
        return Ok(());
    }
    out.write_u8(2)?;
    out.write_u8(2)?;
    out.write_u16::<BigEndian>(width as u16)?;
    let mut plane = Vec::with_capacity(width);
    for c in 0..4 {
        plane.clear();
        plane.extend(scanline.iter().map(|p| p.0[c]));
        pack_plane(out, &plane);
    }
    Ok(())
}

/// Length of the run of equal bytes at the start of `data`, at most 127.
fn run_length(data: &[u8]) -> usize {
    data.iter().take(127).take_while(|&&b| b == data[0]).count()
}

fn pack_plane(out: &mut Vec<u8>, data: &[u8]) {
    let mut i = 0;
    while i < data.len() {
        let run = run_length(&data[i..]);
        if run >= MIN_RUN {
            out.extend_from_slice(&[128 + run as u8, data[i]]);
            i += run;
            continue;
        }
        let start = i;
        while i < data.len() && i - start < 128 && run_length(&data[i..]) < MIN_RUN {
            i += 1;
        }
        out.push((i - start) as u8);
        out.extend_from_slice(&data[start..i]);
    }
}

/// Parses `<slow> <n> <fast> <m>` into `(width, height, orientation)`.
fn parse_resolution(line: &str) -> Option<(u32, u32, Orientation)> {
    let mut parts = line.split_whitespace();
    let (slow, slow_len, fast, fast_len) =
        (parts.next()?, parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }
    let slow_len: u32 = slow_len.parse().ok()?;
    let fast_len: u32 = fast_len.parse().ok()?;
    if slow_len == 0 || fast_len == 0 {
        return None;
    }
    let (_, _, orientation) = AXES.iter().find(|(s, f, _)| *s == slow && *f == fast)?;
    Some((fast_len, slow_len, *orientation))
}

fn resolution_line(orientation: Orientation, width: u32, height: u32) -> String {
    let (slow, fast) = AXES
        .iter()
        .find(|(_, _, o)| *o == orientation)
        .map(|(s, f, _)| (*s, *f))
        .unwrap_or(("-Y", "+X"));
    format!("{slow} {height} {fast} {width}")
}
