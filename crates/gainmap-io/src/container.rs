//! Gain map container (`.gmap`).
//!
//! A container holds an SDR base image, an optional gain map and the base
//! image's metadata attributes (maker fields among them). Both planes are
//! stored as PNG streams; the gain map sample width depends on the
//! [`EncoderStrategy`] that wrote the file.
//!
//! # Layout
//!
//! ```text
//! magic        "GMAP"            4 bytes
//! version      u16 LE            currently 1
//! strategy     u8                0 = legacy (8-bit gain map), 1 = 10-bit
//! quality      u8                0..=100
//! orientation  u8                EXIF value
//! color space  u8 len + utf-8
//! gain range   f32 LE x2         log2 min/max of the recovery curve
//! attrs        u16 count, then per entry:
//!              u16 key len + key, u8 kind, value
//! base         u32 len + PNG     8-bit sRGB RGB
//! gain map     u32 len + PNG     0 length = absent
//! ```

use crate::png::{self as png_codec, Raster};
use crate::{IoError, IoResult};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use gainmap_core::pixel::srgb_eotf;
use gainmap_core::{AttrValue, Attrs, ColorSpaceId, Image, Orientation};
use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Cursor, Read, Write};
use std::path::Path;
use std::str::FromStr;

const MAGIC: &[u8; 4] = b"GMAP";
const VERSION: u16 = 1;

/// Container-writing entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EncoderStrategy {
    /// 8-bit gain map samples.
    Legacy,
    /// 10-bit gain map codes carried in 16-bit samples.
    TenBit,
}

impl EncoderStrategy {
    /// Every strategy, in declaration order.
    pub const ALL: [EncoderStrategy; 2] = [EncoderStrategy::Legacy, EncoderStrategy::TenBit];

    /// Short name used in logs and configuration.
    pub fn name(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::TenBit => "10bit",
        }
    }

    fn tag(self) -> u8 {
        match self {
            Self::Legacy => 0,
            Self::TenBit => 1,
        }
    }

    fn from_tag(tag: u8) -> IoResult<Self> {
        match tag {
            0 => Ok(Self::Legacy),
            1 => Ok(Self::TenBit),
            t => Err(IoError::container(format!("unknown encoder strategy tag {t}"))),
        }
    }

    /// Largest gain map code this strategy stores.
    pub fn max_code(self) -> u16 {
        match self {
            Self::Legacy => 255,
            Self::TenBit => 1023,
        }
    }
}

impl fmt::Display for EncoderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EncoderStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "legacy" | "8bit" | "a" => Ok(Self::Legacy),
            "10bit" | "tenbit" | "10-bit" | "b" => Ok(Self::TenBit),
            other => Err(format!("unknown encoder strategy: {other}")),
        }
    }
}

/// Gain map plane plus the log2 range its normalized codes span.
#[derive(Debug, Clone)]
pub struct GainMap {
    /// Normalized recovery codes in [0, 1], replicated across RGB.
    pub image: Image,
    /// log2 gain encoded by code 0.
    pub min_log2: f32,
    /// log2 gain encoded by code 1.
    pub max_log2: f32,
}

impl GainMap {
    /// Gain map has a non-empty extent.
    pub fn has_extent(&self) -> bool {
        self.image.width() > 0 && self.image.height() > 0
    }
}

/// In-memory view of a `.gmap` file.
#[derive(Debug, Clone)]
pub struct GainMapContainer {
    /// SDR base image (linear light, metadata carried as attributes).
    pub base: Image,
    /// Auxiliary gain map, if present.
    pub gain_map: Option<GainMap>,
    /// Base image quality in [0, 1].
    pub quality: f32,
    /// Strategy that produced the file.
    pub strategy: EncoderStrategy,
}

/// Writes a container to `path`.
pub fn write<P: AsRef<Path>>(path: P, container: &GainMapContainer) -> IoResult<()> {
    let file = File::create(path.as_ref())?;
    let mut w = BufWriter::new(file);
    write_to(&mut w, container)?;
    w.flush()?;
    Ok(())
}

/// Serializes a container to any writer.
pub fn write_to<W: Write>(w: &mut W, container: &GainMapContainer) -> IoResult<()> {
    let base = &container.base;
    let quality = container.quality.clamp(0.0, 1.0);

    w.write_all(MAGIC)?;
    w.write_u16::<LittleEndian>(VERSION)?;
    w.write_u8(container.strategy.tag())?;
    w.write_u8((quality * 100.0).round() as u8)?;
    w.write_u8(base.orientation().exif_value() as u8)?;
    write_short_str(w, base.color_space().name())?;

    let (min_log2, max_log2) = container
        .gain_map
        .as_ref()
        .map(|g| (g.min_log2, g.max_log2))
        .unwrap_or((0.0, 0.0));
    w.write_f32::<LittleEndian>(min_log2)?;
    w.write_f32::<LittleEndian>(max_log2)?;

    write_attrs(w, base.metadata())?;

    let mut base_png = Vec::new();
    png_codec::encode(&mut base_png, &png_codec::to_srgb_raster(base, quality_step(quality)))?;
    write_blob(w, &base_png)?;

    match &container.gain_map {
        Some(gain) => {
            let mut gain_png = Vec::new();
            png_codec::encode(&mut gain_png, &gain_raster(&gain.image, container.strategy))?;
            write_blob(w, &gain_png)?;
        }
        None => w.write_u32::<LittleEndian>(0)?,
    }
    Ok(())
}

/// Reads a whole container from `path`.
pub fn read<P: AsRef<Path>>(path: P) -> IoResult<GainMapContainer> {
    let file = File::open(path.as_ref())?;
    read_from(&mut BufReader::new(file))
}

/// Deserializes a container from any reader.
pub fn read_from<R: Read>(r: &mut R) -> IoResult<GainMapContainer> {
    let header = read_header(r)?;

    let base_png = read_blob(r)?;
    let raster = png_codec::decode(Cursor::new(base_png.as_slice()))?;
    if raster.channels != 3 {
        return Err(IoError::container("base plane must be RGB"));
    }
    let max = raster.max_value();
    let rgb: Vec<f32> = raster
        .samples
        .iter()
        .map(|&s| srgb_eotf(s as f32 / max))
        .collect();
    let gain_map = read_gain_plane(r, &header)?;
    let base = Image::from_rgb(raster.width, raster.height, &rgb, header.color_space)?
        .with_orientation(header.orientation)
        .with_metadata(header.attrs);

    Ok(GainMapContainer {
        base,
        gain_map,
        quality: header.quality,
        strategy: header.strategy,
    })
}

/// Reads only the gain map of the container at `path`.
///
/// The base plane is skipped without decoding. Returns `Ok(None)` when the
/// file carries no gain map.
pub fn read_gain_map<P: AsRef<Path>>(path: P) -> IoResult<Option<GainMap>> {
    let file = File::open(path.as_ref())?;
    let mut r = BufReader::new(file);
    let header = read_header(&mut r)?;
    let base_len = r.read_u32::<LittleEndian>()? as u64;
    let skipped = io::copy(&mut (&mut r).take(base_len), &mut io::sink())?;
    if skipped != base_len {
        return Err(IoError::container("truncated base plane"));
    }
    read_gain_plane(&mut r, &header)
}

struct Header {
    strategy: EncoderStrategy,
    quality: f32,
    orientation: Orientation,
    color_space: ColorSpaceId,
    min_log2: f32,
    max_log2: f32,
    attrs: Attrs,
}

fn read_header<R: Read>(r: &mut R) -> IoResult<Header> {
    let mut magic = [0u8; 4];
    r.read_exact(&mut magic)?;
    if &magic != MAGIC {
        return Err(IoError::container("gain map container magic not found"));
    }
    let version = r.read_u16::<LittleEndian>()?;
    if version != VERSION {
        return Err(IoError::UnsupportedFormat(format!("container version {version}")));
    }
    let strategy = EncoderStrategy::from_tag(r.read_u8()?)?;
    let quality = r.read_u8()? as f32 / 100.0;
    let orientation = Orientation::from_exif(r.read_u8()? as u16);
    let color_space = read_short_str(r)?
        .parse::<ColorSpaceId>()
        .unwrap_or(ColorSpaceId::Unknown);
    let min_log2 = r.read_f32::<LittleEndian>()?;
    let max_log2 = r.read_f32::<LittleEndian>()?;
    let attrs = read_attrs(r)?;

    Ok(Header {
        strategy,
        quality,
        orientation,
        color_space,
        min_log2,
        max_log2,
        attrs,
    })
}

fn read_gain_plane<R: Read>(r: &mut R, header: &Header) -> IoResult<Option<GainMap>> {
    let gain_png = read_blob(r)?;
    if gain_png.is_empty() {
        return Ok(None);
    }
    let raster = png_codec::decode(Cursor::new(gain_png.as_slice()))?;
    if raster.channels != 1 {
        return Err(IoError::container("gain map plane must be single channel"));
    }
    let (shift, max_code) = match header.strategy {
        EncoderStrategy::Legacy => (0, 255.0),
        EncoderStrategy::TenBit => (6, 1023.0),
    };
    let rgb: Vec<f32> = raster
        .samples
        .iter()
        .flat_map(|&s| {
            let v = (s >> shift) as f32 / max_code;
            [v, v, v]
        })
        .collect();
    let image = Image::from_rgb(raster.width, raster.height, &rgb, ColorSpaceId::Unknown)?;
    Ok(Some(GainMap {
        image,
        min_log2: header.min_log2,
        max_log2: header.max_log2,
    }))
}

/// Gain codes from the red channel of a normalized gain map image.
fn gain_raster(image: &Image, strategy: EncoderStrategy) -> Raster {
    let max_code = strategy.max_code() as f32;
    let (bit_depth, shift) = match strategy {
        EncoderStrategy::Legacy => (8, 0),
        EncoderStrategy::TenBit => (16, 6),
    };
    let samples = image
        .data()
        .chunks_exact(4)
        .map(|px| {
            let v = if px[0].is_finite() { px[0].clamp(0.0, 1.0) } else { 0.0 };
            ((v * max_code).round() as u16) << shift
        })
        .collect();
    Raster {
        width: image.width(),
        height: image.height(),
        channels: 1,
        bit_depth,
        samples,
    }
}

/// Code step applied to the base plane: 1 at full quality, 16 at zero.
fn quality_step(quality: f32) -> u16 {
    1 + ((1.0 - quality) * 15.0).round() as u16
}

const KIND_STR: u8 = 0;
const KIND_UINT: u8 = 1;
const KIND_FLOAT: u8 = 2;
const KIND_DOUBLE: u8 = 3;

fn write_attrs<W: Write>(w: &mut W, attrs: &Attrs) -> IoResult<()> {
    let count = u16::try_from(attrs.len())
        .map_err(|_| IoError::container("too many metadata attributes"))?;
    w.write_u16::<LittleEndian>(count)?;
    for (key, value) in attrs.iter() {
        write_u16_str(w, key)?;
        match value {
            AttrValue::Str(s) => {
                w.write_u8(KIND_STR)?;
                write_blob(w, s.as_bytes())?;
            }
            AttrValue::UInt(v) => {
                w.write_u8(KIND_UINT)?;
                w.write_u32::<LittleEndian>(*v)?;
            }
            AttrValue::Float(v) => {
                w.write_u8(KIND_FLOAT)?;
                w.write_f32::<LittleEndian>(*v)?;
            }
            AttrValue::Double(v) => {
                w.write_u8(KIND_DOUBLE)?;
                w.write_f64::<LittleEndian>(*v)?;
            }
        }
    }
    Ok(())
}

fn read_attrs<R: Read>(r: &mut R) -> IoResult<Attrs> {
    let count = r.read_u16::<LittleEndian>()?;
    let mut attrs = Attrs::new();
    for _ in 0..count {
        let len = r.read_u16::<LittleEndian>()? as usize;
        let key = read_utf8(r, len)?;
        let value = match r.read_u8()? {
            KIND_STR => {
                let len = r.read_u32::<LittleEndian>()? as usize;
                AttrValue::Str(read_utf8(r, len)?)
            }
            KIND_UINT => AttrValue::UInt(r.read_u32::<LittleEndian>()?),
            KIND_FLOAT => AttrValue::Float(r.read_f32::<LittleEndian>()?),
            KIND_DOUBLE => AttrValue::Double(r.read_f64::<LittleEndian>()?),
            k => return Err(IoError::container(format!("unknown attribute kind {k}"))),
        };
        attrs.set(key, value);
    }
    Ok(attrs)
}

fn write_blob<W: Write>(w: &mut W, bytes: &[u8]) -> IoResult<()> {
    let len = u32::try_from(bytes.len())
        .map_err(|_| IoError::container("plane exceeds 4 GiB"))?;
    w.write_u32::<LittleEndian>(len)?;
    w.write_all(bytes)?;
    Ok(())
}

fn read_blob<R: Read>(r: &mut R) -> IoResult<Vec<u8>> {
    let len = r.read_u32::<LittleEndian>()? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(buf)
}

fn write_short_str<W: Write>(w: &mut W, s: &str) -> IoResult<()> {
    let len = u8::try_from(s.len())
        .map_err(|_| IoError::container(format!("string too long: {s}")))?;
    w.write_u8(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_short_str<R: Read>(r: &mut R) -> IoResult<String> {
    let len = r.read_u8()? as usize;
    read_utf8(r, len)
}

fn write_u16_str<W: Write>(w: &mut W, s: &str) -> IoResult<()> {
    let len = u16::try_from(s.len())
        .map_err(|_| IoError::container(format!("key too long: {s}")))?;
    w.write_u16::<LittleEndian>(len)?;
    w.write_all(s.as_bytes())?;
    Ok(())
}

fn read_utf8<R: Read>(r: &mut R, len: usize) -> IoResult<String> {
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).map_err(|e| IoError::container(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use gainmap_core::metadata::keys;

    fn sample_container(strategy: EncoderStrategy, with_gain: bool) -> GainMapContainer {
        let base = Image::filled(8, 4, [0.25, 0.5, 0.75, 1.0], ColorSpaceId::Srgb)
            .with_attr(keys::MAKER_33, AttrValue::Double(1.0))
            .with_attr(keys::MAKER_48, AttrValue::Double(0.0042))
            .with_attr(keys::SOFTWARE, AttrValue::Str("gainmap".into()));
        let gain_map = with_gain.then(|| GainMap {
            image: Image::filled(4, 2, [0.6, 0.6, 0.6, 1.0], ColorSpaceId::Unknown),
            min_log2: 0.0,
            max_log2: 2.5,
        });
        GainMapContainer {
            base,
            gain_map,
            quality: 0.9,
            strategy,
        }
    }

    #[test]
    fn test_roundtrip_both_strategies() {
        for strategy in EncoderStrategy::ALL {
            let container = sample_container(strategy, true);
            let mut bytes = Vec::new();
            write_to(&mut bytes, &container).unwrap();
            let loaded = read_from(&mut Cursor::new(bytes)).unwrap();

            assert_eq!(loaded.strategy, strategy);
            assert_relative_eq!(loaded.quality, 0.9);
            assert_eq!(loaded.base.dimensions(), (8, 4));
            assert_eq!(loaded.base.color_space(), ColorSpaceId::Srgb);
            assert_eq!(loaded.base.metadata(), container.base.metadata());

            let gain = loaded.gain_map.expect("gain map present");
            assert_eq!(gain.image.dimensions(), (4, 2));
            assert_relative_eq!(gain.max_log2, 2.5);
            let tolerance = 1.0 / strategy.max_code() as f32;
            assert_relative_eq!(gain.image.pixel(1, 1)[0], 0.6, epsilon = tolerance);
        }
    }

    #[test]
    fn test_gain_map_only_read() {
        let dir = tempfile::tempdir().unwrap();
        let with = dir.path().join("with.gmap");
        let without = dir.path().join("without.gmap");
        write(&with, &sample_container(EncoderStrategy::TenBit, true)).unwrap();
        write(&without, &sample_container(EncoderStrategy::Legacy, false)).unwrap();

        let gain = read_gain_map(&with).unwrap().expect("gain map");
        assert!(gain.has_extent());
        assert!(read_gain_map(&without).unwrap().is_none());
    }

    #[test]
    fn test_rejects_bad_magic() {
        let err = read_from(&mut Cursor::new(b"NOPE\x01\x00".to_vec())).unwrap_err();
        assert!(matches!(err, IoError::Malformed { .. }));
    }

    #[test]
    fn test_strategy_parse() {
        assert_eq!("legacy".parse(), Ok(EncoderStrategy::Legacy));
        assert_eq!("10bit".parse(), Ok(EncoderStrategy::TenBit));
        assert!("heic".parse::<EncoderStrategy>().is_err());
    }
}
