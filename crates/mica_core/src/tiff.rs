//! Baseline TIFF container reader.
//!
//! Walks the IFD chain of a classic TIFF file (either byte order) and
//! materializes every frame as a [`Page`]: the full tag dictionary plus a
//! typed pixel buffer assembled from uncompressed strips. A frame that
//! cannot be decoded is reported as a per-page failure next to its decoded
//! siblings; only a broken file header or IFD structure fails the whole
//! container.

use crate::error::{CoreError, Result};
use crate::types::{Container, Page, PageFailure, Palette, PixelBuffer, TagEntry, TagValue};

pub const TAG_IMAGE_WIDTH: u16 = 256;
pub const TAG_IMAGE_LENGTH: u16 = 257;
pub const TAG_BITS_PER_SAMPLE: u16 = 258;
pub const TAG_COMPRESSION: u16 = 259;
pub const TAG_PHOTOMETRIC: u16 = 262;
pub const TAG_IMAGE_DESCRIPTION: u16 = 270;
pub const TAG_STRIP_OFFSETS: u16 = 273;
pub const TAG_SAMPLES_PER_PIXEL: u16 = 277;
pub const TAG_ROWS_PER_STRIP: u16 = 278;
pub const TAG_STRIP_BYTE_COUNTS: u16 = 279;
pub const TAG_COLOR_MAP: u16 = 320;
pub const TAG_SAMPLE_FORMAT: u16 = 339;

pub const PHOTOMETRIC_RGB: u32 = 2;
pub const PHOTOMETRIC_PALETTE: u32 = 3;

pub const COMPRESSION_NONE: u32 = 1;
pub const SAMPLE_FORMAT_UINT: u32 = 1;
pub const SAMPLE_FORMAT_FLOAT: u32 = 3;

const TIFF_MAGIC: u16 = 42;
const MAX_PAGES: usize = 4096;
const MAX_IFD_ENTRIES: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ByteOrder {
    Little,
    Big,
}

struct RawFile<'a> {
    data: &'a [u8],
    order: ByteOrder,
}

impl<'a> RawFile<'a> {
    fn open(data: &'a [u8]) -> Result<(Self, usize)> {
        if data.len() < 8 {
            return Err(CoreError::InvalidContainer(
                "file shorter than a TIFF header".into(),
            ));
        }
        let order = match &data[0..2] {
            b"II" => ByteOrder::Little,
            b"MM" => ByteOrder::Big,
            _ => {
                return Err(CoreError::InvalidContainer(
                    "missing TIFF byte-order mark".into(),
                ))
            }
        };
        let file = Self { data, order };
        if file.u16_at(2)? != TIFF_MAGIC {
            return Err(CoreError::InvalidContainer("bad TIFF magic number".into()));
        }
        let first_ifd = file.u32_at(4)? as usize;
        Ok((file, first_ifd))
    }

    fn bytes(&self, offset: usize, len: usize) -> Result<&'a [u8]> {
        let end = offset.checked_add(len).ok_or(CoreError::OutOfBounds {
            offset: offset as u64,
            max: self.data.len() as u64,
        })?;
        self.data.get(offset..end).ok_or(CoreError::OutOfBounds {
            offset: end as u64,
            max: self.data.len() as u64,
        })
    }

    fn u16_at(&self, offset: usize) -> Result<u16> {
        let b = self.bytes(offset, 2)?;
        Ok(match self.order {
            ByteOrder::Little => u16::from_le_bytes([b[0], b[1]]),
            ByteOrder::Big => u16::from_be_bytes([b[0], b[1]]),
        })
    }

    fn u32_at(&self, offset: usize) -> Result<u32> {
        let b = self.bytes(offset, 4)?;
        Ok(match self.order {
            ByteOrder::Little => u32::from_le_bytes([b[0], b[1], b[2], b[3]]),
            ByteOrder::Big => u32::from_be_bytes([b[0], b[1], b[2], b[3]]),
        })
    }
}

/// Decodes a container file into its ordered page list.
pub fn parse_container(data: &[u8]) -> Result<Container> {
    let (file, first_ifd) = RawFile::open(data)?;

    let mut pages = Vec::new();
    let mut page_failures = Vec::new();
    let mut ifd_offset = first_ifd;
    let mut index = 0usize;

    while ifd_offset != 0 {
        if index >= MAX_PAGES {
            return Err(CoreError::InvalidContainer(format!(
                "more than {} pages (cyclic IFD chain?)",
                MAX_PAGES
            )));
        }
        let (tags, next) = read_ifd(&file, ifd_offset)?;
        match build_page(&file, index, tags) {
            Ok(page) => pages.push(page),
            Err(error) => page_failures.push(PageFailure { index, error }),
        }
        ifd_offset = next;
        index += 1;
    }

    Ok(Container {
        pages,
        page_failures,
    })
}

/// Well-known baseline tag names; private instrument tags fall back to a
/// stable `Tag<code>` form.
#[must_use]
pub fn tag_name(code: u16) -> String {
    match known_tag_name(code) {
        Some(name) => name.to_string(),
        None => format!("Tag{}", code),
    }
}

fn known_tag_name(code: u16) -> Option<&'static str> {
    Some(match code {
        254 => "NewSubfileType",
        255 => "SubfileType",
        256 => "ImageWidth",
        257 => "ImageLength",
        258 => "BitsPerSample",
        259 => "Compression",
        262 => "PhotometricInterpretation",
        266 => "FillOrder",
        270 => "ImageDescription",
        271 => "Make",
        272 => "Model",
        273 => "StripOffsets",
        274 => "Orientation",
        277 => "SamplesPerPixel",
        278 => "RowsPerStrip",
        279 => "StripByteCounts",
        282 => "XResolution",
        283 => "YResolution",
        284 => "PlanarConfiguration",
        296 => "ResolutionUnit",
        305 => "Software",
        306 => "DateTime",
        315 => "Artist",
        320 => "ColorMap",
        339 => "SampleFormat",
        _ => return None,
    })
}

fn read_ifd(file: &RawFile<'_>, offset: usize) -> Result<(Vec<TagEntry>, usize)> {
    let count = file.u16_at(offset)? as usize;
    if count > MAX_IFD_ENTRIES {
        return Err(CoreError::InvalidContainer(format!(
            "IFD claims {} entries",
            count
        )));
    }

    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let base = offset + 2 + i * 12;
        let code = file.u16_at(base)?;
        let field_type = file.u16_at(base + 2)?;
        let value_count = file.u32_at(base + 4)? as usize;
        // An entry whose value bytes cannot be read stays in the dictionary
        // as data; it must not take the rest of the page down with it.
        let value = match read_value(file, base + 8, field_type, value_count) {
            Ok(value) => value,
            Err(error) => TagValue::Unreadable(error.to_string()),
        };
        entries.push(TagEntry { code, value });
    }

    let next = file.u32_at(offset + 2 + count * 12)? as usize;
    Ok((entries, next))
}

const fn type_size(field_type: u16) -> Option<usize> {
    match field_type {
        1 | 2 | 6 | 7 => Some(1),
        3 | 8 => Some(2),
        4 | 9 | 11 => Some(4),
        5 | 10 | 12 => Some(8),
        _ => None,
    }
}

fn read_value(
    file: &RawFile<'_>,
    value_field: usize,
    field_type: u16,
    count: usize,
) -> Result<TagValue> {
    let size = type_size(field_type).ok_or_else(|| {
        CoreError::InvalidContainer(format!("unknown tag field type {}", field_type))
    })?;
    let total = size
        .checked_mul(count)
        .ok_or_else(|| CoreError::InvalidContainer("tag value size overflow".into()))?;

    let bytes = if total <= 4 {
        &file.bytes(value_field, 4)?[..total]
    } else {
        let offset = file.u32_at(value_field)? as usize;
        file.bytes(offset, total)?
    };

    let order = file.order;
    Ok(match field_type {
        1 => TagValue::Byte(bytes.to_vec()),
        2 => TagValue::Ascii(decode_ascii(bytes)),
        3 => TagValue::Short(u16_values(order, bytes)),
        4 => TagValue::Long(u32_values(order, bytes)),
        5 => TagValue::Rational(u32_pairs(order, bytes)),
        6 => TagValue::SByte(bytes.iter().map(|&b| b as i8).collect()),
        7 => TagValue::Undefined(bytes.to_vec()),
        8 => TagValue::SShort(i16_values(order, bytes)),
        9 => TagValue::SLong(i32_values(order, bytes)),
        10 => TagValue::SRational(i32_pairs(order, bytes)),
        11 => TagValue::Float(f32_values(order, bytes)),
        12 => TagValue::Double(f64_values(order, bytes)),
        other => {
            return Err(CoreError::InvalidContainer(format!(
                "unknown tag field type {}",
                other
            )))
        }
    })
}

fn decode_ascii(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .trim_end_matches('\0')
        .to_string()
}

fn u16_values(order: ByteOrder, bytes: &[u8]) -> Vec<u16> {
    bytes
        .chunks_exact(2)
        .map(|c| match order {
            ByteOrder::Little => u16::from_le_bytes([c[0], c[1]]),
            ByteOrder::Big => u16::from_be_bytes([c[0], c[1]]),
        })
        .collect()
}

fn i16_values(order: ByteOrder, bytes: &[u8]) -> Vec<i16> {
    u16_values(order, bytes).into_iter().map(|v| v as i16).collect()
}

fn u32_values(order: ByteOrder, bytes: &[u8]) -> Vec<u32> {
    bytes
        .chunks_exact(4)
        .map(|c| match order {
            ByteOrder::Little => u32::from_le_bytes([c[0], c[1], c[2], c[3]]),
            ByteOrder::Big => u32::from_be_bytes([c[0], c[1], c[2], c[3]]),
        })
        .collect()
}

fn i32_values(order: ByteOrder, bytes: &[u8]) -> Vec<i32> {
    u32_values(order, bytes).into_iter().map(|v| v as i32).collect()
}

fn f32_values(order: ByteOrder, bytes: &[u8]) -> Vec<f32> {
    u32_values(order, bytes)
        .into_iter()
        .map(f32::from_bits)
        .collect()
}

fn f64_values(order: ByteOrder, bytes: &[u8]) -> Vec<f64> {
    bytes
        .chunks_exact(8)
        .map(|c| {
            let raw = [c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]];
            match order {
                ByteOrder::Little => f64::from_bits(u64::from_le_bytes(raw)),
                ByteOrder::Big => f64::from_bits(u64::from_be_bytes(raw)),
            }
        })
        .collect()
}

fn u32_pairs(order: ByteOrder, bytes: &[u8]) -> Vec<(u32, u32)> {
    let values = u32_values(order, bytes);
    values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

fn i32_pairs(order: ByteOrder, bytes: &[u8]) -> Vec<(i32, i32)> {
    let values = i32_values(order, bytes);
    values.chunks_exact(2).map(|c| (c[0], c[1])).collect()
}

fn find_tag<'t>(tags: &'t [TagEntry], code: u16) -> Option<&'t TagValue> {
    tags.iter().find(|entry| entry.code == code).map(|e| &e.value)
}

fn tag_u32(tags: &[TagEntry], code: u16) -> Option<u32> {
    match find_tag(tags, code)? {
        TagValue::Short(values) => values.first().map(|&v| u32::from(v)),
        TagValue::Long(values) => values.first().copied(),
        _ => None,
    }
}

fn tag_u32_list(tags: &[TagEntry], code: u16) -> Option<Vec<u32>> {
    match find_tag(tags, code)? {
        TagValue::Short(values) => Some(values.iter().map(|&v| u32::from(v)).collect()),
        TagValue::Long(values) => Some(values.clone()),
        _ => None,
    }
}

fn build_page(file: &RawFile<'_>, index: usize, tags: Vec<TagEntry>) -> Result<Page> {
    let width = tag_u32(&tags, TAG_IMAGE_WIDTH)
        .ok_or_else(|| CoreError::UnsupportedPage("missing ImageWidth".into()))?;
    let height = tag_u32(&tags, TAG_IMAGE_LENGTH)
        .ok_or_else(|| CoreError::UnsupportedPage("missing ImageLength".into()))?;

    let compression = tag_u32(&tags, TAG_COMPRESSION).unwrap_or(COMPRESSION_NONE);
    if compression != COMPRESSION_NONE {
        return Err(CoreError::UnsupportedPage(format!(
            "compression scheme {}",
            compression
        )));
    }

    let samples = tag_u32(&tags, TAG_SAMPLES_PER_PIXEL).unwrap_or(1) as usize;
    let bits = match find_tag(&tags, TAG_BITS_PER_SAMPLE) {
        Some(TagValue::Short(values)) if !values.is_empty() => values.clone(),
        None => vec![1],
        _ => {
            return Err(CoreError::UnsupportedPage(
                "malformed BitsPerSample".into(),
            ))
        }
    };
    let sample_format = match find_tag(&tags, TAG_SAMPLE_FORMAT) {
        Some(TagValue::Short(values)) => values.first().map_or(SAMPLE_FORMAT_UINT, |&v| u32::from(v)),
        _ => SAMPLE_FORMAT_UINT,
    };
    let photometric = tag_u32(&tags, TAG_PHOTOMETRIC).unwrap_or(1);

    let raw = read_strips(file, &tags, width, height, samples, &bits)?;
    let pixels = build_pixels(file.order, photometric, samples, &bits, sample_format, raw, &tags)?;

    Ok(Page {
        index,
        width,
        height,
        pixels,
        tags,
    })
}

fn read_strips(
    file: &RawFile<'_>,
    tags: &[TagEntry],
    width: u32,
    height: u32,
    samples: usize,
    bits: &[u16],
) -> Result<Vec<u8>> {
    let offsets = tag_u32_list(tags, TAG_STRIP_OFFSETS)
        .ok_or_else(|| CoreError::UnsupportedPage("missing StripOffsets".into()))?;
    let counts = tag_u32_list(tags, TAG_STRIP_BYTE_COUNTS)
        .ok_or_else(|| CoreError::UnsupportedPage("missing StripByteCounts".into()))?;
    if offsets.len() != counts.len() {
        return Err(CoreError::UnsupportedPage(format!(
            "{} strip offsets but {} byte counts",
            offsets.len(),
            counts.len()
        )));
    }

    let bytes_per_sample = usize::from(bits[0]) / 8;
    let expected =
        u64::from(width) * u64::from(height) * samples as u64 * bytes_per_sample as u64;
    if expected > file.data.len() as u64 {
        return Err(CoreError::UnsupportedPage(format!(
            "pixel data larger than the container ({} bytes)",
            expected
        )));
    }
    let expected = expected as usize;

    let mut raw = Vec::with_capacity(expected);
    for (&offset, &count) in offsets.iter().zip(&counts) {
        raw.extend_from_slice(file.bytes(offset as usize, count as usize)?);
    }
    if raw.len() < expected {
        return Err(CoreError::UnsupportedPage(format!(
            "pixel data truncated: {} of {} bytes",
            raw.len(),
            expected
        )));
    }
    raw.truncate(expected);
    Ok(raw)
}

fn build_pixels(
    order: ByteOrder,
    photometric: u32,
    samples: usize,
    bits: &[u16],
    sample_format: u32,
    raw: Vec<u8>,
    tags: &[TagEntry],
) -> Result<PixelBuffer> {
    match photometric {
        PHOTOMETRIC_PALETTE => {
            if samples != 1 || bits != [8] {
                return Err(CoreError::UnsupportedPage(format!(
                    "indexed page with {} samples of {:?} bits",
                    samples, bits
                )));
            }
            let palette = color_map(tags)?;
            Ok(PixelBuffer::Indexed8 {
                indices: raw,
                palette,
            })
        }
        0 | 1 => {
            if samples != 1 {
                return Err(CoreError::UnsupportedPage(format!(
                    "{} samples per pixel for a grayscale page",
                    samples
                )));
            }
            match (bits[0], sample_format) {
                (8, SAMPLE_FORMAT_UINT) => Ok(PixelBuffer::Gray8(raw)),
                (16, SAMPLE_FORMAT_UINT) => Ok(PixelBuffer::Gray16(u16_values(order, &raw))),
                (32, SAMPLE_FORMAT_UINT) => Ok(PixelBuffer::Gray32(u32_values(order, &raw))),
                (32, SAMPLE_FORMAT_FLOAT) => Ok(PixelBuffer::GrayF32(f32_values(order, &raw))),
                (depth, format) => Err(CoreError::UnsupportedPage(format!(
                    "{}-bit samples with sample format {}",
                    depth, format
                ))),
            }
        }
        PHOTOMETRIC_RGB => {
            if samples != 3 || bits.iter().any(|&b| b != 8) {
                return Err(CoreError::UnsupportedPage(format!(
                    "RGB page with {} samples of {:?} bits",
                    samples, bits
                )));
            }
            Ok(PixelBuffer::Rgb8(raw))
        }
        other => Err(CoreError::UnsupportedPage(format!(
            "photometric interpretation {}",
            other
        ))),
    }
}

fn color_map(tags: &[TagEntry]) -> Result<Palette> {
    let values = match find_tag(tags, TAG_COLOR_MAP) {
        Some(TagValue::Short(values)) => values,
        _ => {
            return Err(CoreError::UnsupportedPage(
                "indexed page without a color map".into(),
            ))
        }
    };
    if values.is_empty() || values.len() % 3 != 0 {
        return Err(CoreError::UnsupportedPage(format!(
            "color map with {} entries",
            values.len()
        )));
    }
    let plane = values.len() / 3;
    Ok(Palette {
        bit_depth: 16,
        red: values[..plane].to_vec(),
        green: values[plane..2 * plane].to_vec(),
        blue: values[2 * plane..].to_vec(),
    })
}
