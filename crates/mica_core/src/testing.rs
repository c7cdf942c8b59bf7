//! Synthetic container builders for tests.
//!
//! Hand-assembles little-endian classic TIFF bytes so tests across the
//! workspace can fabricate multi-page containers with instrument tags,
//! palettes, and float data without touching real instrument output.

use crate::types::{CHANNEL_NAME_TAG, SCAN_SETTINGS_TAG};

const TYPE_ASCII: u16 = 2;
const TYPE_SHORT: u16 = 3;
const TYPE_LONG: u16 = 4;

#[derive(Debug, Clone)]
enum FixturePixels {
    Gray8(Vec<u8>),
    Gray16(Vec<u16>),
    GrayF32(Vec<f32>),
    Indexed8 {
        indices: Vec<u8>,
        red: Vec<u16>,
        green: Vec<u16>,
        blue: Vec<u16>,
    },
}

/// One synthetic page; build with the typed constructors, then chain
/// [`PageFixture::channel`] / [`PageFixture::scan_settings`].
#[derive(Debug, Clone)]
pub struct PageFixture {
    pub width: u32,
    pub height: u32,
    pub compression: u16,
    pixels: FixturePixels,
    channel: Option<String>,
    scan_settings: Option<String>,
}

impl PageFixture {
    #[must_use]
    pub fn gray8(width: u32, height: u32, samples: &[u8]) -> Self {
        Self::new(width, height, FixturePixels::Gray8(samples.to_vec()))
    }

    #[must_use]
    pub fn gray16(width: u32, height: u32, samples: &[u16]) -> Self {
        Self::new(width, height, FixturePixels::Gray16(samples.to_vec()))
    }

    #[must_use]
    pub fn gray_f32(width: u32, height: u32, samples: &[f32]) -> Self {
        Self::new(width, height, FixturePixels::GrayF32(samples.to_vec()))
    }

    #[must_use]
    pub fn indexed8(
        width: u32,
        height: u32,
        indices: &[u8],
        red: &[u16],
        green: &[u16],
        blue: &[u16],
    ) -> Self {
        Self::new(
            width,
            height,
            FixturePixels::Indexed8 {
                indices: indices.to_vec(),
                red: red.to_vec(),
                green: green.to_vec(),
                blue: blue.to_vec(),
            },
        )
    }

    fn new(width: u32, height: u32, pixels: FixturePixels) -> Self {
        Self {
            width,
            height,
            compression: 1,
            pixels,
            channel: None,
            scan_settings: None,
        }
    }

    #[must_use]
    pub fn channel(mut self, name: &str) -> Self {
        self.channel = Some(name.to_string());
        self
    }

    #[must_use]
    pub fn scan_settings(mut self, text: &str) -> Self {
        self.scan_settings = Some(text.to_string());
        self
    }
}

struct Entry {
    code: u16,
    field_type: u16,
    count: u32,
    payload: Vec<u8>,
}

impl Entry {
    fn short(code: u16, value: u16) -> Self {
        Self::shorts(code, &[value])
    }

    fn shorts(code: u16, values: &[u16]) -> Self {
        let mut payload = Vec::with_capacity(values.len() * 2);
        for value in values {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        Self {
            code,
            field_type: TYPE_SHORT,
            count: values.len() as u32,
            payload,
        }
    }

    fn long(code: u16, value: u32) -> Self {
        Self {
            code,
            field_type: TYPE_LONG,
            count: 1,
            payload: value.to_le_bytes().to_vec(),
        }
    }

    fn ascii(code: u16, text: &str) -> Self {
        let mut payload = text.as_bytes().to_vec();
        payload.push(0);
        Self {
            code,
            field_type: TYPE_ASCII,
            count: payload.len() as u32,
            payload,
        }
    }
}

/// Serializes the fixtures into one little-endian TIFF container, pages
/// chained in the given order.
#[must_use]
pub fn build_container(pages: &[PageFixture]) -> Vec<u8> {
    let mut out = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
    let mut next_ifd_ptr = 4usize;

    for page in pages {
        pad_to_even(&mut out);
        let strip_offset = out.len() as u32;
        let strip = encode_samples(&page.pixels);
        out.extend_from_slice(&strip);

        let mut entries = page_entries(page, strip_offset, strip.len() as u32);
        entries.sort_by_key(|entry| entry.code);

        // Spill payloads wider than the 4-byte inline field.
        let mut fields = Vec::with_capacity(entries.len());
        for entry in &entries {
            let mut field = [0u8; 4];
            if entry.payload.len() <= 4 {
                field[..entry.payload.len()].copy_from_slice(&entry.payload);
            } else {
                pad_to_even(&mut out);
                field.copy_from_slice(&(out.len() as u32).to_le_bytes());
                out.extend_from_slice(&entry.payload);
            }
            fields.push((entry.code, entry.field_type, entry.count, field));
        }

        pad_to_even(&mut out);
        let ifd_offset = out.len() as u32;
        out[next_ifd_ptr..next_ifd_ptr + 4].copy_from_slice(&ifd_offset.to_le_bytes());

        out.extend_from_slice(&(fields.len() as u16).to_le_bytes());
        for (code, field_type, count, field) in fields {
            out.extend_from_slice(&code.to_le_bytes());
            out.extend_from_slice(&field_type.to_le_bytes());
            out.extend_from_slice(&count.to_le_bytes());
            out.extend_from_slice(&field);
        }
        next_ifd_ptr = out.len();
        out.extend_from_slice(&[0, 0, 0, 0]);
    }

    out
}

fn pad_to_even(out: &mut Vec<u8>) {
    if out.len() % 2 == 1 {
        out.push(0);
    }
}

fn encode_samples(pixels: &FixturePixels) -> Vec<u8> {
    match pixels {
        FixturePixels::Gray8(samples) => samples.clone(),
        FixturePixels::Gray16(samples) => {
            let mut bytes = Vec::with_capacity(samples.len() * 2);
            for sample in samples {
                bytes.extend_from_slice(&sample.to_le_bytes());
            }
            bytes
        }
        FixturePixels::GrayF32(samples) => {
            let mut bytes = Vec::with_capacity(samples.len() * 4);
            for sample in samples {
                bytes.extend_from_slice(&sample.to_bits().to_le_bytes());
            }
            bytes
        }
        FixturePixels::Indexed8 { indices, .. } => indices.clone(),
    }
}

fn page_entries(page: &PageFixture, strip_offset: u32, strip_len: u32) -> Vec<Entry> {
    let mut entries = vec![
        Entry::long(256, page.width),
        Entry::long(257, page.height),
        Entry::short(259, page.compression),
        Entry::long(273, strip_offset),
        Entry::long(278, page.height),
        Entry::long(279, strip_len),
    ];

    match &page.pixels {
        FixturePixels::Gray8(_) => {
            entries.push(Entry::short(258, 8));
            entries.push(Entry::short(262, 1));
            entries.push(Entry::short(277, 1));
        }
        FixturePixels::Gray16(_) => {
            entries.push(Entry::short(258, 16));
            entries.push(Entry::short(262, 1));
            entries.push(Entry::short(277, 1));
        }
        FixturePixels::GrayF32(_) => {
            entries.push(Entry::short(258, 32));
            entries.push(Entry::short(262, 1));
            entries.push(Entry::short(277, 1));
            entries.push(Entry::short(339, 3));
        }
        FixturePixels::Indexed8 {
            red, green, blue, ..
        } => {
            entries.push(Entry::short(258, 8));
            entries.push(Entry::short(262, 3));
            entries.push(Entry::short(277, 1));
            let mut map = Vec::with_capacity(red.len() * 3);
            map.extend_from_slice(red);
            map.extend_from_slice(green);
            map.extend_from_slice(blue);
            entries.push(Entry::shorts(320, &map));
        }
    }

    if let Some(channel) = &page.channel {
        entries.push(Entry::ascii(CHANNEL_NAME_TAG, channel));
    }
    if let Some(settings) = &page.scan_settings {
        entries.push(Entry::ascii(SCAN_SETTINGS_TAG, settings));
    }
    entries
}
