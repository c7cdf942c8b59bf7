//! Expansion of indexed-color frames into true-color bitmaps.

use crate::error::{CoreError, Result};
use crate::types::{Palette, PixelBuffer};

/// Looks up every index in the three palette planes, producing interleaved
/// RGB8 samples. Components stored above 8-bit precision are downscaled by
/// integer division by 256.
pub fn expand_indexed(indices: &[u8], palette: &Palette) -> Result<Vec<u8>> {
    let mut rgb = Vec::with_capacity(indices.len() * 3);
    for &index in indices {
        let i = index as usize;
        if i >= palette.len() {
            return Err(CoreError::PaletteIndex {
                index: i,
                len: palette.len(),
            });
        }
        rgb.push(palette.component(palette.red[i]));
        rgb.push(palette.component(palette.green[i]));
        rgb.push(palette.component(palette.blue[i]));
    }
    Ok(rgb)
}

/// Returns the expanded buffer for an indexed page, `None` for any other
/// pixel layout (those pass through unchanged).
pub fn expand_page(pixels: &PixelBuffer) -> Result<Option<PixelBuffer>> {
    match pixels {
        PixelBuffer::Indexed8 { indices, palette } => {
            Ok(Some(PixelBuffer::Rgb8(expand_indexed(indices, palette)?)))
        }
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette8() -> Palette {
        Palette {
            bit_depth: 8,
            red: vec![10, 20],
            green: vec![30, 40],
            blue: vec![50, 60],
        }
    }

    #[test]
    fn expands_eight_bit_palette_verbatim() {
        let rgb = expand_indexed(&[0, 1], &palette8()).unwrap();
        assert_eq!(rgb, vec![10, 30, 50, 20, 40, 60]);
    }

    #[test]
    fn downscales_sixteen_bit_palette() {
        let palette = Palette {
            bit_depth: 16,
            red: vec![10 * 256, 20 * 256],
            green: vec![30 * 256, 40 * 256],
            blue: vec![50 * 256, 60 * 256],
        };
        let rgb = expand_indexed(&[1, 0], &palette).unwrap();
        assert_eq!(rgb, vec![20, 40, 60, 10, 30, 50]);
    }

    #[test]
    fn out_of_range_index_is_an_error() {
        let err = expand_indexed(&[0, 2], &palette8()).unwrap_err();
        assert!(matches!(err, CoreError::PaletteIndex { index: 2, len: 2 }));
    }

    #[test]
    fn expand_page_converts_only_indexed_buffers() {
        let indexed = PixelBuffer::Indexed8 {
            indices: vec![0, 1],
            palette: palette8(),
        };
        let expanded = expand_page(&indexed).unwrap().unwrap();
        assert_eq!(expanded, PixelBuffer::Rgb8(vec![10, 30, 50, 20, 40, 60]));

        assert_eq!(expand_page(&PixelBuffer::Gray16(vec![7])).unwrap(), None);
    }
}
