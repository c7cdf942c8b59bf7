//! Persists one output unit: a TIFF image with the composed metadata
//! embedded as its description, plus the same record as a sidecar text file.

use mica_core::naming::UnitPaths;
use mica_core::PixelBuffer;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::Path;
use thiserror::Error;
use tiff::encoder::{colortype, colortype::ColorType, TiffEncoder, TiffValue};
use tiff::tags::Tag;

#[derive(Debug, Error)]
pub enum WriteError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF encoding error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Indexed buffer must be palette-expanded before writing")]
    IndexedBuffer,
}

/// Writes the image and metadata artifacts at their derived paths, creating
/// missing directories on the way. Directory creation is create-if-absent
/// and same-path artifacts are overwritten, so re-runs and concurrent
/// pipelines sharing the destination tree are safe.
pub fn write_unit(
    paths: &UnitPaths,
    width: u32,
    height: u32,
    pixels: &PixelBuffer,
    description: &str,
) -> Result<(), WriteError> {
    ensure_parent(&paths.image)?;
    ensure_parent(&paths.metadata)?;
    write_image(&paths.image, width, height, pixels, description)?;
    fs::write(&paths.metadata, description)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<(), WriteError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_image(
    path: &Path,
    width: u32,
    height: u32,
    pixels: &PixelBuffer,
    description: &str,
) -> Result<(), WriteError> {
    let file = File::create(path)?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;

    match pixels {
        PixelBuffer::Gray8(data) => {
            encode::<colortype::Gray8>(&mut encoder, width, height, data, description)
        }
        PixelBuffer::Gray16(data) => {
            encode::<colortype::Gray16>(&mut encoder, width, height, data, description)
        }
        PixelBuffer::Gray32(data) => {
            encode::<colortype::Gray32>(&mut encoder, width, height, data, description)
        }
        PixelBuffer::GrayF32(data) => {
            encode::<colortype::Gray32Float>(&mut encoder, width, height, data, description)
        }
        PixelBuffer::Rgb8(data) => {
            encode::<colortype::RGB8>(&mut encoder, width, height, data, description)
        }
        PixelBuffer::Indexed8 { .. } => Err(WriteError::IndexedBuffer),
    }
}

fn encode<C>(
    encoder: &mut TiffEncoder<BufWriter<File>>,
    width: u32,
    height: u32,
    data: &[C::Inner],
    description: &str,
) -> Result<(), WriteError>
where
    C: ColorType,
    [C::Inner]: TiffValue,
{
    let mut image = encoder.new_image::<C>(width, height)?;
    image.encoder().write_tag(Tag::ImageDescription, description)?;
    image.write_data(data)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mica_core::naming::{unit_paths, UnitPaths};
    use mica_core::tiff::{parse_container, TAG_IMAGE_DESCRIPTION};
    use mica_core::{Palette, Role};
    use tempfile::TempDir;

    fn paths_in(dir: &TempDir) -> UnitPaths {
        unit_paths(dir.path(), "scan01", "Height", Role::Trace)
    }

    #[test]
    fn writes_both_artifacts_under_the_unit_layout() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let pixels = PixelBuffer::Gray8(vec![1, 2, 3, 4, 5, 6]);

        write_unit(&paths, 3, 2, &pixels, "record text").unwrap();

        assert!(paths.image.is_file());
        assert!(paths.metadata.is_file());
        assert_eq!(fs::read_to_string(&paths.metadata).unwrap(), "record text");
    }

    #[test]
    fn written_image_round_trips_with_description() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let pixels = PixelBuffer::Gray16(vec![100, 2000, 30000, 65000]);

        write_unit(&paths, 2, 2, &pixels, "embedded record").unwrap();

        let data = fs::read(&paths.image).unwrap();
        let container = parse_container(&data).unwrap();
        assert_eq!(container.pages.len(), 1);

        let page = &container.pages[0];
        assert_eq!((page.width, page.height), (2, 2));
        assert_eq!(page.pixels, pixels);
        assert_eq!(page.tag_text(TAG_IMAGE_DESCRIPTION), Some("embedded record"));
    }

    #[test]
    fn float_pixels_round_trip() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let pixels = PixelBuffer::GrayF32(vec![0.25, -1.5, 3.75, 0.0]);

        write_unit(&paths, 2, 2, &pixels, "float page").unwrap();

        let data = fs::read(&paths.image).unwrap();
        let container = parse_container(&data).unwrap();
        assert_eq!(container.pages[0].pixels, pixels);
    }

    #[test]
    fn rewriting_the_same_unit_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let pixels = PixelBuffer::Rgb8(vec![10, 30, 50, 20, 40, 60]);

        write_unit(&paths, 2, 1, &pixels, "same record").unwrap();
        let first = fs::read(&paths.image).unwrap();
        let first_meta = fs::read(&paths.metadata).unwrap();

        write_unit(&paths, 2, 1, &pixels, "same record").unwrap();
        assert_eq!(fs::read(&paths.image).unwrap(), first);
        assert_eq!(fs::read(&paths.metadata).unwrap(), first_meta);
    }

    #[test]
    fn indexed_buffers_are_rejected() {
        let dir = TempDir::new().unwrap();
        let paths = paths_in(&dir);
        let pixels = PixelBuffer::Indexed8 {
            indices: vec![0],
            palette: Palette {
                bit_depth: 8,
                red: vec![1],
                green: vec![2],
                blue: vec![3],
            },
        };

        let err = write_unit(&paths, 1, 1, &pixels, "x").unwrap_err();
        assert!(matches!(err, WriteError::IndexedBuffer));
    }
}
