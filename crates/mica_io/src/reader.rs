//! Read-only access to container file bytes.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Holds one container file fully addressable as a byte slice, memory-mapped
/// when the platform allows it and buffered otherwise (empty files, exotic
/// file systems). The whole file is needed twice per run: once for the
/// printable-string carve and once for structural decoding.
pub enum ContainerReader {
    Mapped(Mmap),
    Buffered(Vec<u8>),
}

impl ContainerReader {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let mut file = File::open(path.as_ref())?;

        // SAFETY: the file is opened read-only and the mapping does not
        // outlive this reader.
        match unsafe { Mmap::map(&file) } {
            Ok(map) => Ok(Self::Mapped(map)),
            Err(_) => {
                let mut buffer = Vec::new();
                file.read_to_end(&mut buffer)?;
                Ok(Self::Buffered(buffer))
            }
        }
    }

    #[must_use]
    pub fn bytes(&self) -> &[u8] {
        match self {
            Self::Mapped(map) => map,
            Self::Buffered(buffer) => buffer,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes().is_empty()
    }
}
