//! Deterministic output naming for (channel, role) units.

use crate::types::Role;
use std::path::{Path, PathBuf};

pub const IMAGES_DIR: &str = "images";
pub const METADATA_DIR: &str = "metadata";

/// Replaces spaces with underscores and deletes parentheses, so channel
/// identities like "Height (measured)" become safe path components.
#[must_use]
pub fn sanitize(name: &str) -> String {
    name.replace(' ', "_").replace(['(', ')'], "")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitPaths {
    pub image: PathBuf,
    pub metadata: PathBuf,
}

/// Derives the canonical artifact paths for one output unit:
/// `<channel>_<role>/images/<stem>_<channel>_<role>.tif` and
/// `<channel>_<role>/metadata/<stem>_<channel>_<role>_metadata.txt`.
#[must_use]
pub fn unit_paths(output_root: &Path, source_stem: &str, channel: &str, role: Role) -> UnitPaths {
    let dir = sanitize(&format!("{}_{}", channel, role));
    let base = sanitize(&format!("{}_{}_{}", source_stem, channel, role));
    let unit_root = output_root.join(dir);
    UnitPaths {
        image: unit_root.join(IMAGES_DIR).join(format!("{}.tif", base)),
        metadata: unit_root
            .join(METADATA_DIR)
            .join(format!("{}_metadata.txt", base)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_replaces_spaces_and_drops_parens() {
        assert_eq!(sanitize("Height (measured)"), "Height_measured");
        assert_eq!(sanitize("Vertical Deflection"), "Vertical_Deflection");
        assert_eq!(sanitize("Height"), "Height");
    }

    #[test]
    fn unit_paths_follow_the_layout() {
        let paths = unit_paths(Path::new("/out"), "scan01", "Height", Role::Retrace);
        assert_eq!(
            paths.image,
            Path::new("/out/Height_retrace/images/scan01_Height_retrace.tif")
        );
        assert_eq!(
            paths.metadata,
            Path::new("/out/Height_retrace/metadata/scan01_Height_retrace_metadata.txt")
        );
    }

    #[test]
    fn sanitization_applies_to_every_component() {
        let paths = unit_paths(
            Path::new("/out"),
            "my scan",
            "Height (measured)",
            Role::Trace,
        );
        assert_eq!(
            paths.image,
            Path::new("/out/Height_measured_trace/images/my_scan_Height_measured_trace.tif")
        );
    }

    #[test]
    fn distinct_channel_role_pairs_never_collide() {
        let root = Path::new("/out");
        let pairs = [
            ("Height", Role::Trace),
            ("Height", Role::Retrace),
            ("Deflection", Role::Trace),
            ("Height", Role::TraceN(1)),
            ("Height", Role::TraceN(2)),
        ];
        let mut seen = std::collections::HashSet::new();
        for (channel, role) in pairs {
            let paths = unit_paths(root, "scan01", channel, role);
            assert!(seen.insert(paths.image.clone()), "collision at {:?}", paths.image);
            assert!(seen.insert(paths.metadata.clone()));
        }
    }

    #[test]
    fn rederiving_paths_is_deterministic() {
        let a = unit_paths(Path::new("/out"), "scan01", "Height", Role::Trace);
        let b = unit_paths(Path::new("/out"), "scan01", "Height", Role::Trace);
        assert_eq!(a, b);
    }
}
