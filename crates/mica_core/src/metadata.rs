//! Composition of the per-unit metadata record.

use crate::tiff::tag_name;
use crate::types::{TagEntry, TagValue};

pub const ASCII_SECTION: &str = "--- ASCII METADATA ---";
pub const TAG_SECTION: &str = "--- TIFF TAGS ---";

/// Merges the carved printable blob with a line-per-tag dump of the full
/// dictionary. Unreadable values are recorded inline instead of aborting
/// the dump.
#[must_use]
pub fn compose(ascii_blob: &str, tags: &[TagEntry]) -> String {
    let mut dump = String::new();
    for entry in tags {
        match &entry.value {
            TagValue::Unreadable(reason) => {
                dump.push_str(&format!("{}: <unreadable> ({})\n", entry.code, reason));
            }
            value => {
                dump.push_str(&format!(
                    "{}: {} = {}\n",
                    entry.code,
                    tag_name(entry.code),
                    value
                ));
            }
        }
    }
    format!(
        "{}\n{}\n\n{}\n{}",
        ASCII_SECTION, ascii_blob, TAG_SECTION, dump
    )
}
