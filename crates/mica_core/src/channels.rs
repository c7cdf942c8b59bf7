//! Channel grouping and scan-direction role resolution.

use crate::types::{Page, Role};

/// Group name for pages that carry no channel-identity tag.
pub const UNKNOWN_CHANNEL: &str = "Unknown";

#[derive(Debug)]
pub struct ChannelGroup<'a> {
    pub name: String,
    pub pages: Vec<&'a Page>,
}

/// Partitions pages into channel groups, created in first-encounter order.
/// Within a group, pages keep their original container order; no page is
/// skipped or duplicated.
#[must_use]
pub fn group_by_channel(pages: &[Page]) -> Vec<ChannelGroup<'_>> {
    let mut groups: Vec<ChannelGroup<'_>> = Vec::new();
    for page in pages {
        let name = page.channel_name().unwrap_or(UNKNOWN_CHANNEL);
        match groups.iter_mut().find(|group| group.name == name) {
            Some(group) => group.pages.push(page),
            None => groups.push(ChannelGroup {
                name: name.to_string(),
                pages: vec![page],
            }),
        }
    }
    groups
}

/// Extracts the retrace flag from a free-text scan-settings block.
///
/// Returns `None` when no line carries a `retrace` key, or when a line
/// mentioning retrace is malformed (no colon). The `None` outcome is a
/// distinct third state: the role resolver treats it differently from
/// `Some(false)` on one side of a pair.
#[must_use]
pub fn parse_retrace(settings: &str) -> Option<bool> {
    for line in settings.lines() {
        if !line.to_lowercase().contains("retrace") {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            return None;
        };
        if key.trim().eq_ignore_ascii_case("retrace") {
            return Some(value.trim().eq_ignore_ascii_case("true"));
        }
    }
    None
}

/// Assigns a scan-direction role to every page of one channel group.
///
/// A pair is ordered by the retrace flags only when exactly one page claims
/// retrace; every other combination keeps the acquisition order as
/// (trace, retrace). Larger groups are sequential multi-trace acquisitions.
#[must_use]
pub fn assign_roles<'a>(group: &ChannelGroup<'a>) -> Vec<(Role, &'a Page)> {
    match group.pages.as_slice() {
        [] => Vec::new(),
        [only] => vec![(Role::Trace, *only)],
        [first, second] => {
            let flag0 = parse_retrace(first.scan_settings().unwrap_or(""));
            let flag1 = parse_retrace(second.scan_settings().unwrap_or(""));

            if flag0 == Some(true) && flag1 != Some(true) {
                vec![(Role::Retrace, *first), (Role::Trace, *second)]
            } else {
                vec![(Role::Trace, *first), (Role::Retrace, *second)]
            }
        }
        many => many
            .iter()
            .enumerate()
            .map(|(i, page)| (Role::TraceN(i + 1), *page))
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{PixelBuffer, TagEntry, TagValue, CHANNEL_NAME_TAG, SCAN_SETTINGS_TAG};

    fn page(index: usize, channel: Option<&str>, settings: Option<&str>) -> Page {
        let mut tags = Vec::new();
        if let Some(name) = channel {
            tags.push(TagEntry {
                code: CHANNEL_NAME_TAG,
                value: TagValue::Ascii(name.to_string()),
            });
        }
        if let Some(text) = settings {
            tags.push(TagEntry {
                code: SCAN_SETTINGS_TAG,
                value: TagValue::Ascii(text.to_string()),
            });
        }
        Page {
            index,
            width: 1,
            height: 1,
            pixels: PixelBuffer::Gray8(vec![0]),
            tags,
        }
    }

    fn labels(assigned: &[(Role, &Page)]) -> Vec<String> {
        assigned.iter().map(|(role, _)| role.to_string()).collect()
    }

    #[test]
    fn parse_retrace_accepts_spaced_mixed_case_lines() {
        assert_eq!(parse_retrace("foo: bar\nretrace : True\n"), Some(true));
        assert_eq!(parse_retrace("Retrace:false"), Some(false));
        assert_eq!(parse_retrace("RETRACE : TRUE"), Some(true));
    }

    #[test]
    fn parse_retrace_requires_exact_key() {
        // Mentions retrace but under a different key; scanning continues.
        assert_eq!(parse_retrace("fast retrace mode: on\nretrace: true"), Some(true));
        assert_eq!(parse_retrace("fast retrace mode: on"), None);
    }

    #[test]
    fn parse_retrace_unknown_outcomes() {
        assert_eq!(parse_retrace(""), None);
        assert_eq!(parse_retrace("direction: forward"), None);
        // A retrace line without a colon is malformed and aborts the scan.
        assert_eq!(parse_retrace("retrace true\nretrace: true"), None);
    }

    #[test]
    fn parse_retrace_non_true_values_are_false() {
        assert_eq!(parse_retrace("retrace: yes"), Some(false));
        assert_eq!(parse_retrace("retrace: 1"), Some(false));
        assert_eq!(parse_retrace("retrace:"), Some(false));
    }

    #[test]
    fn untagged_pages_share_the_unknown_group_in_order() {
        let pages = vec![page(0, None, None), page(1, None, None), page(2, None, None)];
        let groups = group_by_channel(&pages);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].name, UNKNOWN_CHANNEL);
        let indices: Vec<usize> = groups[0].pages.iter().map(|p| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn groups_are_created_in_first_encounter_order() {
        let pages = vec![
            page(0, Some("Height"), None),
            page(1, Some("Deflection"), None),
            page(2, Some("Height"), None),
            page(3, None, None),
        ];
        let groups = group_by_channel(&pages);

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Height", "Deflection", "Unknown"]);
        let heights: Vec<usize> = groups[0].pages.iter().map(|p| p.index).collect();
        assert_eq!(heights, vec![0, 2]);
    }

    #[test]
    fn channel_identity_is_trimmed_before_grouping() {
        let pages = vec![page(0, Some("Height"), None), page(1, Some(" Height "), None)];
        let groups = group_by_channel(&pages);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].pages.len(), 2);
    }

    #[test]
    fn single_page_group_is_trace() {
        let pages = vec![page(0, Some("Height"), None)];
        let groups = group_by_channel(&pages);
        let assigned = assign_roles(&groups[0]);

        assert_eq!(labels(&assigned), vec!["trace"]);
        assert_eq!(assigned[0].1.index, 0);
    }

    #[test]
    fn pair_role_grid_matches_flag_policy() {
        // Flag states: Some(true), Some(false), None (unknown). The pair is
        // reordered only when exactly the first page claims retrace; a lone
        // retrace claim on the second page already matches the default order.
        let true_line = Some("retrace: true");
        let false_line = Some("retrace: false");
        let cases: [(Option<&str>, Option<&str>, [&str; 2]); 9] = [
            (true_line, false_line, ["retrace", "trace"]),
            (true_line, None, ["retrace", "trace"]),
            (true_line, true_line, ["trace", "retrace"]),
            (false_line, true_line, ["trace", "retrace"]),
            (false_line, false_line, ["trace", "retrace"]),
            (false_line, None, ["trace", "retrace"]),
            (None, true_line, ["trace", "retrace"]),
            (None, false_line, ["trace", "retrace"]),
            (None, None, ["trace", "retrace"]),
        ];

        for (settings0, settings1, expected) in cases {
            let pages = vec![
                page(0, Some("Height"), settings0),
                page(1, Some("Height"), settings1),
            ];
            let groups = group_by_channel(&pages);
            let assigned = assign_roles(&groups[0]);

            assert_eq!(
                labels(&assigned),
                expected.to_vec(),
                "flags ({:?}, {:?})",
                settings0,
                settings1
            );
            // Reordering changes labels, never page order.
            assert_eq!(assigned[0].1.index, 0);
            assert_eq!(assigned[1].1.index, 1);
        }
    }

    #[test]
    fn large_group_is_sequential_multi_trace() {
        let pages: Vec<Page> = (0..4).map(|i| page(i, Some("Height"), None)).collect();
        let groups = group_by_channel(&pages);
        let assigned = assign_roles(&groups[0]);

        assert_eq!(labels(&assigned), vec!["trace1", "trace2", "trace3", "trace4"]);
        let indices: Vec<usize> = assigned.iter().map(|(_, p)| p.index).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn every_page_gets_exactly_one_role() {
        let pages = vec![
            page(0, Some("Height"), Some("retrace: true")),
            page(1, Some("Height"), None),
            page(2, None, None),
        ];
        let groups = group_by_channel(&pages);
        let total: usize = groups.iter().map(|g| assign_roles(g).len()).sum();
        assert_eq!(total, pages.len());
    }
}
