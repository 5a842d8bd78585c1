//! Content Monitor (spec §4.D).
//!
//! Grounded line-for-line in `examples/original_source/jep_py/content.py`:
//! a `path -> String` mirror of editor buffers, updated by range-replace
//! edits, plus the newline-mode bitmask scan used to pick a platform
//! appropriate line separator when a mirror is later persisted.

use std::collections::HashMap;

/// Outcome of a single [`ContentMonitor::synchronize`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronizationResult {
    /// The requested range no longer matched the tracked content.
    OutOfSync,
    /// The tracked content was updated.
    Updated,
}

/// Bitmask over the newline conventions observed in a scanned text, per
/// `jep_py.content.NewlineMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NewlineMode(u8);

impl NewlineMode {
    /// No newline observed yet.
    pub const UNKNOWN: Self = Self(0x00);
    /// `'\n'` observed.
    pub const N: Self = Self(0x01);
    /// A lone `'\r'` (not followed by `'\n'`) observed.
    pub const R: Self = Self(0x02);
    /// `"\r\n"` observed as a single occurrence.
    pub const RN: Self = Self(0x04);
    /// Every known convention observed ("mixed").
    pub const ALL: Self = Self(0x01 | 0x02 | 0x04);

    /// Scans `text` once, accumulating the bitmask of newline conventions
    /// present. A `'\r'` immediately followed by `'\n'` counts once as
    /// [`NewlineMode::RN`]; a trailing unpaired `'\r'` at the end of input
    /// counts as [`NewlineMode::R`]. Stops early once every bit is set.
    #[must_use]
    pub fn detect(text: &str) -> Self {
        let mut mode = Self::UNKNOWN;
        let mut chars = text.chars().peekable();

        while mode != Self::ALL {
            let Some(c) = chars.next() else {
                break;
            };
            match c {
                '\n' => mode = mode.union(Self::N),
                '\r' => {
                    if chars.peek() == Some(&'\n') {
                        chars.next();
                        mode = mode.union(Self::RN);
                    } else {
                        mode = mode.union(Self::R);
                    }
                }
                _ => {}
            }
        }

        mode
    }

    const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// The `open()`-style newline mode that best corresponds to this mask:
    /// `Some("\n")` for universal/unknown, the single separator for a pure
    /// mode, or `Some("")` (leave as-is) for a genuine mix.
    #[must_use]
    pub fn preferred_separator(self) -> &'static str {
        if self == Self::N || self == Self::UNKNOWN {
            "\n"
        } else if self == Self::R {
            "\r"
        } else if self == Self::RN {
            "\r\n"
        } else {
            ""
        }
    }
}

/// Mirrors a single connection's editor buffers by path, applying
/// range-replace edits (spec §4.D).
#[derive(Debug, Default)]
pub struct ContentMonitor {
    content_by_path: HashMap<String, String>,
}

impl ContentMonitor {
    /// Builds an empty monitor.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the tracked content for `path`, if any has been synchronized.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&str> {
        self.content_by_path.get(path).map(String::as_str)
    }

    /// Applies a range-replace edit: `content(path) := before[..start] + data
    /// + before[end..]`. Rejects with [`SynchronizationResult::OutOfSync`]
    /// (leaving the tracked content untouched) when `start`/`end` no longer
    /// describe a valid range over the current content, treating an absent
    /// path as empty.
    pub fn synchronize(
        &mut self,
        path: &str,
        data: &str,
        start: i64,
        end: Option<i64>,
    ) -> SynchronizationResult {
        let current = self.content_by_path.get(path).map_or("", String::as_str);
        let length = i64::try_from(current.chars().count()).unwrap_or(i64::MAX);
        let end = end.unwrap_or(length);

        if start < 0 || start > length || end < 0 || end > length || start > end {
            return SynchronizationResult::OutOfSync;
        }

        let before: String = current.chars().take(char_count(start)).collect();
        let after: String = current.chars().skip(char_count(end)).collect();

        let mut updated = String::with_capacity(before.len() + data.len() + after.len());
        updated.push_str(&before);
        updated.push_str(data);
        updated.push_str(&after);

        self.content_by_path.insert(path.to_string(), updated);
        SynchronizationResult::Updated
    }
}

/// Converts a validated non-negative char offset to a `usize` count.
fn char_count(offset: i64) -> usize {
    #[expect(
        clippy::cast_sign_loss,
        reason = "offset is validated non-negative by every caller before this is reached"
    )]
    let count = offset as usize;
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_scenario_from_the_spec() {
        let mut monitor = ContentMonitor::new();

        let result = monitor.synchronize("/f", "This is the string.", 0, None);
        assert_eq!(result, SynchronizationResult::Updated);
        assert_eq!(monitor.get("/f"), Some("This is the string."));

        let result = monitor.synchronize("/f", "WAS", 5, Some(7));
        assert_eq!(result, SynchronizationResult::Updated);
        assert_eq!(monitor.get("/f"), Some("This WAS the string."));

        let result = monitor.synchronize("/f", " Really!", 20, Some(22));
        assert_eq!(result, SynchronizationResult::OutOfSync);
        assert_eq!(monitor.get("/f"), Some("This WAS the string."));
    }

    #[test]
    fn synchronize_on_an_unknown_path_treats_it_as_empty() {
        let mut monitor = ContentMonitor::new();
        assert_eq!(
            monitor.synchronize("/new", "hello", 0, None),
            SynchronizationResult::Updated
        );
        assert_eq!(monitor.get("/new"), Some("hello"));
    }

    #[test]
    fn negative_start_is_out_of_sync() {
        let mut monitor = ContentMonitor::new();
        assert_eq!(
            monitor.synchronize("/f", "x", -1, None),
            SynchronizationResult::OutOfSync
        );
    }

    #[test]
    fn start_after_end_is_out_of_sync() {
        let mut monitor = ContentMonitor::new();
        monitor.synchronize("/f", "abcdef", 0, None);
        assert_eq!(
            monitor.synchronize("/f", "x", 4, Some(2)),
            SynchronizationResult::OutOfSync
        );
    }

    #[test]
    fn detects_pure_modes() {
        assert_eq!(NewlineMode::detect("a\nb\nc"), NewlineMode::N);
        assert_eq!(NewlineMode::detect("a\rb\rc"), NewlineMode::R);
        assert_eq!(NewlineMode::detect("a\r\nb\r\nc"), NewlineMode::RN);
        assert_eq!(NewlineMode::detect(""), NewlineMode::UNKNOWN);
    }

    #[test]
    fn trailing_unpaired_carriage_return_counts_as_r() {
        assert_eq!(NewlineMode::detect("a\r"), NewlineMode::R);
    }

    #[test]
    fn mixed_conventions_are_detected_and_left_as_is() {
        let mode = NewlineMode::detect("a\nb\rc\r\nd");
        assert_eq!(mode, NewlineMode::ALL);
        assert_eq!(mode.preferred_separator(), "");
    }

    #[test]
    fn preferred_separator_for_pure_modes() {
        assert_eq!(NewlineMode::N.preferred_separator(), "\n");
        assert_eq!(NewlineMode::R.preferred_separator(), "\r");
        assert_eq!(NewlineMode::RN.preferred_separator(), "\r\n");
        assert_eq!(NewlineMode::UNKNOWN.preferred_separator(), "\n");
    }
}
