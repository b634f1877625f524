//! Splits wrapped lines into viewport-height pages.

use std::slice::Chunks;

/// Wrapped lines of one chapter, partitioned into pages of `height` lines. The last page may be
/// short. Pages borrow from the line buffer, so concatenating them gives back the lines exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pages {
    lines: Vec<String>,
    height: usize,
}

impl Pages {
    /// A `height` below one is clamped to one.
    pub fn new(lines: Vec<String>, height: usize) -> Self {
        Self {
            lines,
            height: height.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.lines.len().div_ceil(self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn get(&self, index: usize) -> Option<&[String]> {
        let start = index.checked_mul(self.height)?;
        if start >= self.lines.len() {
            return None;
        }
        let end = (start + self.height).min(self.lines.len());
        Some(&self.lines[start..end])
    }

    pub fn iter(&self) -> Chunks<'_, String> {
        self.lines.chunks(self.height)
    }

    /// Clamps a page index into `[0, len - 1]`, or to 0 when there are no pages.
    pub fn clamp_index(&self, index: usize) -> usize {
        index.min(self.len().saturating_sub(1))
    }
}

/// Partitions `lines` into pages of at most `height` lines.
pub fn paginate(lines: &[String], height: usize) -> Vec<&[String]> {
    lines.chunks(height.max(1)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn numbered(count: usize) -> Vec<String> {
        (0..count).map(|i| format!("line {i}")).collect()
    }

    #[test]
    fn seven_lines_at_height_three() {
        let lines = numbered(7);
        let sizes: Vec<usize> = paginate(&lines, 3).iter().map(|page| page.len()).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let pages = Pages::new(lines, 3);
        assert_eq!(pages.len(), 3);
        assert_eq!(pages.get(2).map(|p| p.len()), Some(1));
        assert_eq!(pages.get(3), None);
    }

    #[test]
    fn pages_concatenate_back_to_lines() {
        for count in 0..20 {
            let lines = numbered(count);
            for height in 1..8 {
                let pages = Pages::new(lines.clone(), height);
                let joined: Vec<String> = pages.iter().flatten().cloned().collect();
                assert_eq!(joined, lines);

                let all: Vec<&[String]> = (0..pages.len()).filter_map(|i| pages.get(i)).collect();
                for page in &all[..all.len().saturating_sub(1)] {
                    assert_eq!(page.len(), height);
                }
                assert_eq!(all.len(), pages.len());
            }
        }
    }

    #[test]
    fn empty_lines_have_no_pages() {
        let pages = Pages::new(Vec::new(), 10);
        assert!(pages.is_empty());
        assert_eq!(pages.len(), 0);
        assert_eq!(pages.get(0), None);
        assert_eq!(pages.clamp_index(5), 0);
        assert!(paginate(&[], 3).is_empty());
    }

    #[test]
    fn zero_height_is_clamped() {
        let pages = Pages::new(numbered(3), 0);
        assert_eq!(pages.height(), 1);
        assert_eq!(pages.len(), 3);
        assert_eq!(paginate(&numbered(2), 0).len(), 2);
    }

    #[test]
    fn clamp_index_after_shrinking() {
        let pages = Pages::new(numbered(10), 2);
        assert_eq!(pages.clamp_index(3), 3);
        let pages = Pages::new(numbered(10), 5);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages.clamp_index(3), 1);
    }

    #[test]
    fn repagination_is_idempotent() {
        let lines = numbered(11);
        assert_eq!(Pages::new(lines.clone(), 4), Pages::new(lines, 4));
    }
}
