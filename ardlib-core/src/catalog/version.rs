//! Loose version ordering
//!
//! Arduino library versions are only loosely semver: "1.0", "2.1.0-beta",
//! "1.2.3a" and friends all show up in the index. A version is split into
//! numeric runs and non-numeric runs (dots are separators only), and two
//! versions compare segment by segment from the left. Numeric segments
//! compare by value, other segments lexically, and a numeric segment sorts
//! above a non-numeric one. When one version is a prefix of the other, the
//! longer one is greater.

use std::cmp::Ordering;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Alpha(String),
    /// Digits with leading zeros stripped, so value order is (len, text)
    Numeric(String),
}

impl Ord for Segment {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Segment::Numeric(a), Segment::Numeric(b)) => {
                a.len().cmp(&b.len()).then_with(|| a.cmp(b))
            }
            (Segment::Alpha(a), Segment::Alpha(b)) => a.cmp(b),
            (Segment::Numeric(_), Segment::Alpha(_)) => Ordering::Greater,
            (Segment::Alpha(_), Segment::Numeric(_)) => Ordering::Less,
        }
    }
}

impl PartialOrd for Segment {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// A parsed, totally ordered version string
#[derive(Debug, Clone)]
pub struct LooseVersion {
    raw: String,
    segments: Vec<Segment>,
}

impl LooseVersion {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut current = String::new();
        let mut numeric = false;

        let mut flush = |current: &mut String, numeric: bool| {
            if current.is_empty() {
                return;
            }
            let text = std::mem::take(current);
            if numeric {
                let trimmed = text.trim_start_matches('0');
                segments.push(Segment::Numeric(trimmed.to_string()));
            } else {
                segments.push(Segment::Alpha(text));
            }
        };

        for ch in raw.trim().chars() {
            if ch == '.' {
                flush(&mut current, numeric);
                continue;
            }
            let is_digit = ch.is_ascii_digit();
            if !current.is_empty() && is_digit != numeric {
                flush(&mut current, numeric);
            }
            numeric = is_digit;
            current.push(ch);
        }
        flush(&mut current, numeric);

        Self {
            raw: raw.to_string(),
            segments,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl PartialEq for LooseVersion {
    fn eq(&self, other: &Self) -> bool {
        self.segments == other.segments
    }
}

impl Eq for LooseVersion {}

impl Ord for LooseVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        // Vec ordering is lexicographic with the shorter prefix first
        self.segments.cmp(&other.segments)
    }
}

impl PartialOrd for LooseVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for LooseVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
