//! Human-readable byte sizes ("128MB", "64 KB", "1g").

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const KB: u64 = 1024;
const MB: u64 = 1024 * KB;
const GB: u64 = 1024 * MB;

/// Longest suffixes first so "MB" wins over "B".
const SUFFIXES: &[(&str, u64)] = &[
    ("GB", GB),
    ("MB", MB),
    ("KB", KB),
    ("G", GB),
    ("M", MB),
    ("K", KB),
    ("B", 1),
];

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid size '{input}', expected a byte count or a value like '64KB', '128MB', '1GB'")]
pub struct SizeParseError {
    input: String,
}

/// Parses a byte count with an optional binary KB/MB/GB suffix.
///
/// ```
/// use tilepyramid::config::parse_size;
///
/// assert_eq!(parse_size("4096").unwrap(), 4096);
/// assert_eq!(parse_size("128MB").unwrap(), 128 * 1024 * 1024);
/// assert_eq!(parse_size("1 g").unwrap(), 1024 * 1024 * 1024);
/// ```
pub fn parse_size(s: &str) -> Result<u64, SizeParseError> {
    let err = || SizeParseError {
        input: s.to_string(),
    };
    let trimmed = s.trim();
    let upper = trimmed.to_ascii_uppercase();

    let (digits, multiplier) = SUFFIXES
        .iter()
        .find_map(|(suffix, mult)| upper.strip_suffix(suffix).map(|rest| (rest, *mult)))
        .unwrap_or((upper.as_str(), 1));

    let value: u64 = digits.trim().parse().map_err(|_| err())?;
    value.checked_mul(multiplier).ok_or_else(err)
}

/// Formats a byte count with the largest suffix that divides it exactly.
///
/// ```
/// use tilepyramid::config::format_size;
///
/// assert_eq!(format_size(128 * 1024 * 1024), "128MB");
/// assert_eq!(format_size(1536), "1536");
/// ```
pub fn format_size(bytes: u64) -> String {
    [(GB, "GB"), (MB, "MB"), (KB, "KB")]
        .iter()
        .find(|(unit, _)| bytes >= *unit && bytes % unit == 0)
        .map(|(unit, suffix)| format!("{}{}", bytes / unit, suffix))
        .unwrap_or_else(|| bytes.to_string())
}

/// A byte count that reads and prints in human-readable form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Size(pub u64);

impl Size {
    pub fn bytes(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_size(self.0))
    }
}

impl FromStr for Size {
    type Err = SizeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_size(s).map(Size)
    }
}
