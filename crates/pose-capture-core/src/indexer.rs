use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

/// Extensions that count as sample artifacts when scanning a slot folder.
const SAMPLE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "json"];

/// Filename convention used inside one slot folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleNaming {
    /// `<prefix>_<index>[_<variant>].<ext>`
    Prefixed(String),
    /// `<index>[_<variant>].<ext>`
    Bare,
}

impl SampleNaming {
    /// Empty prefixes fall back to bare names.
    pub fn from_prefix(prefix: &str) -> Self {
        if prefix.is_empty() {
            SampleNaming::Bare
        } else {
            SampleNaming::Prefixed(prefix.to_string())
        }
    }

    pub fn prefix(&self) -> &str {
        match self {
            SampleNaming::Prefixed(prefix) => prefix,
            SampleNaming::Bare => "",
        }
    }
}

/// File stem shared by every artifact of one sample.
pub fn sample_stem(naming: &SampleNaming, index: u32) -> String {
    match naming {
        SampleNaming::Prefixed(prefix) => format!("{}_{:03}", prefix, index),
        SampleNaming::Bare => format!("{:03}", index),
    }
}

/// Parse the sample index out of a filename, or `None` when the name does not
/// follow the naming convention.
pub fn parse_index(file_name: &str, naming: &SampleNaming) -> Option<u32> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    if !SAMPLE_EXTENSIONS
        .iter()
        .any(|known| ext.eq_ignore_ascii_case(known))
    {
        return None;
    }

    let rest = match naming {
        SampleNaming::Prefixed(prefix) => stem.strip_prefix(prefix.as_str())?.strip_prefix('_')?,
        SampleNaming::Bare => stem,
    };

    let (digits, variant) = match rest.split_once('_') {
        Some((digits, variant)) => (digits, Some(variant)),
        None => (rest, None),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if let Some(variant) = variant {
        if variant.is_empty() || !variant.chars().all(|c| c.is_ascii_alphabetic()) {
            return None;
        }
    }
    digits.parse().ok()
}

/// Smallest index greater than every sample already in `folder`.
///
/// A missing folder yields 1. Entries that cannot be read or whose names do not
/// follow `naming` are skipped without failing the scan. A folder already
/// holding index `u32::MAX` is an error.
pub fn next_index(folder: &Path, naming: &SampleNaming) -> io::Result<u32> {
    let entries = match fs::read_dir(folder) {
        Ok(entries) => entries,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(1),
        Err(err) => {
            return Err(io::Error::new(
                err.kind(),
                format!("Error reading directory {}: {}", folder.display(), err),
            ))
        }
    };

    let mut highest = 0u32;
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                trace!("Skipping unreadable entry in {}: {}", folder.display(), err);
                continue;
            }
        };
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        match parse_index(name, naming) {
            Some(index) => highest = highest.max(index),
            None => trace!("Ignoring '{}' while indexing {}", name, folder.display()),
        }
    }

    highest.checked_add(1).ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::Other,
            format!("No sample index left in {}", folder.display()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefixed(prefix: &str) -> SampleNaming {
        SampleNaming::Prefixed(prefix.to_string())
    }

    #[test]
    fn test_parse_index_prefixed() {
        let naming = prefixed("pose1");
        assert_eq!(parse_index("pose1_001.jpg", &naming), Some(1));
        assert_eq!(parse_index("pose1_042.json", &naming), Some(42));
        assert_eq!(parse_index("pose1_1234.JPG", &naming), Some(1234));
        assert_eq!(parse_index("pose1_007_raw.jpg", &naming), Some(7));
        assert_eq!(parse_index("pose1_007_nodes.jpg", &naming), Some(7));
    }

    #[test]
    fn test_parse_index_rejects_non_matching() {
        let naming = prefixed("pose1");
        assert_eq!(parse_index("pose10_005.jpg", &naming), None);
        assert_eq!(parse_index("pose2_005.jpg", &naming), None);
        assert_eq!(parse_index("pose1_abc.jpg", &naming), None);
        assert_eq!(parse_index("pose1_005.txt", &naming), None);
        assert_eq!(parse_index("pose1_.jpg", &naming), None);
        assert_eq!(parse_index("pose1_005", &naming), None);
        assert_eq!(parse_index("pose1_005_2.jpg", &naming), None);
        assert_eq!(parse_index("pose1005.jpg", &naming), None);
    }

    #[test]
    fn test_parse_index_bare() {
        assert_eq!(parse_index("12.jpg", &SampleNaming::Bare), Some(12));
        assert_eq!(parse_index("003.json", &SampleNaming::Bare), Some(3));
        assert_eq!(parse_index("pose1_003.jpg", &SampleNaming::Bare), None);
        assert_eq!(parse_index("thumbs.db", &SampleNaming::Bare), None);
    }

    #[test]
    fn test_parse_index_overflow_is_ignored() {
        assert_eq!(parse_index("99999999999.jpg", &SampleNaming::Bare), None);
    }

    #[test]
    fn test_sample_stem() {
        assert_eq!(sample_stem(&prefixed("pose1"), 3), "pose1_003");
        assert_eq!(sample_stem(&prefixed("pose1"), 1200), "pose1_1200");
        assert_eq!(sample_stem(&SampleNaming::Bare, 9), "009");
    }

    #[test]
    fn test_from_prefix() {
        assert_eq!(SampleNaming::from_prefix(""), SampleNaming::Bare);
        assert_eq!(SampleNaming::from_prefix("wave"), prefixed("wave"));
        assert_eq!(prefixed("wave").prefix(), "wave");
    }
}
