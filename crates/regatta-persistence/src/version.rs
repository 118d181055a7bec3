//! On-disk data file format versions
//!
//! Each data file is a set of components sharing a common prefix. The file
//! name suffix of a component depends on the format family the version
//! belongs to: the `k`/`l` family keeps a SHA-1 digest, the `m` family a
//! CRC-32 one.

use serde::{Deserialize, Serialize};

pub const TOC_SUFFIX: &str = "TOC.txt";
pub const TEMPORARY_TOC_SUFFIX: &str = "TOC.txt.tmp";

/// Data file format version, ordered from oldest to newest
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FormatVersion {
    Ka,
    La,
    Mc,
    Md,
    Me,
}

impl FormatVersion {
    pub const ALL: [FormatVersion; 5] = [
        FormatVersion::Ka,
        FormatVersion::La,
        FormatVersion::Mc,
        FormatVersion::Md,
        FormatVersion::Me,
    ];

    /// Versions new files may be written in
    pub const WRITABLE: [FormatVersion; 3] =
        [FormatVersion::Mc, FormatVersion::Md, FormatVersion::Me];

    pub const OLDEST_WRITABLE: FormatVersion = FormatVersion::Mc;

    pub fn as_str(self) -> &'static str {
        match self {
            FormatVersion::Ka => "ka",
            FormatVersion::La => "la",
            FormatVersion::Mc => "mc",
            FormatVersion::Md => "md",
            FormatVersion::Me => "me",
        }
    }

    pub fn is_writable(self) -> bool {
        self >= Self::OLDEST_WRITABLE
    }

    /// Whether this version belongs to the `m` family
    pub fn is_m_family(self) -> bool {
        matches!(self, FormatVersion::Mc | FormatVersion::Md | FormatVersion::Me)
    }

    /// Component types present in this version, each with its file name suffix
    pub fn component_map(self) -> Vec<(ComponentType, &'static str)> {
        ComponentType::ALL
            .into_iter()
            .map(|component| (component, component_filename(self, component)))
            .collect()
    }
}

impl std::fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for FormatVersion {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FormatVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| format!("Invalid format version '{}'", s))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ComponentType {
    Index,
    CompressionInfo,
    Data,
    Toc,
    Summary,
    Digest,
    Crc,
    Filter,
    Statistics,
    /// Node-local metadata component
    Scylla,
    TemporaryToc,
    TemporaryStatistics,
}

impl ComponentType {
    pub const ALL: [ComponentType; 12] = [
        ComponentType::Index,
        ComponentType::CompressionInfo,
        ComponentType::Data,
        ComponentType::Toc,
        ComponentType::Summary,
        ComponentType::Digest,
        ComponentType::Crc,
        ComponentType::Filter,
        ComponentType::Statistics,
        ComponentType::Scylla,
        ComponentType::TemporaryToc,
        ComponentType::TemporaryStatistics,
    ];
}

/// File name suffix of `component` in files written with `version`
pub fn component_filename(version: FormatVersion, component: ComponentType) -> &'static str {
    match component {
        ComponentType::Index => "Index.db",
        ComponentType::CompressionInfo => "CompressionInfo.db",
        ComponentType::Data => "Data.db",
        ComponentType::Toc => TOC_SUFFIX,
        ComponentType::Summary => "Summary.db",
        ComponentType::Digest if version.is_m_family() => "Digest.crc32",
        ComponentType::Digest => "Digest.sha1",
        ComponentType::Crc => "CRC.db",
        ComponentType::Filter => "Filter.db",
        ComponentType::Statistics => "Statistics.db",
        ComponentType::Scylla => "Scylla.db",
        ComponentType::TemporaryToc => TEMPORARY_TOC_SUFFIX,
        ComponentType::TemporaryStatistics => "Statistics.db.tmp",
    }
}

/// Every writable version is at least the oldest writable one, and every
/// version at or above it is writable.
const fn check_writable_versions() -> bool {
    let mut i = 0;
    while i < FormatVersion::WRITABLE.len() {
        if (FormatVersion::WRITABLE[i] as u8) < (FormatVersion::OLDEST_WRITABLE as u8) {
            return false;
        }
        i += 1;
    }

    let mut expected = 0;
    let mut j = 0;
    while j < FormatVersion::ALL.len() {
        if (FormatVersion::ALL[j] as u8) >= (FormatVersion::OLDEST_WRITABLE as u8) {
            expected += 1;
        }
        j += 1;
    }
    expected == FormatVersion::WRITABLE.len()
}

const _: () = assert!(check_writable_versions());

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_suffix_by_family() {
        assert_eq!(
            component_filename(FormatVersion::Ka, ComponentType::Digest),
            "Digest.sha1"
        );
        assert_eq!(
            component_filename(FormatVersion::La, ComponentType::Digest),
            "Digest.sha1"
        );
        assert_eq!(
            component_filename(FormatVersion::Me, ComponentType::Digest),
            "Digest.crc32"
        );
    }

    #[test]
    fn test_component_map_is_complete() {
        for version in FormatVersion::ALL {
            let map = version.component_map();
            assert_eq!(map.len(), ComponentType::ALL.len());
            assert!(map.contains(&(ComponentType::Toc, "TOC.txt")));
            assert!(map.contains(&(ComponentType::TemporaryToc, "TOC.txt.tmp")));
        }
    }

    #[test]
    fn test_writable_versions() {
        assert!(!FormatVersion::Ka.is_writable());
        assert!(!FormatVersion::La.is_writable());
        for v in FormatVersion::WRITABLE {
            assert!(v.is_writable());
        }
    }

    #[test]
    fn test_parse_round_trip() {
        assert_eq!("md".parse::<FormatVersion>(), Ok(FormatVersion::Md));
        assert!("zz".parse::<FormatVersion>().is_err());
        assert_eq!(FormatVersion::Mc.to_string(), "mc");
    }
}
