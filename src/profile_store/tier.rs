use std::{cmp::Ordering, fmt};

/// Storage class of a profile.
///
/// Ordered by importance: a read-only profile is shadowed by a persistent
/// one, which is shadowed by a volatile one, which is shadowed by an
/// in-memory one. Among read-only directories the first configured one is
/// the most important.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageTier {
    /// From the read-only directory at this index.
    ReadOnly(usize),
    /// From the persistent directory.
    Persistent,
    /// From the volatile directory.
    Volatile,
    /// Not backed by any file.
    InMemory,
}

impl StorageTier {
    /// Scan priority of the tier; smaller is more important.
    ///
    /// In-memory profiles are never scanned and have no priority.
    pub fn priority(self) -> Option<u32> {
        match self {
            StorageTier::Volatile => Some(0),
            StorageTier::Persistent => Some(1),
            StorageTier::ReadOnly(index) => u32::try_from(index).ok().map(|i| i.saturating_add(2)),
            StorageTier::InMemory => None,
        }
    }

    /// Whether files of this tier may carry pointer files and be written.
    pub fn is_writable(self) -> bool {
        matches!(self, StorageTier::Volatile | StorageTier::Persistent)
    }

    fn rank(self) -> (u8, std::cmp::Reverse<usize>) {
        match self {
            StorageTier::ReadOnly(index) => (0, std::cmp::Reverse(index)),
            StorageTier::Persistent => (1, std::cmp::Reverse(0)),
            StorageTier::Volatile => (2, std::cmp::Reverse(0)),
            StorageTier::InMemory => (3, std::cmp::Reverse(0)),
        }
    }
}

impl PartialOrd for StorageTier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for StorageTier {
    fn cmp(&self, other: &Self) -> Ordering {
        self.rank().cmp(&other.rank())
    }
}

impl fmt::Display for StorageTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StorageTier::ReadOnly(index) => write!(f, "lib[{index}]"),
            StorageTier::Persistent => f.write_str("etc"),
            StorageTier::Volatile => f.write_str("run"),
            StorageTier::InMemory => f.write_str("mem"),
        }
    }
}
