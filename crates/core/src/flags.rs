//! Backend-neutral event flag vocabulary
//!
//! Bit positions here belong to this crate only. Kernel bit assignments live
//! in the per-backend tables under [`crate::decode`] and are never shared.

use bitflags::bitflags;
use thiserror::Error;

bitflags! {
    /// Set of semantic tags carried by an [`Event`](crate::Event)
    ///
    /// Flags are additive: one kernel record may decode to any combination.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    #[derive(serde::Serialize, serde::Deserialize)]
    pub struct EventFlags: u32 {
        // Stream-level
        const MUST_SCAN_SUBDIRS = 1 << 0;
        const USER_DROPPED = 1 << 1;
        const KERNEL_DROPPED = 1 << 2;
        const EVENT_IDS_WRAPPED = 1 << 3;
        const HISTORY_DONE = 1 << 4;
        const ROOT_CHANGED = 1 << 5;
        const MOUNT = 1 << 6;
        const UNMOUNT = 1 << 7;

        // Per-entry
        const CREATED = 1 << 8;
        const REMOVED = 1 << 9;
        const INODE_META_MODIFIED = 1 << 10;
        const RENAMED = 1 << 11;
        const MODIFIED = 1 << 12;
        const FINDER_INFO_MODIFIED = 1 << 13;
        const OWNER_CHANGED = 1 << 14;
        const XATTR_MODIFIED = 1 << 15;
        const IS_FILE = 1 << 16;
        const IS_DIRECTORY = 1 << 17;
        const IS_SYMLINK = 1 << 18;
        const EXTENDED = 1 << 19;
        const LINK_CHANGED = 1 << 20;
        const REVOKED = 1 << 21;
        const OWN_EVENT = 1 << 22;
        const IS_HARDLINK = 1 << 23;
        const IS_LAST_HARDLINK = 1 << 24;
        const CLONED = 1 << 25;
    }
}

/// Flag name that does not belong to the vocabulary
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event flag `{0}`")]
pub struct UnknownFlag(pub String);

impl EventFlags {
    /// Flags describing the state of the stream rather than one entry
    pub const STREAM_LEVEL: Self = Self::MUST_SCAN_SUBDIRS
        .union(Self::USER_DROPPED)
        .union(Self::KERNEL_DROPPED)
        .union(Self::EVENT_IDS_WRAPPED)
        .union(Self::HISTORY_DONE)
        .union(Self::ROOT_CHANGED)
        .union(Self::MOUNT)
        .union(Self::UNMOUNT);

    /// Flags describing a single file-system entry
    pub const PER_ENTRY: Self = Self::all().difference(Self::STREAM_LEVEL);

    /// Flags telling the consumer that events were lost and a rescan is due
    pub const DATA_LOSS: Self = Self::MUST_SCAN_SUBDIRS
        .union(Self::USER_DROPPED)
        .union(Self::KERNEL_DROPPED);

    /// Item-type tags; these describe an entry but never count as a change
    pub const ITEM_KIND: Self = Self::IS_FILE
        .union(Self::IS_DIRECTORY)
        .union(Self::IS_SYMLINK)
        .union(Self::IS_HARDLINK)
        .union(Self::IS_LAST_HARDLINK)
        .union(Self::OWN_EVENT);

    /// Interest mask used when the caller does not supply one
    pub const DEFAULT_INTEREST: Self = Self::CREATED
        .union(Self::REMOVED)
        .union(Self::MODIFIED)
        .union(Self::RENAMED)
        .union(Self::INODE_META_MODIFIED)
        .union(Self::XATTR_MODIFIED)
        .union(Self::OWNER_CHANGED)
        .union(Self::FINDER_INFO_MODIFIED);

    /// True if any data-loss flag is set
    pub fn is_data_loss(&self) -> bool {
        self.intersects(Self::DATA_LOSS)
    }

    /// True if the flags pass an interest mask
    ///
    /// Stream-level flags always pass. Otherwise at least one change flag
    /// must be in `mask`.
    pub fn matches_interest(&self, mask: EventFlags) -> bool {
        if self.intersects(Self::STREAM_LEVEL) {
            return true;
        }
        self.difference(Self::ITEM_KIND).intersects(mask)
    }

    /// Parse a single flag name
    ///
    /// Accepts `created`, `CREATED`, `must-scan-subdirs` and so on.
    pub fn from_flag_name(name: &str) -> Result<Self, UnknownFlag> {
        let normalized = name.trim().to_ascii_uppercase().replace('-', "_");
        Self::from_name(&normalized).ok_or_else(|| UnknownFlag(name.trim().to_string()))
    }

    /// Parse a comma or `|` separated list of flag names
    ///
    /// `all` selects every per-entry flag. An empty string yields the empty set.
    pub fn from_names(list: &str) -> Result<Self, UnknownFlag> {
        let mut flags = Self::empty();
        for part in list.split([',', '|']) {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            if part.eq_ignore_ascii_case("all") {
                flags |= Self::PER_ENTRY;
                continue;
            }
            flags |= Self::from_flag_name(part)?;
        }
        Ok(flags)
    }

    /// Lower-case, dash-separated names of the set flags
    pub fn names(&self) -> Vec<String> {
        self.iter_names()
            .map(|(name, _)| name.to_ascii_lowercase().replace('_', "-"))
            .collect()
    }
}
