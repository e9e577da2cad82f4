//! FSEvents stream event flags (`kFSEventStreamEventFlag*`)

use super::{decode_with, BitTable};
use crate::event::{Event, EventId};
use crate::flags::EventFlags;
use bitflags::bitflags;
use std::path::Path;

bitflags! {
    /// Raw per-record flags delivered by an FSEvents stream
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StreamFlag: u32 {
        const MUST_SCAN_SUBDIRS = 0x0000_0001;
        const USER_DROPPED = 0x0000_0002;
        const KERNEL_DROPPED = 0x0000_0004;
        const EVENT_IDS_WRAPPED = 0x0000_0008;
        const HISTORY_DONE = 0x0000_0010;
        const ROOT_CHANGED = 0x0000_0020;
        const MOUNT = 0x0000_0040;
        const UNMOUNT = 0x0000_0080;
        const ITEM_CREATED = 0x0000_0100;
        const ITEM_REMOVED = 0x0000_0200;
        const ITEM_INODE_META_MOD = 0x0000_0400;
        const ITEM_RENAMED = 0x0000_0800;
        const ITEM_MODIFIED = 0x0000_1000;
        const ITEM_FINDER_INFO_MOD = 0x0000_2000;
        const ITEM_CHANGE_OWNER = 0x0000_4000;
        const ITEM_XATTR_MOD = 0x0000_8000;
        const ITEM_IS_FILE = 0x0001_0000;
        const ITEM_IS_DIR = 0x0002_0000;
        const ITEM_IS_SYMLINK = 0x0004_0000;
        const OWN_EVENT = 0x0008_0000;
        const ITEM_IS_HARDLINK = 0x0010_0000;
        const ITEM_IS_LAST_HARDLINK = 0x0020_0000;
        const ITEM_CLONED = 0x0040_0000;
    }
}

const TABLE: &BitTable = &[
    (StreamFlag::MUST_SCAN_SUBDIRS.bits(), EventFlags::MUST_SCAN_SUBDIRS),
    (StreamFlag::USER_DROPPED.bits(), EventFlags::USER_DROPPED),
    (StreamFlag::KERNEL_DROPPED.bits(), EventFlags::KERNEL_DROPPED),
    (StreamFlag::EVENT_IDS_WRAPPED.bits(), EventFlags::EVENT_IDS_WRAPPED),
    (StreamFlag::HISTORY_DONE.bits(), EventFlags::HISTORY_DONE),
    (StreamFlag::ROOT_CHANGED.bits(), EventFlags::ROOT_CHANGED),
    (StreamFlag::MOUNT.bits(), EventFlags::MOUNT),
    (StreamFlag::UNMOUNT.bits(), EventFlags::UNMOUNT),
    (StreamFlag::ITEM_CREATED.bits(), EventFlags::CREATED),
    (StreamFlag::ITEM_REMOVED.bits(), EventFlags::REMOVED),
    (StreamFlag::ITEM_INODE_META_MOD.bits(), EventFlags::INODE_META_MODIFIED),
    (StreamFlag::ITEM_RENAMED.bits(), EventFlags::RENAMED),
    (StreamFlag::ITEM_MODIFIED.bits(), EventFlags::MODIFIED),
    (StreamFlag::ITEM_FINDER_INFO_MOD.bits(), EventFlags::FINDER_INFO_MODIFIED),
    (StreamFlag::ITEM_CHANGE_OWNER.bits(), EventFlags::OWNER_CHANGED),
    (StreamFlag::ITEM_XATTR_MOD.bits(), EventFlags::XATTR_MODIFIED),
    (StreamFlag::ITEM_IS_FILE.bits(), EventFlags::IS_FILE),
    (StreamFlag::ITEM_IS_DIR.bits(), EventFlags::IS_DIRECTORY),
    (StreamFlag::ITEM_IS_SYMLINK.bits(), EventFlags::IS_SYMLINK),
    (StreamFlag::OWN_EVENT.bits(), EventFlags::OWN_EVENT),
    (StreamFlag::ITEM_IS_HARDLINK.bits(), EventFlags::IS_HARDLINK),
    (StreamFlag::ITEM_IS_LAST_HARDLINK.bits(), EventFlags::IS_LAST_HARDLINK),
    (StreamFlag::ITEM_CLONED.bits(), EventFlags::CLONED),
];

/// Decode one record's flags
pub fn decode(raw: u32) -> EventFlags {
    decode_with(TABLE, raw)
}

/// Decode one stream record into an event, or `None` when `interest`
/// filters it out
///
/// A record with no flags at all means "something changed under this
/// directory" and is always kept, as are stream-level records.
pub fn decode_record(raw_flags: u32, raw_id: u64, path: &Path, interest: EventFlags) -> Option<Event> {
    let flags = decode(raw_flags);
    if !flags.is_empty() && !flags.matches_interest(interest) {
        return None;
    }
    Some(
        Event::new(flags)
            .with_id(EventId::from_raw(raw_id))
            .with_path(path),
    )
}
