//! `EVFILT_VNODE` note bits
//!
//! Values are identical across Darwin, FreeBSD, NetBSD, OpenBSD and
//! DragonFly, so they are spelled out here instead of pulled from `libc`.

use super::{decode_with, encode_with, BitTable};
use crate::flags::EventFlags;
use bitflags::bitflags;

bitflags! {
    /// Raw `fflags` of a vnode filter
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Note: u32 {
        const DELETE = 0x0000_0001;
        const WRITE = 0x0000_0002;
        const EXTEND = 0x0000_0004;
        const ATTRIB = 0x0000_0008;
        const LINK = 0x0000_0010;
        const RENAME = 0x0000_0020;
        const REVOKE = 0x0000_0040;
    }
}

impl Note {
    /// Every note the vnode filter can report
    pub const ALL_EVENTS: Self = Self::all();
}

const TABLE: &BitTable = &[
    (Note::DELETE.bits(), EventFlags::REMOVED),
    (Note::WRITE.bits(), EventFlags::MODIFIED),
    (Note::EXTEND.bits(), EventFlags::MODIFIED.union(EventFlags::EXTENDED)),
    (Note::ATTRIB.bits(), EventFlags::INODE_META_MODIFIED),
    (Note::LINK.bits(), EventFlags::LINK_CHANGED),
    (Note::RENAME.bits(), EventFlags::RENAMED),
    (Note::REVOKE.bits(), EventFlags::REVOKED),
];

/// Decode vnode `fflags`
pub fn decode(raw: u32) -> EventFlags {
    decode_with(TABLE, raw)
}

/// Encode an interest mask as vnode `fflags`
///
/// Entry creation, removal and renames inside a watched directory surface
/// as writes (and link-count changes) on the directory itself, so those
/// interests also arm `WRITE` and `LINK`.
pub fn encode_interest(mask: EventFlags) -> Note {
    let mut note = Note::from_bits_truncate(encode_with(TABLE, mask));
    if mask.intersects(EventFlags::CREATED | EventFlags::REMOVED | EventFlags::RENAMED) {
        note |= Note::WRITE | Note::LINK;
    }
    note
}

/// True if `raw` can mean the entry list of a directory changed
pub fn touches_directory_entries(raw: u32) -> bool {
    Note::from_bits_truncate(raw).intersects(Note::WRITE | Note::LINK)
}
