//! Human-readable flag descriptions

use fslog_core::EventFlags;
use owo_colors::OwoColorize;

const DESCRIPTIONS: &[(EventFlags, &str)] = &[
    (EventFlags::MUST_SCAN_SUBDIRS, "directory-level detail was lost; rescan the subtree"),
    (EventFlags::USER_DROPPED, "events were dropped in this process; rescan"),
    (EventFlags::KERNEL_DROPPED, "events were dropped by the kernel; rescan"),
    (EventFlags::EVENT_IDS_WRAPPED, "event ids rolled over; ids are no longer monotonic"),
    (EventFlags::HISTORY_DONE, "history replay finished; live events follow"),
    (EventFlags::ROOT_CHANGED, "a watched root or one of its parents changed"),
    (EventFlags::MOUNT, "a volume was mounted under a root"),
    (EventFlags::UNMOUNT, "a volume was unmounted under a root"),
    (EventFlags::CREATED, "item was created"),
    (EventFlags::REMOVED, "item was removed"),
    (EventFlags::INODE_META_MODIFIED, "inode metadata (mode, times, link count) changed"),
    (EventFlags::RENAMED, "item was renamed or moved"),
    (EventFlags::MODIFIED, "item contents changed"),
    (EventFlags::FINDER_INFO_MODIFIED, "Finder info changed"),
    (EventFlags::OWNER_CHANGED, "owner or group changed"),
    (EventFlags::XATTR_MODIFIED, "extended attributes changed"),
    (EventFlags::IS_FILE, "item is a regular file"),
    (EventFlags::IS_DIRECTORY, "item is a directory"),
    (EventFlags::IS_SYMLINK, "item is a symbolic link"),
    (EventFlags::EXTENDED, "file grew"),
    (EventFlags::LINK_CHANGED, "link count changed"),
    (EventFlags::REVOKED, "access was revoked or the volume went away"),
    (EventFlags::OWN_EVENT, "change was made by this process"),
    (EventFlags::IS_HARDLINK, "item is a hard link"),
    (EventFlags::IS_LAST_HARDLINK, "item was the last hard link"),
    (EventFlags::CLONED, "item is a clone"),
];

/// One line of prose per flag; `None` for unions
pub fn description(flag: EventFlags) -> Option<&'static str> {
    DESCRIPTIONS
        .iter()
        .find(|(known, _)| *known == flag)
        .map(|(_, text)| *text)
}

/// Every flag with its dashed name and description, in bit order
pub fn vocabulary() -> Vec<(String, EventFlags, &'static str)> {
    EventFlags::all()
        .iter()
        .filter_map(|flag| {
            let name = flag.names().into_iter().next()?;
            Some((name, flag, description(flag)?))
        })
        .collect()
}

/// Comma-separated flag names, data-loss flags highlighted when `color`
pub fn flag_list(flags: EventFlags, color: bool) -> String {
    if flags.is_empty() {
        return "changed".to_string();
    }
    flags
        .iter()
        .filter_map(|flag| {
            let name = flag.names().into_iter().next()?;
            Some(if !color {
                name
            } else if flag.is_data_loss() {
                name.red().bold().to_string()
            } else if flag.intersects(EventFlags::STREAM_LEVEL) {
                name.yellow().to_string()
            } else if flag.intersects(EventFlags::ITEM_KIND) {
                name.dimmed().to_string()
            } else {
                name.green().to_string()
            })
        })
        .collect::<Vec<_>>()
        .join(",")
}
