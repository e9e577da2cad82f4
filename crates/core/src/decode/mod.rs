//! Kernel flag decoding
//!
//! Each backend owns one bit-to-flag table. Decoding walks the table and
//! includes every entry whose raw bits are all set; unknown bits are ignored
//! so newer kernels do not break older builds.

pub mod fsevent;
pub mod kqueue;

use crate::flags::EventFlags;

/// One row of a backend bit table
pub type BitTable = [(u32, EventFlags)];

/// Map raw kernel bits to the common vocabulary using `table`
pub fn decode_with(table: &BitTable, raw: u32) -> EventFlags {
    table
        .iter()
        .filter(|(bit, _)| raw & bit == *bit)
        .fold(EventFlags::empty(), |acc, (_, flags)| acc | *flags)
}

/// Raw bits whose decoded flags intersect `mask`
pub fn encode_with(table: &BitTable, mask: EventFlags) -> u32 {
    table
        .iter()
        .filter(|(_, flags)| flags.intersects(mask))
        .fold(0, |acc, (bit, _)| acc | bit)
}
