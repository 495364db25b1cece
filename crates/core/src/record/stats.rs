//! Statistics tracking
//!
//! Every field carries a runtime metadata word, independent of the static
//! schema flags. Its high bit marks the field as tracked for statistics:
//! writes to a tracked field invoke the record's stats observer with the old
//! and new values. The bit is set automatically for fields whose schema flags
//! mark them as statistics fields, and can be toggled at runtime for any
//! other field.

use tracing::debug;

use super::{Record, RecordResult};

/// Reserved bit of the metadata word: track this field for statistics
pub const STATS_TRACK_BIT: u32 = 1 << 31;

impl Record {
    /// Current metadata word of a field
    ///
    /// Statistics fields always report [`STATS_TRACK_BIT`], even if it was
    /// cleared at runtime.
    pub fn stats(&self, name: &str) -> RecordResult<u32> {
        let (index, field) = self.resolve(name)?;
        let mut word = self.slots[index].meta;
        if field.flags.is_statistics() {
            word |= STATS_TRACK_BIT;
        }
        Ok(word)
    }

    /// Set or clear bits of a field's metadata word
    ///
    /// The mask always includes [`STATS_TRACK_BIT`]. Returns the previous word.
    pub fn set_stats(&mut self, name: &str, mask: u32, enable: bool) -> RecordResult<u32> {
        let (index, field) = self.resolve(name)?;
        let mask = mask | STATS_TRACK_BIT;
        let slot = &mut self.slots[index];
        let previous = slot.meta;
        if enable {
            slot.meta |= mask;
        } else {
            slot.meta &= !mask;
        }
        debug!(
            field = field.name,
            previous = format_args!("0x{previous:08x}"),
            current = format_args!("0x{:08x}", slot.meta),
            "Statistics word updated"
        );
        Ok(previous)
    }

    /// Check whether writes to a field reach the stats observer
    pub fn is_tracked(&self, name: &str) -> RecordResult<bool> {
        Ok(self.stats(name)? & STATS_TRACK_BIT != 0)
    }
}
