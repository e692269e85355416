// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The shared output region.
//!
//! [`SharedRegion`] holds one [`PACKET_SIZE`] slot per participating core.
//! Each slot can be written exactly once; a second publish to the same slot
//! fails with [`PublishError::AlreadyPublished`] instead of overwriting. A
//! slot is either empty or holds a complete packet, never a partial copy.
//!
//! The region is `const`-constructible so it can live in a `static` that all
//! cores share:
//!
//! ```
//! use meshtrace_core::region::SharedRegion;
//!
//! static OUTBUF: SharedRegion = SharedRegion::new();
//! assert_eq!(OUTBUF.published_count(), 0);
//! ```

use conquer_once::TryInitError;
use conquer_once::spin::OnceCell;

use crate::coord::{CORE_COUNT, SlotIndex};
use crate::error::PublishError;
use crate::packet::PACKET_SIZE;

/// One fixed-size packet slot per core.
pub struct SharedRegion {
    slots: [OnceCell<[u8; PACKET_SIZE]>; CORE_COUNT],
}

impl core::fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SharedRegion")
            .field("published", &self.published_count())
            .field("slots", &CORE_COUNT)
            .finish()
    }
}

impl SharedRegion {
    /// Creates a region with every slot empty.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [const { OnceCell::uninit() }; CORE_COUNT],
        }
    }

    /// Copies `packet` into `slot`.
    pub fn publish(&self, slot: SlotIndex, packet: &[u8; PACKET_SIZE]) -> Result<(), PublishError> {
        let cell = self
            .slots
            .get(slot.get())
            .ok_or(PublishError::SlotOutOfRange(slot))?;
        cell.try_init_once(|| *packet).map_err(|e| match e {
            TryInitError::AlreadyInit => PublishError::AlreadyPublished(slot),
            TryInitError::WouldBlock => PublishError::Busy(slot),
        })?;
        log::trace!("published slot {slot}");
        Ok(())
    }

    /// Returns the packet in `slot`, or `None` if it is empty or out of range.
    #[must_use]
    pub fn slot(&self, slot: SlotIndex) -> Option<&[u8; PACKET_SIZE]> {
        self.slots.get(slot.get())?.get()
    }

    /// Returns whether `slot` holds a packet.
    #[must_use]
    pub fn is_published(&self, slot: SlotIndex) -> bool {
        self.slots
            .get(slot.get())
            .is_some_and(OnceCell::is_initialized)
    }

    /// Returns the number of filled slots.
    #[must_use]
    pub fn published_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_initialized()).count()
    }

    /// Returns whether every slot holds a packet.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(OnceCell::is_initialized)
    }

    /// Iterates over `(slot, packet)` for every filled slot, in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &[u8; PACKET_SIZE])> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, cell)| cell.get().map(|p| (SlotIndex(i), p)))
    }
}

impl Default for SharedRegion {
    fn default() -> Self {
        Self::new()
    }
}

/// Something a finished packet can be handed to.
///
/// [`SharedRegion`] is the usual target; tests and hosts can substitute
/// their own.
pub trait Publisher {
    /// Stores `packet` as the output of `slot`.
    fn publish(&self, slot: SlotIndex, packet: &[u8; PACKET_SIZE]) -> Result<(), PublishError>;
}

impl Publisher for SharedRegion {
    fn publish(&self, slot: SlotIndex, packet: &[u8; PACKET_SIZE]) -> Result<(), PublishError> {
        Self::publish(self, slot, packet)
    }
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn publish(&self, slot: SlotIndex, packet: &[u8; PACKET_SIZE]) -> Result<(), PublishError> {
        (**self).publish(slot, packet)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static REGION: SharedRegion = SharedRegion::new();

    #[test]
    fn publish_once_then_reject() {
        let region = SharedRegion::new();
        let a = [1_u8; PACKET_SIZE];
        let b = [2_u8; PACKET_SIZE];
        region.publish(SlotIndex(3), &a).unwrap();
        assert_eq!(
            region.publish(SlotIndex(3), &b),
            Err(PublishError::AlreadyPublished(SlotIndex(3)))
        );
        assert_eq!(region.slot(SlotIndex(3)), Some(&a), "first write wins");
        assert!(region.is_published(SlotIndex(3)));
        assert!(!region.is_published(SlotIndex(2)));
    }

    #[test]
    fn out_of_range_slot() {
        let region = SharedRegion::new();
        let p = [0_u8; PACKET_SIZE];
        assert_eq!(
            region.publish(SlotIndex(CORE_COUNT), &p),
            Err(PublishError::SlotOutOfRange(SlotIndex(CORE_COUNT)))
        );
        assert_eq!(region.slot(SlotIndex(CORE_COUNT)), None);
        assert!(!region.is_published(SlotIndex(99)));
    }

    #[test]
    fn completeness_tracks_all_slots() {
        let region = SharedRegion::new();
        assert_eq!(region.published_count(), 0);
        assert!(!region.is_complete());
        for i in 0..CORE_COUNT {
            let mut p = [0_u8; PACKET_SIZE];
            p[0] = u8::try_from(i).unwrap();
            region.publish(SlotIndex(i), &p).unwrap();
        }
        assert!(region.is_complete());
        assert_eq!(region.published_count(), CORE_COUNT);
        for (slot, packet) in region.iter() {
            assert_eq!(usize::from(packet[0]), slot.get());
        }
    }

    #[test]
    fn usable_from_a_static() {
        let p = [7_u8; PACKET_SIZE];
        REGION.publish(SlotIndex(0), &p).unwrap();
        assert_eq!(REGION.slot(SlotIndex(0)).map(|s| s[0]), Some(7));
    }
}
