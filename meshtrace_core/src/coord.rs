// Copyright 2026 the Meshtrace Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core coordinates and the slot mapping.
//!
//! A core's hardware identifier packs its mesh row and column into two bit
//! fields. [`Topology`] describes where those fields live and which
//! rectangle of the mesh participates in a run, and provides the mapping
//!
//! ```text
//! slot = (row - first_row) * cols + (col - first_col)
//! ```
//!
//! from a [`CoreCoordinate`] to its [`SlotIndex`] in the shared region. The
//! mapping is a bijection from the participant rectangle onto
//! `0..CORE_COUNT`; coordinates outside the rectangle are rejected with a
//! [`TopologyError`] instead of producing a bogus index.

use core::fmt;

use crate::error::TopologyError;
use crate::hal::CoreId;

/// Number of participating cores.
pub const CORE_COUNT: usize = 16;

/// A core's position in the mesh.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CoreCoordinate {
    /// Mesh row.
    pub row: u16,
    /// Mesh column.
    pub col: u16,
}

impl CoreCoordinate {
    /// Creates a coordinate.
    #[inline]
    #[must_use]
    pub const fn new(row: u16, col: u16) -> Self {
        Self { row, col }
    }
}

impl fmt::Debug for CoreCoordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.row, self.col)
    }
}

/// Index of a core's exclusive slot in the shared region.
///
/// Always less than [`CORE_COUNT`] when produced by [`Topology`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SlotIndex(pub usize);

impl SlotIndex {
    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

impl fmt::Debug for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SlotIndex({})", self.0)
    }
}

impl fmt::Display for SlotIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Mesh geometry: identifier bit fields and the participant rectangle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Topology {
    /// Row of the first participating core.
    pub first_row: u16,
    /// Column of the first participating core.
    pub first_col: u16,
    /// Number of participating rows.
    pub rows: u16,
    /// Number of participating columns (the row width of the mapping).
    pub cols: u16,
    /// Bit offset of the row field in the core identifier.
    pub row_shift: u8,
    /// Bit offset of the column field in the core identifier.
    pub col_shift: u8,
    /// Width in bits of each field.
    pub field_bits: u8,
}

impl Topology {
    /// The 4×4 participant block starting at mesh position (32, 8), with
    /// 6-bit row and column fields.
    #[must_use]
    pub const fn e16() -> Self {
        Self {
            first_row: 32,
            first_col: 8,
            rows: 4,
            cols: 4,
            row_shift: 6,
            col_shift: 0,
            field_bits: 6,
        }
    }

    /// Creates a validated topology.
    ///
    /// The rectangle must hold exactly [`CORE_COUNT`] cores, the field width
    /// must be 1–8 bits (coordinates are published as `u8`), both fields
    /// must fit the 16-bit identifier without overlapping, and the rectangle
    /// must fit the fields.
    pub const fn new(
        first_row: u16,
        first_col: u16,
        rows: u16,
        cols: u16,
        row_shift: u8,
        col_shift: u8,
        field_bits: u8,
    ) -> Result<Self, TopologyError> {
        let topology = Self {
            first_row,
            first_col,
            rows,
            cols,
            row_shift,
            col_shift,
            field_bits,
        };
        match topology.validate() {
            Ok(()) => Ok(topology),
            Err(e) => Err(e),
        }
    }

    /// Checks the invariants listed on [`Topology::new`].
    pub const fn validate(&self) -> Result<(), TopologyError> {
        if self.rows as usize * self.cols as usize != CORE_COUNT {
            return Err(TopologyError::Geometry {
                rows: self.rows,
                cols: self.cols,
            });
        }
        if self.field_bits == 0
            || self.field_bits > 8
            || self.row_shift as u32 + self.field_bits as u32 > 16
            || self.col_shift as u32 + self.field_bits as u32 > 16
            || self.fields_overlap()
        {
            return Err(TopologyError::FieldLayout {
                row_shift: self.row_shift,
                col_shift: self.col_shift,
                field_bits: self.field_bits,
            });
        }
        let limit = 1_u32 << self.field_bits;
        if self.first_row as u32 + self.rows as u32 > limit
            || self.first_col as u32 + self.cols as u32 > limit
        {
            return Err(TopologyError::Geometry {
                rows: self.rows,
                cols: self.cols,
            });
        }
        Ok(())
    }

    /// Whether the row and column bit ranges share any bit.
    const fn fields_overlap(&self) -> bool {
        let row = self.row_shift as u32;
        let col = self.col_shift as u32;
        let width = self.field_bits as u32;
        row < col + width && col < row + width
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "widths of 16 bits or more are clamped to the full mask first"
    )]
    const fn field_mask(&self) -> u16 {
        if self.field_bits >= 16 {
            u16::MAX
        } else {
            ((1_u32 << self.field_bits) - 1) as u16
        }
    }

    /// Splits a hardware identifier into its row and column fields.
    #[must_use]
    pub fn coordinates(&self, id: CoreId) -> CoreCoordinate {
        let mask = self.field_mask();
        CoreCoordinate {
            row: id.0.checked_shr(u32::from(self.row_shift)).unwrap_or(0) & mask,
            col: id.0.checked_shr(u32::from(self.col_shift)).unwrap_or(0) & mask,
        }
    }

    /// Packs a coordinate back into a hardware identifier.
    #[must_use]
    pub fn core_id_of(&self, coord: CoreCoordinate) -> CoreId {
        let mask = self.field_mask();
        let row = (coord.row & mask)
            .checked_shl(u32::from(self.row_shift))
            .unwrap_or(0);
        let col = (coord.col & mask)
            .checked_shl(u32::from(self.col_shift))
            .unwrap_or(0);
        CoreId(row | col)
    }

    /// Returns whether `coord` lies inside the participant rectangle.
    #[must_use]
    pub const fn contains(&self, coord: CoreCoordinate) -> bool {
        coord.row >= self.first_row
            && coord.row - self.first_row < self.rows
            && coord.col >= self.first_col
            && coord.col - self.first_col < self.cols
    }

    /// Maps a coordinate to its slot in the shared region.
    pub const fn slot_index(&self, coord: CoreCoordinate) -> Result<SlotIndex, TopologyError> {
        if !self.contains(coord) {
            return Err(TopologyError::OutsideRectangle {
                row: coord.row,
                col: coord.col,
            });
        }
        let row = (coord.row - self.first_row) as usize;
        let col = (coord.col - self.first_col) as usize;
        Ok(SlotIndex(row * self.cols as usize + col))
    }

    /// Inverse of [`slot_index`](Self::slot_index).
    ///
    /// Returns `None` if `slot` is not below [`CORE_COUNT`].
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "slot < CORE_COUNT, so the row/column offsets fit in u16"
    )]
    pub const fn coordinate_of(&self, slot: SlotIndex) -> Option<CoreCoordinate> {
        if slot.0 >= CORE_COUNT || self.cols == 0 {
            return None;
        }
        let cols = self.cols as usize;
        Some(CoreCoordinate {
            row: self.first_row + (slot.0 / cols) as u16,
            col: self.first_col + (slot.0 % cols) as u16,
        })
    }

    /// Iterates over all participant coordinates in slot order.
    pub fn participants(&self) -> impl Iterator<Item = CoreCoordinate> + '_ {
        (0..CORE_COUNT).filter_map(|i| self.coordinate_of(SlotIndex(i)))
    }
}

impl Default for Topology {
    fn default() -> Self {
        Self::e16()
    }
}
