// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! Windowed views over the flat storage of a quantiles sketch.
//!
//! Storage is one `[f64]` holding the base buffer followed by the levels.
//! A mutable sketch reserves `k` slots for every level at offset
//! `(2 + level) * k`; a compact sketch packs only the occupied levels right
//! after its base buffer.
//!
//! Accessors over `[Cell<f64>]` may write, and several of them may share the
//! same storage, which lets the compactor keep one view on the scratch buffer
//! while another walks up the levels.

use std::cell::Cell;

use super::DoublesSketch;

/// The region a [`DoublesSketchAccessor`] is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BufferLevel {
    /// The base buffer.
    Base,
    /// One of the k-sized levels.
    Level(u32),
}

/// Sketch metadata that determines where each window lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BufferLayout {
    pub k: usize,
    pub base_buffer_count: usize,
    pub bit_pattern: u64,
    pub compact: bool,
}

impl BufferLayout {
    pub fn of<S: DoublesSketch + ?Sized>(sketch: &S) -> Self {
        Self {
            k: sketch.k() as usize,
            base_buffer_count: sketch.base_buffer_count(),
            bit_pattern: sketch.bit_pattern(),
            compact: sketch.is_compact(),
        }
    }

    fn count_valid_levels_below(&self, level: u32) -> usize {
        let mask = match 1u64.checked_shl(level) {
            Some(bit) => bit - 1,
            None => u64::MAX,
        };
        (self.bit_pattern & mask).count_ones() as usize
    }
}

/// Backing storage an accessor can read from.
pub(crate) trait ItemStorage {
    fn load(&self, idx: usize) -> f64;
}

impl ItemStorage for [f64] {
    fn load(&self, idx: usize) -> f64 {
        self[idx]
    }
}

impl ItemStorage for [Cell<f64>] {
    fn load(&self, idx: usize) -> f64 {
        self[idx].get()
    }
}

pub(crate) struct DoublesSketchAccessor<'a, S: ?Sized> {
    items: &'a S,
    layout: BufferLayout,
    force_size: bool,
    level: BufferLevel,
    offset: usize,
    num_items: usize,
}

impl<'a, S: ItemStorage + ?Sized> DoublesSketchAccessor<'a, S> {
    /// Creates an accessor bound to the base buffer.
    ///
    /// With `force_size` every window spans its full slot capacity whatever
    /// the occupancy says, which the compactor needs before the bit pattern
    /// is updated.
    pub fn new(items: &'a S, layout: BufferLayout, force_size: bool) -> Self {
        let mut accessor = Self {
            items,
            layout,
            force_size,
            level: BufferLevel::Base,
            offset: 0,
            num_items: 0,
        };
        accessor.set_level(BufferLevel::Base);
        accessor
    }

    pub fn set_level(&mut self, level: BufferLevel) {
        let k = self.layout.k;
        self.level = level;
        match level {
            BufferLevel::Base => {
                self.num_items = if self.force_size {
                    2 * k
                } else {
                    self.layout.base_buffer_count
                };
                self.offset = 0;
            }
            BufferLevel::Level(lvl) => {
                let occupied = lvl < 64 && (self.layout.bit_pattern >> lvl) & 1 != 0;
                self.num_items = if self.force_size || occupied { k } else { 0 };
                self.offset = if self.layout.compact {
                    self.layout.base_buffer_count + self.layout.count_valid_levels_below(lvl) * k
                } else {
                    (2 + lvl as usize) * k
                };
            }
        }
    }

    /// Returns a new accessor on the same storage bound to `level`.
    pub fn copy_and_set_level(&self, level: BufferLevel) -> Self {
        let mut accessor = Self {
            items: self.items,
            layout: self.layout,
            force_size: self.force_size,
            level: self.level,
            offset: self.offset,
            num_items: self.num_items,
        };
        accessor.set_level(level);
        accessor
    }

    #[cfg(test)]
    pub fn level(&self) -> BufferLevel {
        self.level
    }

    pub fn num_items(&self) -> usize {
        self.num_items
    }

    pub fn get(&self, idx: usize) -> f64 {
        assert!(
            idx < self.num_items,
            "index {idx} out of window of {} items at {:?}",
            self.num_items,
            self.level
        );
        self.items.load(self.offset + idx)
    }

    pub fn get_array(&self, from: usize, count: usize) -> Vec<f64> {
        self.check_range(from, count);
        (from..from + count)
            .map(|idx| self.items.load(self.offset + idx))
            .collect()
    }

    fn check_range(&self, from: usize, count: usize) {
        assert!(
            from + count <= self.num_items,
            "range [{from}, {}) out of window of {} items at {:?}",
            from + count,
            self.num_items,
            self.level
        );
    }
}

impl<'a> DoublesSketchAccessor<'a, [f64]> {
    /// Borrows `count` items starting at `from` without copying.
    pub fn slice(&self, from: usize, count: usize) -> &'a [f64] {
        self.check_range(from, count);
        let start = self.offset + from;
        &self.items[start..start + count]
    }
}

impl DoublesSketchAccessor<'_, [Cell<f64>]> {
    pub fn set(&self, idx: usize, value: f64) {
        assert!(
            idx < self.num_items,
            "index {idx} out of window of {} items at {:?}",
            self.num_items,
            self.level
        );
        self.items[self.offset + idx].set(value);
    }

    /// Copies `src` into the window starting at `dst_from`.
    pub fn put_array(&self, src: &[f64], dst_from: usize) {
        self.check_range(dst_from, src.len());
        let start = self.offset + dst_from;
        for (cell, value) in self.items[start..start + src.len()].iter().zip(src) {
            cell.set(*value);
        }
    }

    /// Sorts the window ascending. Compact levels are frozen and left as is.
    pub fn sort(&self) {
        if self.layout.compact {
            return;
        }
        let mut values = self.get_array(0, self.num_items);
        values.sort_by(f64::total_cmp);
        self.put_array(&values, 0);
    }
}
