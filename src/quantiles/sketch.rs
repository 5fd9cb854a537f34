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

use std::cell::Cell;

use tracing::debug;

use super::CompactDoublesSketch;
use super::DEFAULT_K;
use super::accessor::BufferLayout;
use super::accessor::DoublesSketchAccessor;
use super::compactor::CarrySource;
use super::compactor::in_place_propagate_carry;
use super::helper::compute_bit_pattern;
use super::helper::compute_required_item_capacity;
use super::helper::compute_updatable_item_capacity;
use super::helper::grown_base_capacity;
use super::helper::is_valid_k;
use super::serialization;
use super::serialization::DecodedSketch;
use crate::common::Endianness;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;

pub(super) mod private {
    pub trait Sealed {}
}

/// Read access shared by [`UpdateDoublesSketch`] and [`CompactDoublesSketch`].
///
/// # Examples
///
/// ```
/// use datasketches_quantiles::quantiles::DoublesSketch;
/// use datasketches_quantiles::quantiles::UpdateDoublesSketch;
///
/// let mut sketch = UpdateDoublesSketch::new(128).unwrap();
/// sketch.update(3.0);
/// sketch.update(1.0);
///
/// fn describe(sketch: &dyn DoublesSketch) -> (u64, Option<f64>) {
///     (sketch.n(), sketch.min_value())
/// }
/// assert_eq!(describe(&sketch), (2, Some(1.0)));
/// assert_eq!(describe(&sketch.compact()), (2, Some(1.0)));
/// ```
pub trait DoublesSketch: private::Sealed {
    /// Returns parameter k.
    fn k(&self) -> u16;

    /// Returns the number of values the sketch has observed.
    fn n(&self) -> u64;

    /// Returns true if the sketch has not seen any data.
    fn is_empty(&self) -> bool {
        self.n() == 0
    }

    /// Returns true for the immutable, tightly packed variant.
    fn is_compact(&self) -> bool;

    /// Returns true if the sketch lives in off-heap memory. Always false.
    fn is_direct(&self) -> bool {
        false
    }

    /// Returns the smallest value seen, or `None` if empty.
    fn min_value(&self) -> Option<f64>;

    /// Returns the largest value seen, or `None` if empty.
    fn max_value(&self) -> Option<f64>;

    /// Returns the number of values waiting in the base buffer.
    fn base_buffer_count(&self) -> usize;

    /// Returns the level occupancy bits; bit `i` is set when level `i` holds
    /// `k` sorted items.
    fn bit_pattern(&self) -> u64;

    /// Returns the raw storage: base buffer first, then the levels.
    fn combined_buffer(&self) -> &[f64];

    /// Returns the number of items the sketch retains.
    fn num_retained(&self) -> usize {
        self.base_buffer_count() + self.bit_pattern().count_ones() as usize * self.k() as usize
    }

    /// Returns the exact size of [`DoublesSketch::serialize`]'s output.
    fn serialized_size_bytes(&self) -> usize {
        if self.is_compact() {
            serialization::compact_storage_bytes(self.k(), self.n())
        } else {
            serialization::updatable_storage_bytes(self.k(), self.n())
        }
    }

    /// Serializes the sketch in little-endian byte order.
    ///
    /// With `ordered`, the base buffer is written as a sorted copy; the live
    /// sketch is not touched.
    fn serialize(&self, ordered: bool) -> Vec<u8> {
        self.serialize_with_endianness(ordered, Endianness::Little)
    }

    /// Serializes the sketch in the given byte order.
    fn serialize_with_endianness(&self, ordered: bool, endianness: Endianness) -> Vec<u8> {
        serialization::serialize(self, ordered, endianness)
    }
}

/// Mutable quantiles sketch over `f64` values.
///
/// See the [quantiles module level documentation](crate::quantiles) for more.
#[derive(Debug, Clone)]
pub struct UpdateDoublesSketch<R: RandomSource = XorShift64> {
    k: u16,
    n: u64,
    combined_buffer: Vec<f64>,
    base_buffer_count: usize,
    bit_pattern: u64,
    min_value: f64,
    max_value: f64,
    rng: R,
}

impl UpdateDoublesSketch<XorShift64> {
    /// Creates a new sketch with the given value of k.
    ///
    /// A `k` of zero selects [`DEFAULT_K`].
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// unless k is a power of two in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::quantiles::{DoublesSketch, UpdateDoublesSketch};
    /// let sketch = UpdateDoublesSketch::new(0).unwrap();
    /// assert_eq!(sketch.k(), 128);
    /// assert!(UpdateDoublesSketch::new(100).is_err());
    /// ```
    pub fn new(k: u32) -> Result<Self, Error> {
        Self::with_rng(k, XorShift64::default())
    }

    /// Returns a builder for configuring a sketch.
    pub fn builder() -> DoublesSketchBuilder {
        DoublesSketchBuilder::default()
    }

    /// Deserializes a mutable sketch from either serialized layout.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        Self::deserialize_with_rng(bytes, XorShift64::default())
    }
}

impl<R: RandomSource> UpdateDoublesSketch<R> {
    /// Creates a new sketch drawing compaction parities from `rng`.
    ///
    /// # Errors
    ///
    /// Same as [`UpdateDoublesSketch::new`].
    pub fn with_rng(k: u32, rng: R) -> Result<Self, Error> {
        let k = if k == 0 { DEFAULT_K as u32 } else { k };
        if !is_valid_k(k) {
            return Err(Error::invalid_k(k));
        }
        let k = k as u16;
        Ok(Self {
            k,
            n: 0,
            combined_buffer: vec![0.0; compute_updatable_item_capacity(k, 0)],
            base_buffer_count: 0,
            bit_pattern: 0,
            min_value: f64::NAN,
            max_value: f64::NAN,
            rng,
        })
    }

    /// Deserializes a mutable sketch from either serialized layout, drawing
    /// future compaction parities from `rng`.
    pub fn deserialize_with_rng(bytes: &[u8], rng: R) -> Result<Self, Error> {
        let decoded = serialization::deserialize(bytes)?;
        Ok(Self::from_decoded(decoded, rng))
    }

    /// Updates the sketch with a value. NaN values are ignored.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::quantiles::{DoublesSketch, UpdateDoublesSketch};
    /// let mut sketch = UpdateDoublesSketch::new(2).unwrap();
    /// for v in [4.0, f64::NAN, 1.0, 3.0, 2.0, 5.0] {
    ///     sketch.update(v);
    /// }
    /// assert_eq!(sketch.n(), 5);
    /// assert_eq!(sketch.bit_pattern(), 1);
    /// assert_eq!(sketch.base_buffer_count(), 1);
    /// assert_eq!(sketch.max_value(), Some(5.0));
    /// ```
    pub fn update(&mut self, value: f64) {
        if value.is_nan() {
            return;
        }
        if self.n == 0 {
            self.min_value = value;
            self.max_value = value;
        } else {
            if value > self.max_value {
                self.max_value = value;
            }
            if value < self.min_value {
                self.min_value = value;
            }
        }

        let current_bb_count = self.base_buffer_count;
        let new_bb_count = current_bb_count + 1;
        let new_n = self.n + 1;

        if new_bb_count > self.combined_buffer.len() {
            self.grow_base_buffer();
        }
        self.combined_buffer[current_bb_count] = value;

        if new_bb_count == 2 * self.k as usize {
            let space_needed = compute_required_item_capacity(self.k, new_n);
            if space_needed > self.combined_buffer.len() {
                self.grow_combined_buffer(space_needed);
            }

            let new_bit_pattern = self.propagate_full_base_buffer();
            assert_eq!(
                new_bit_pattern,
                compute_bit_pattern(self.k, new_n),
                "bit pattern out of step with n = {new_n}"
            );
            assert_eq!(
                new_bit_pattern,
                self.bit_pattern + 1,
                "carry must increment the bit pattern"
            );

            self.bit_pattern = new_bit_pattern;
            self.base_buffer_count = 0;
        } else {
            self.base_buffer_count = new_bb_count;
        }
        self.n = new_n;
    }

    /// Returns an immutable, tightly packed copy of this sketch.
    pub fn compact(&self) -> CompactDoublesSketch {
        CompactDoublesSketch::from_update_sketch(self)
    }

    fn propagate_full_base_buffer(&mut self) -> u64 {
        let layout = BufferLayout::of(&*self);
        let cells = Cell::from_mut(self.combined_buffer.as_mut_slice()).as_slice_of_cells();

        let base_buffer = DoublesSketchAccessor::new(cells, layout, true);
        base_buffer.sort();
        let mut target = DoublesSketchAccessor::new(cells, layout, true);

        in_place_propagate_carry(
            0,
            CarrySource::BaseBuffer,
            &base_buffer,
            &mut target,
            self.bit_pattern,
            &mut self.rng,
        )
    }

    fn grow_base_buffer(&mut self) {
        let old_capacity = self.combined_buffer.len();
        assert!(
            old_capacity < 2 * self.k as usize,
            "base buffer already spans 2k items"
        );
        let new_capacity = grown_base_capacity(self.k, old_capacity);
        self.combined_buffer.resize(new_capacity, 0.0);
        debug!(k = self.k, old_capacity, new_capacity, "grew base buffer");
    }

    fn grow_combined_buffer(&mut self, space_needed: usize) {
        let old_capacity = self.combined_buffer.len();
        self.combined_buffer.resize(space_needed, 0.0);
        debug!(
            k = self.k,
            old_capacity,
            new_capacity = space_needed,
            "grew combined buffer"
        );
    }

    fn from_decoded(decoded: DecodedSketch, rng: R) -> Self {
        let DecodedSketch {
            k,
            n,
            min_value,
            max_value,
            base_buffer,
            levels,
        } = decoded;
        let k_items = k as usize;
        let bit_pattern = compute_bit_pattern(k, n);

        let mut combined_buffer = vec![0.0; compute_updatable_item_capacity(k, n)];
        combined_buffer[..base_buffer.len()].copy_from_slice(&base_buffer);
        for (level, items) in levels.iter().enumerate() {
            if !items.is_empty() {
                let start = (2 + level) * k_items;
                combined_buffer[start..start + k_items].copy_from_slice(items);
            }
        }

        Self {
            k,
            n,
            combined_buffer,
            base_buffer_count: base_buffer.len(),
            bit_pattern,
            min_value,
            max_value,
            rng,
        }
    }
}

impl<R: RandomSource> private::Sealed for UpdateDoublesSketch<R> {}

impl<R: RandomSource> DoublesSketch for UpdateDoublesSketch<R> {
    fn k(&self) -> u16 {
        self.k
    }

    fn n(&self) -> u64 {
        self.n
    }

    fn is_compact(&self) -> bool {
        false
    }

    fn min_value(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.min_value)
    }

    fn max_value(&self) -> Option<f64> {
        (!self.is_empty()).then_some(self.max_value)
    }

    fn base_buffer_count(&self) -> usize {
        self.base_buffer_count
    }

    fn bit_pattern(&self) -> u64 {
        self.bit_pattern
    }

    fn combined_buffer(&self) -> &[f64] {
        &self.combined_buffer
    }
}

/// Builder for [`UpdateDoublesSketch`].
///
/// # Examples
///
/// ```
/// # use datasketches_quantiles::common::XorShift64;
/// # use datasketches_quantiles::quantiles::{DoublesSketch, UpdateDoublesSketch};
/// let sketch = UpdateDoublesSketch::builder()
///     .k(256)
///     .rng(XorShift64::seeded(7))
///     .build()
///     .unwrap();
/// assert_eq!(sketch.k(), 256);
/// ```
#[derive(Debug)]
pub struct DoublesSketchBuilder<R: RandomSource = XorShift64> {
    k: u32,
    rng: R,
}

impl Default for DoublesSketchBuilder<XorShift64> {
    fn default() -> Self {
        Self {
            k: DEFAULT_K as u32,
            rng: XorShift64::default(),
        }
    }
}

impl<R: RandomSource> DoublesSketchBuilder<R> {
    /// Set parameter k. Zero selects the default.
    pub fn k(mut self, k: u32) -> Self {
        self.k = k;
        self
    }

    /// Set the random source used for compaction.
    pub fn rng<R2: RandomSource>(self, rng: R2) -> DoublesSketchBuilder<R2> {
        DoublesSketchBuilder { k: self.k, rng }
    }

    /// Build the sketch.
    ///
    /// # Errors
    ///
    /// Returns an error if k is not a power of two in [MIN_K, MAX_K].
    pub fn build(self) -> Result<UpdateDoublesSketch<R>, Error> {
        UpdateDoublesSketch::with_rng(self.k, self.rng)
    }
}
