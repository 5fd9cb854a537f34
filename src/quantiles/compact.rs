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

use super::DoublesSketch;
use super::UpdateDoublesSketch;
use super::accessor::BufferLayout;
use super::accessor::BufferLevel;
use super::accessor::DoublesSketchAccessor;
use super::helper::compute_bit_pattern;
use super::helper::compute_total_levels;
use super::serialization;
use super::serialization::DecodedSketch;
use super::sketch::private;
use crate::common::RandomSource;
use crate::error::Error;

/// A compact, immutable quantiles sketch.
///
/// Holds the base buffer followed by the occupied levels with no unused
/// slots. It shares nothing with the sketch it was built from and cannot be
/// updated.
///
/// # Example
///
/// ```
/// use datasketches_quantiles::quantiles::CompactDoublesSketch;
/// use datasketches_quantiles::quantiles::DoublesSketch;
/// use datasketches_quantiles::quantiles::UpdateDoublesSketch;
///
/// let mut sketch = UpdateDoublesSketch::new(16).unwrap();
/// for i in 0..100 {
///     sketch.update(i as f64);
/// }
/// let compact = sketch.compact();
/// assert_eq!(compact.num_retained(), compact.combined_buffer().len());
///
/// let restored = CompactDoublesSketch::deserialize(&compact.serialize(true)).unwrap();
/// assert_eq!(restored.n(), 100);
/// assert_eq!(restored.max_value(), Some(99.0));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct CompactDoublesSketch {
    k: u16,
    n: u64,
    combined_buffer: Vec<f64>,
    base_buffer_count: usize,
    bit_pattern: u64,
    min_value: f64,
    max_value: f64,
}

impl CompactDoublesSketch {
    pub(super) fn from_update_sketch<R: RandomSource>(sketch: &UpdateDoublesSketch<R>) -> Self {
        let k = sketch.k() as usize;
        let base_buffer_count = sketch.base_buffer_count();
        let bit_pattern = sketch.bit_pattern();
        let retained = sketch.num_retained();

        let mut combined_buffer = Vec::with_capacity(retained);
        let mut accessor =
            DoublesSketchAccessor::new(sketch.combined_buffer(), BufferLayout::of(sketch), false);
        combined_buffer.extend_from_slice(accessor.slice(0, base_buffer_count));

        for level in 0..compute_total_levels(bit_pattern) as u32 {
            accessor.set_level(BufferLevel::Level(level));
            if accessor.num_items() > 0 {
                combined_buffer.extend_from_slice(accessor.slice(0, k));
            }
        }
        assert_eq!(combined_buffer.len(), retained, "compact buffer size mismatch");

        Self {
            k: sketch.k(),
            n: sketch.n(),
            combined_buffer,
            base_buffer_count,
            bit_pattern,
            min_value: sketch.min_value().unwrap_or(f64::NAN),
            max_value: sketch.max_value().unwrap_or(f64::NAN),
        }
    }

    /// Deserializes a compact sketch from either serialized layout.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are truncated, carry the wrong family or
    /// serial version, or hold an invalid k.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let DecodedSketch {
            k,
            n,
            min_value,
            max_value,
            base_buffer,
            levels,
        } = serialization::deserialize(bytes)?;
        let bit_pattern = compute_bit_pattern(k, n);
        let base_buffer_count = base_buffer.len();

        let mut combined_buffer = base_buffer;
        for (level, items) in levels.into_iter().enumerate() {
            if bit_pattern & (1u64 << level) != 0 {
                combined_buffer.extend(items);
            }
        }

        Ok(Self {
            k,
            n,
            combined_buffer,
            base_buffer_count,
            bit_pattern,
            min_value,
            max_value,
        })
    }
}

impl private::Sealed for CompactDoublesSketch {}

impl DoublesSketch for CompactDoublesSketch {
    fn k(&self) -> u16 {
        self.k
    }

    fn n(&self) -> u64 {
        self.n
    }

    fn is_compact(&self) -> bool {
        true
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
