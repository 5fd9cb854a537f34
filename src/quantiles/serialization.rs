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

//! Binary serialization format for quantiles doubles sketches.
//!
//! The layout is shared with the DataSketches Java, C++ and Go
//! implementations of `DoublesSketch`.
//!
//! ## Preamble
//!
//! | Byte | Field | Description |
//! |------|-------|-------------|
//! | 0 | preamble_longs | 1 if empty, else 2 |
//! | 1 | serial_version | 3 |
//! | 2 | family_id | 8 |
//! | 3 | flags | see below |
//! | 4-5 | k | |
//! | 6-7 | unused | 0 |
//! | 8-15 | n | absent when empty |
//! | 16-23 | min_value | absent when empty |
//! | 24-31 | max_value | absent when empty |
//!
//! ## Flags (Byte 3)
//!
//! | Bit | Name |
//! |-----|------|
//! | 0 | BIG_ENDIAN |
//! | 1 | READ_ONLY |
//! | 2 | EMPTY |
//! | 3 | COMPACT |
//! | 4 | ORDERED |
//!
//! ## Data (byte 32 onwards)
//!
//! Updatable layout: the base buffer items, then starting at `32 + 2k * 8`
//! every level up to the highest occupied one, `k` items each.
//!
//! Compact layout: the base buffer items, then each occupied level's `k`
//! items in ascending level order.

use super::DoublesSketch;
use super::MIN_K;
use super::accessor::BufferLayout;
use super::accessor::BufferLevel;
use super::accessor::DoublesSketchAccessor;
use super::helper::compute_base_buffer_items;
use super::helper::compute_bit_pattern;
use super::helper::compute_retained_items;
use super::helper::compute_total_levels;
use super::helper::compute_updatable_item_capacity;
use super::helper::is_valid_k;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::Endianness;
use crate::error::Error;

pub(super) const QUANTILES_FAMILY_ID: u8 = 8;
pub(super) const SERIAL_VERSION: u8 = 3;

pub(super) const PREAMBLE_LONGS_EMPTY: u8 = 1;
pub(super) const PREAMBLE_LONGS_FULL: u8 = 2;

pub(super) const PREAMBLE_LONGS_BYTE: usize = 0;
pub(super) const SER_VER_BYTE: usize = 1;
pub(super) const FAMILY_BYTE: usize = 2;
pub(super) const FLAGS_BYTE: usize = 3;
pub(super) const K_SHORT: usize = 4;
pub(super) const N_LONG: usize = 8;
pub(super) const MIN_DOUBLE: usize = 16;
pub(super) const MAX_DOUBLE: usize = 24;
pub(super) const COMBINED_BUFFER: usize = 32;

pub(super) const FLAG_BIG_ENDIAN: u8 = 1 << 0;
pub(super) const FLAG_READ_ONLY: u8 = 1 << 1;
pub(super) const FLAG_EMPTY: u8 = 1 << 2;
pub(super) const FLAG_COMPACT: u8 = 1 << 3;
pub(super) const FLAG_ORDERED: u8 = 1 << 4;

pub(super) const EMPTY_SIZE_BYTES: usize = 8;

/// Preamble plus min and max, in longs.
const META_PRE_LONGS: usize = PREAMBLE_LONGS_FULL as usize + 2;

pub(super) fn updatable_storage_bytes(k: u16, n: u64) -> usize {
    if n == 0 {
        return EMPTY_SIZE_BYTES;
    }
    (META_PRE_LONGS + compute_updatable_item_capacity(k, n)) << 3
}

pub(super) fn compact_storage_bytes(k: u16, n: u64) -> usize {
    if n == 0 {
        return EMPTY_SIZE_BYTES;
    }
    (META_PRE_LONGS + compute_retained_items(k, n)) << 3
}

pub(super) fn serialize<S: DoublesSketch + ?Sized>(
    sketch: &S,
    ordered: bool,
    endianness: Endianness,
) -> Vec<u8> {
    let k = sketch.k();
    let n = sketch.n();
    let compact = sketch.is_compact();
    let is_empty = sketch.is_empty();

    let mut bytes = SketchBytes::zeroed(sketch.serialized_size_bytes(), endianness);

    let flags = (if endianness.is_big() { FLAG_BIG_ENDIAN } else { 0 })
        | (if is_empty { FLAG_EMPTY } else { 0 })
        | (if compact {
            FLAG_COMPACT | FLAG_READ_ONLY
        } else {
            0
        })
        | (if ordered { FLAG_ORDERED } else { 0 });
    let preamble_longs = if is_empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_FULL
    };

    bytes.put_u8(PREAMBLE_LONGS_BYTE, preamble_longs);
    bytes.put_u8(SER_VER_BYTE, SERIAL_VERSION);
    bytes.put_u8(FAMILY_BYTE, QUANTILES_FAMILY_ID);
    bytes.put_u8(FLAGS_BYTE, flags);
    bytes.put_u16(K_SHORT, k);

    if is_empty {
        return bytes.into_bytes();
    }

    bytes.put_u64(N_LONG, n);
    bytes.put_f64(MIN_DOUBLE, sketch.min_value().unwrap_or(f64::NAN));
    bytes.put_f64(MAX_DOUBLE, sketch.max_value().unwrap_or(f64::NAN));

    let k_items = k as usize;
    let bb_count = sketch.base_buffer_count();
    let mut accessor = DoublesSketchAccessor::new(
        sketch.combined_buffer(),
        BufferLayout::of(sketch),
        !compact,
    );

    let mut offset = COMBINED_BUFFER;
    if bb_count > 0 {
        let base_buffer = accessor.slice(0, bb_count);
        if ordered {
            let mut sorted = base_buffer.to_vec();
            sorted.sort_by(f64::total_cmp);
            bytes.put_f64_slice(offset, &sorted);
        } else {
            bytes.put_f64_slice(offset, base_buffer);
        }
    }
    offset += (if compact { bb_count } else { 2 * k_items }) << 3;

    for level in 0..compute_total_levels(sketch.bit_pattern()) as u32 {
        accessor.set_level(BufferLevel::Level(level));
        if accessor.num_items() > 0 {
            assert_eq!(accessor.num_items(), k_items, "level {level} must hold k items");
            offset = bytes.put_f64_slice(offset, accessor.slice(0, k_items));
        }
    }

    if compact || n > k as u64 {
        assert_eq!(offset, bytes.len(), "serialized size mismatch");
    }
    bytes.into_bytes()
}

/// Fields recovered from serialized bytes, independent of the layout.
///
/// `levels` has one entry per level up to the highest occupied one. In the
/// compact layout unoccupied levels are empty; in the updatable layout every
/// entry holds the `k` items stored in that slot, occupied or not.
pub(super) struct DecodedSketch {
    pub k: u16,
    pub n: u64,
    pub min_value: f64,
    pub max_value: f64,
    pub base_buffer: Vec<f64>,
    pub levels: Vec<Vec<f64>>,
}

pub(super) fn deserialize(bytes: &[u8]) -> Result<DecodedSketch, Error> {
    fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
        move |_| Error::insufficient_data(tag)
    }

    let mut cursor = SketchSlice::new(bytes);

    let preamble_longs = cursor.read_u8().map_err(make_error("preamble_longs"))?;
    let serial_version = cursor.read_u8().map_err(make_error("serial_version"))?;
    let family_id = cursor.read_u8().map_err(make_error("family_id"))?;
    let flags = cursor.read_u8().map_err(make_error("flags"))?;

    if family_id != QUANTILES_FAMILY_ID {
        return Err(Error::invalid_family(
            QUANTILES_FAMILY_ID,
            family_id,
            "QUANTILES",
        ));
    }
    if serial_version != SERIAL_VERSION {
        return Err(Error::unsupported_serial_version(
            SERIAL_VERSION,
            serial_version,
        ));
    }

    if flags & FLAG_BIG_ENDIAN != 0 {
        cursor.set_endianness(Endianness::Big);
    }
    let k = cursor.read_u16().map_err(make_error("k"))?;
    if !is_valid_k(k as u32) {
        return Err(Error::deserial(format!(
            "k must be a power of 2 not less than {MIN_K}, got {k}"
        )));
    }

    let is_empty = flags & FLAG_EMPTY != 0;
    let is_compact = flags & FLAG_COMPACT != 0;
    let expected_preamble_longs = if is_empty {
        PREAMBLE_LONGS_EMPTY
    } else {
        PREAMBLE_LONGS_FULL
    };
    if preamble_longs != expected_preamble_longs {
        return Err(Error::deserial(format!(
            "invalid preamble longs: expected {expected_preamble_longs}, got {preamble_longs}"
        )));
    }

    if is_empty {
        return Ok(DecodedSketch {
            k,
            n: 0,
            min_value: f64::NAN,
            max_value: f64::NAN,
            base_buffer: Vec::new(),
            levels: Vec::new(),
        });
    }

    cursor.seek(N_LONG);
    let n = cursor.read_u64().map_err(make_error("n"))?;
    if n == 0 {
        return Err(Error::deserial("n must be > 0 when the empty flag is unset"));
    }
    if n > i64::MAX as u64 {
        return Err(Error::deserial(format!("n must fit in a signed 64-bit integer, got {n}")));
    }
    let min_value = cursor.read_f64().map_err(make_error("min_value"))?;
    let max_value = cursor.read_f64().map_err(make_error("max_value"))?;
    if min_value.is_nan() || max_value.is_nan() || min_value > max_value {
        return Err(Error::deserial(format!(
            "invalid min/max of a non-empty sketch: min {min_value}, max {max_value}"
        )));
    }

    let expected_bytes = if is_compact {
        compact_storage_bytes(k, n)
    } else {
        updatable_storage_bytes(k, n)
    };
    if bytes.len() < expected_bytes {
        return Err(Error::insufficient_data(format!(
            "sketch data: expected {expected_bytes} bytes, got {}",
            bytes.len()
        )));
    }

    let k_items = k as usize;
    let bb_count = compute_base_buffer_items(k, n);
    let bit_pattern = compute_bit_pattern(k, n);

    let mut base_buffer = vec![0.0; bb_count];
    cursor
        .read_f64_into(&mut base_buffer)
        .map_err(make_error("base_buffer"))?;

    let base_region = if is_compact { bb_count } else { 2 * k_items };
    cursor.seek(COMBINED_BUFFER + (base_region << 3));

    let total_levels = compute_total_levels(bit_pattern);
    let mut levels = Vec::with_capacity(total_levels);
    for level in 0..total_levels {
        if is_compact && bit_pattern & (1u64 << level) == 0 {
            levels.push(Vec::new());
            continue;
        }
        let mut items = vec![0.0; k_items];
        cursor
            .read_f64_into(&mut items)
            .map_err(make_error("levels"))?;
        levels.push(items);
    }

    Ok(DecodedSketch {
        k,
        n,
        min_value,
        max_value,
        base_buffer,
        levels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_bytes() {
        assert_eq!(updatable_storage_bytes(128, 0), 8);
        assert_eq!(compact_storage_bytes(128, 0), 8);
        // n <= k: ceiling power of two, at least 2 * MIN_K items
        assert_eq!(updatable_storage_bytes(128, 1), (4 + 4) * 8);
        assert_eq!(updatable_storage_bytes(128, 100), (4 + 128) * 8);
        // k < n < 2k: the whole base region
        assert_eq!(updatable_storage_bytes(128, 200), (4 + 256) * 8);
        assert_eq!(updatable_storage_bytes(128, 1000), (4 + 4 * 128) * 8);
        assert_eq!(compact_storage_bytes(128, 1000), (4 + 232 + 2 * 128) * 8);
    }

    #[test]
    fn test_deserialize_rejects_bad_family() {
        let bytes = [PREAMBLE_LONGS_EMPTY, SERIAL_VERSION, 7, FLAG_EMPTY, 128, 0, 0, 0];
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_rejects_bad_version() {
        let bytes = [
            PREAMBLE_LONGS_EMPTY,
            2,
            QUANTILES_FAMILY_ID,
            FLAG_EMPTY,
            128,
            0,
            0,
            0,
        ];
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_rejects_bad_k() {
        let bytes = [
            PREAMBLE_LONGS_EMPTY,
            SERIAL_VERSION,
            QUANTILES_FAMILY_ID,
            FLAG_EMPTY,
            100,
            0,
            0,
            0,
        ];
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_rejects_truncated_header() {
        let bytes = [
            PREAMBLE_LONGS_FULL,
            SERIAL_VERSION,
            QUANTILES_FAMILY_ID,
            0,
            128,
            0,
            0,
            0,
        ];
        assert!(deserialize(&bytes).is_err());
    }

    #[test]
    fn test_deserialize_big_endian_k() {
        let bytes = [
            PREAMBLE_LONGS_EMPTY,
            SERIAL_VERSION,
            QUANTILES_FAMILY_ID,
            FLAG_EMPTY | FLAG_BIG_ENDIAN,
            0,
            128,
            0,
            0,
        ];
        let decoded = deserialize(&bytes).unwrap();
        assert_eq!(decoded.k, 128);
        assert_eq!(decoded.n, 0);
    }
}
