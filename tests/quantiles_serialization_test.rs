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

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use datasketches_quantiles::common::Endianness;
use datasketches_quantiles::common::XorShift64;
use datasketches_quantiles::error::ErrorKind;
use datasketches_quantiles::quantiles::CompactDoublesSketch;
use datasketches_quantiles::quantiles::DoublesSketch;
use datasketches_quantiles::quantiles::UpdateDoublesSketch;
use googletest::assert_that;
use googletest::prelude::contains_substring;

const FLAG_BIG_ENDIAN: u8 = 1;
const FLAG_READ_ONLY: u8 = 2;
const FLAG_EMPTY: u8 = 4;
const FLAG_COMPACT: u8 = 8;
const FLAG_ORDERED: u8 = 16;

fn seeded(k: u32) -> UpdateDoublesSketch {
    UpdateDoublesSketch::with_rng(k, XorShift64::seeded(17)).unwrap()
}

fn f64_at(bytes: &[u8], offset: usize) -> f64 {
    f64::from_le_bytes(bytes[offset..offset + 8].try_into().unwrap())
}

fn f64s_at(bytes: &[u8], offset: usize, count: usize) -> Vec<f64> {
    (0..count).map(|i| f64_at(bytes, offset + i * 8)).collect()
}

#[test]
fn test_empty_default_k() {
    let sketch = UpdateDoublesSketch::new(128).unwrap();
    let bytes = sketch.serialize(false);
    assert_eq!(bytes, vec![1, 3, 8, FLAG_EMPTY, 128, 0, 0, 0]);
    assert_eq!(STANDARD.encode(&bytes), "AQMIBIAAAAA=");
    assert_eq!(sketch.serialized_size_bytes(), 8);

    let restored = UpdateDoublesSketch::deserialize(&bytes).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.k(), 128);
}

#[test]
fn test_empty_compact() {
    let compact = UpdateDoublesSketch::new(64).unwrap().compact();
    let bytes = compact.serialize(false);
    assert_eq!(
        bytes,
        vec![1, 3, 8, FLAG_EMPTY | FLAG_COMPACT | FLAG_READ_ONLY, 64, 0, 0, 0]
    );
}

#[test]
fn test_empty_big_endian() {
    let sketch = UpdateDoublesSketch::new(128).unwrap();
    let bytes = sketch.serialize_with_endianness(false, Endianness::Big);
    assert_eq!(bytes, vec![1, 3, 8, FLAG_EMPTY | FLAG_BIG_ENDIAN, 0, 128, 0, 0]);
    let restored = CompactDoublesSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.k(), 128);
    assert!(restored.is_empty());
}

#[test]
fn test_updatable_layout_partial_base_buffer() {
    let mut sketch = seeded(2);
    for v in [3.0, 1.0, 2.0] {
        sketch.update(v);
    }
    let bytes = sketch.serialize(false);
    assert_eq!(bytes.len(), 64);
    assert_eq!(bytes.len(), sketch.serialized_size_bytes());
    assert_eq!(&bytes[..8], &[2, 3, 8, 0, 2, 0, 0, 0]);
    assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 3);
    assert_eq!(f64_at(&bytes, 16), 1.0);
    assert_eq!(f64_at(&bytes, 24), 3.0);
    assert_eq!(f64s_at(&bytes, 32, 3), vec![3.0, 1.0, 2.0]);

    let ordered = sketch.serialize(true);
    assert_eq!(ordered[3], FLAG_ORDERED);
    assert_eq!(f64s_at(&ordered, 32, 3), vec![1.0, 2.0, 3.0]);
    // the live base buffer keeps its arrival order
    assert_eq!(&sketch.combined_buffer()[..3], &[3.0, 1.0, 2.0]);
}

#[test]
fn test_updatable_layout_small_n() {
    let mut sketch = seeded(128);
    for v in 0..5 {
        sketch.update(v as f64);
    }
    let bytes = sketch.serialize(false);
    // ceiling power of two of n items after the 32-byte preamble
    assert_eq!(bytes.len(), (4 + 8) * 8);
    assert_eq!(f64s_at(&bytes, 32, 5), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
}

#[test]
fn test_updatable_layout_with_levels() {
    let mut sketch = seeded(4);
    for v in [8.0, 3.0, 6.0, 1.0, 7.0, 2.0, 5.0, 4.0, 9.0] {
        sketch.update(v);
    }
    assert_eq!(sketch.bit_pattern(), 1);
    let bytes = sketch.serialize(false);
    assert_eq!(bytes.len(), (4 + 3 * 4) * 8);
    assert_eq!(f64_at(&bytes, 32), 9.0);

    let level0 = f64s_at(&bytes, 32 + 2 * 4 * 8, 4);
    assert!(
        level0 == [1.0, 3.0, 5.0, 7.0] || level0 == [2.0, 4.0, 6.0, 8.0],
        "got {level0:?}"
    );
}

#[test]
fn test_compact_layout() {
    let mut sketch = seeded(4);
    for i in 0..44 {
        sketch.update(i as f64);
    }
    // bit pattern 0b101, 4 items in the base buffer
    let compact = sketch.compact();
    let bytes = compact.serialize(false);
    assert_eq!(bytes.len(), (4 + 4 + 2 * 4) * 8);
    assert_eq!(bytes[0], 2);
    assert_eq!(bytes[3], FLAG_COMPACT | FLAG_READ_ONLY);
    assert_eq!(f64s_at(&bytes, 32, 4), vec![40.0, 41.0, 42.0, 43.0]);
    assert_eq!(f64s_at(&bytes, 32, 12), compact.combined_buffer());

    // a mutable sketch writes every level slot up to the highest one
    assert_eq!(sketch.serialize(false).len(), (4 + (2 + 3) * 4) * 8);
}

#[test]
fn test_round_trip_updatable() {
    let mut sketch = seeded(32);
    for i in 0..10_000 {
        sketch.update((i as f64).sqrt());
    }
    let bytes = sketch.serialize(false);
    let restored = UpdateDoublesSketch::deserialize(&bytes).unwrap();
    assert_eq!(restored.k(), 32);
    assert_eq!(restored.n(), 10_000);
    assert_eq!(restored.min_value(), sketch.min_value());
    assert_eq!(restored.max_value(), sketch.max_value());
    assert_eq!(restored.bit_pattern(), sketch.bit_pattern());
    assert_eq!(restored.serialize(false), bytes);
    assert_eq!(restored.compact(), sketch.compact());
}

#[test]
fn test_round_trip_compact() {
    let mut sketch = seeded(16);
    for i in 0..777 {
        sketch.update(-(i as f64));
    }
    let compact = sketch.compact();
    let restored = CompactDoublesSketch::deserialize(&compact.serialize(false)).unwrap();
    assert_eq!(restored, compact);

    // compact bytes also rebuild a mutable sketch that keeps updating
    let mut revived = UpdateDoublesSketch::deserialize(&compact.serialize(false)).unwrap();
    assert_eq!(revived.compact(), compact);
    for i in 0..1000 {
        revived.update(i as f64);
    }
    assert_eq!(revived.n(), 1777);
    assert_eq!(revived.bit_pattern(), 1777 / 32);
}

#[test]
fn test_round_trip_big_endian() {
    let mut sketch = seeded(8);
    for i in 0..100 {
        sketch.update(i as f64 / 3.0);
    }
    let big = sketch.serialize_with_endianness(false, Endianness::Big);
    let little = sketch.serialize_with_endianness(false, Endianness::Little);
    assert_eq!(big.len(), little.len());
    assert_eq!(big[3] & FLAG_BIG_ENDIAN, FLAG_BIG_ENDIAN);
    assert_eq!(&big[4..6], &[0, 8]);

    let restored = UpdateDoublesSketch::deserialize(&big).unwrap();
    assert_eq!(restored.serialize(false), little);
}

#[test]
fn test_deserialize_truncated() {
    let mut sketch = seeded(8);
    for i in 0..100 {
        sketch.update(i as f64);
    }
    let bytes = sketch.serialize(false);
    let err = UpdateDoublesSketch::deserialize(&bytes[..bytes.len() - 8]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("expected"));

    let err = CompactDoublesSketch::deserialize(&bytes[..3]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
}

#[test]
fn test_deserialize_wrong_family() {
    let mut bytes = UpdateDoublesSketch::new(128).unwrap().serialize(false);
    bytes[2] = 15;
    let err = UpdateDoublesSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("invalid family"));
}

fn filled_bytes() -> Vec<u8> {
    let mut sketch = seeded(8);
    for i in 0..100 {
        sketch.update(i as f64);
    }
    sketch.serialize(false)
}

#[test]
fn test_deserialize_rejects_n_beyond_i64() {
    let mut bytes = filled_bytes();
    bytes[8..16].copy_from_slice(&u64::MAX.to_le_bytes());
    let err = UpdateDoublesSketch::deserialize(&bytes).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
    assert_that!(err.message(), contains_substring("signed 64-bit"));

    bytes[8..16].copy_from_slice(&(i64::MAX as u64 + 1).to_le_bytes());
    assert!(CompactDoublesSketch::deserialize(&bytes).is_err());
}

#[test]
fn test_largest_n_keeps_updating() {
    // k = 2, n = i64::MAX: 3 base items and levels 0..=60 occupied
    let n = i64::MAX as u64;
    let mut bytes = vec![0u8; (4 + (2 + 61) * 2) * 8];
    bytes[..8].copy_from_slice(&[2, 3, 8, 0, 2, 0, 0, 0]);
    bytes[8..16].copy_from_slice(&n.to_le_bytes());

    let mut sketch = UpdateDoublesSketch::deserialize(&bytes).unwrap();
    assert_eq!(sketch.n(), n);
    assert_eq!(sketch.base_buffer_count(), 3);
    sketch.update(1.0);
    assert_eq!(sketch.n(), n + 1);
    assert_eq!(sketch.base_buffer_count(), 0);
    assert_eq!(sketch.bit_pattern(), 1u64 << 61);
    assert_eq!(sketch.max_value(), Some(1.0));
}

#[test]
fn test_deserialize_rejects_nan_min_or_max() {
    for offset in [16, 24] {
        let mut bytes = filled_bytes();
        bytes[offset..offset + 8].copy_from_slice(&f64::NAN.to_le_bytes());
        let err = CompactDoublesSketch::deserialize(&bytes).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedDeserializeData);
        assert_that!(err.message(), contains_substring("min/max"));
        assert!(UpdateDoublesSketch::deserialize(&bytes).is_err());
    }
}

#[test]
fn test_deserialize_rejects_min_above_max() {
    let mut bytes = filled_bytes();
    bytes[16..24].copy_from_slice(&1000.0f64.to_le_bytes());
    let err = UpdateDoublesSketch::deserialize(&bytes).unwrap_err();
    assert_that!(err.message(), contains_substring("min/max"));

    // a single-valued sketch has min == max
    let mut sketch = seeded(8);
    sketch.update(5.0);
    let restored = CompactDoublesSketch::deserialize(&sketch.serialize(false)).unwrap();
    assert_eq!(restored.min_value(), restored.max_value());
}
