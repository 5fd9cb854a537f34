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

//! Carry propagation over the level hierarchy.
//!
//! The occupancy bit pattern behaves like a binary counter: level `i` is
//! occupied when it holds `k` sorted items summarizing `2^i * 2k` inputs.
//! Folding a full base buffer into the levels is a "+1" on that counter, and
//! each carry merges two k-sized levels and decimates the result back to `k`.

use std::cell::Cell;

use tracing::trace;

use super::accessor::BufferLevel;
use super::accessor::DoublesSketchAccessor;
use super::helper::lowest_zero_bit_starting_at;
use crate::common::RandomSource;

type CellAccessor<'a> = DoublesSketchAccessor<'a, [Cell<f64>]>;

/// What lands in the ending level before the carry ripples.
#[derive(Debug, Clone, Copy)]
pub(crate) enum CarrySource<'s> {
    /// The sketch's own full, sorted base buffer, zipped down to k items.
    BaseBuffer,
    /// A sorted k-sized level taken from another sketch while merging.
    #[allow(dead_code)]
    SizeK(&'s [f64]),
}

/// Propagates a carry starting at `starting_level` and returns the new bit
/// pattern.
///
/// `size_2k_buf` must be a forced-size view of the base buffer; it is used as
/// scratch space for every merge. `tgt_sketch_buf` must be forced-size too,
/// since the ending level is not yet marked occupied.
pub(crate) fn in_place_propagate_carry<R: RandomSource>(
    starting_level: u32,
    source: CarrySource<'_>,
    size_2k_buf: &CellAccessor<'_>,
    tgt_sketch_buf: &mut CellAccessor<'_>,
    bit_pattern: u64,
    rng: &mut R,
) -> u64 {
    let ending_level = lowest_zero_bit_starting_at(bit_pattern, starting_level);
    tgt_sketch_buf.set_level(BufferLevel::Level(ending_level));

    match source {
        CarrySource::BaseBuffer => zip_size_2k_buffer(size_2k_buf, tgt_sketch_buf, rng),
        CarrySource::SizeK(src) => {
            assert_eq!(
                src.len(),
                tgt_sketch_buf.num_items(),
                "merge source must hold exactly k items"
            );
            tgt_sketch_buf.put_array(src, 0);
        }
    }

    for lvl in starting_level..ending_level {
        assert!(
            bit_pattern & (1u64 << lvl) != 0,
            "level {lvl} below the ending level {ending_level} must be occupied"
        );
        let curr_level_buf = tgt_sketch_buf.copy_and_set_level(BufferLevel::Level(lvl));
        merge_two_size_k_buffers(&curr_level_buf, tgt_sketch_buf, size_2k_buf);
        zip_size_2k_buffer(size_2k_buf, tgt_sketch_buf, rng);
    }

    trace!(
        starting_level,
        ending_level,
        bit_pattern,
        "propagated carry through levels"
    );

    bit_pattern + (1u64 << starting_level)
}

/// Keeps every other item of `buf_in`, starting at a random parity, writing
/// `buf_out.num_items()` items.
pub(crate) fn zip_size_2k_buffer<R: RandomSource>(
    buf_in: &CellAccessor<'_>,
    buf_out: &CellAccessor<'_>,
    rng: &mut R,
) {
    let random_offset = rng.next_bool() as usize;
    let lim_out = buf_out.num_items();
    assert_eq!(
        buf_in.num_items(),
        2 * lim_out,
        "zip input must be twice the output size"
    );
    for idx_out in 0..lim_out {
        buf_out.set(idx_out, buf_in.get(random_offset + 2 * idx_out));
    }
}

/// Merges two sorted k-sized windows into the 2k-sized `dst`.
///
/// On ties the item from `src2`, the destination window, goes first.
pub(crate) fn merge_two_size_k_buffers(
    src1: &CellAccessor<'_>,
    src2: &CellAccessor<'_>,
    dst: &CellAccessor<'_>,
) {
    assert_eq!(
        src1.num_items(),
        src2.num_items(),
        "merged levels must be the same size"
    );
    let k = src1.num_items();
    let mut i1 = 0;
    let mut i2 = 0;
    let mut i_dst = 0;
    while i1 < k && i2 < k {
        let (v1, v2) = (src1.get(i1), src2.get(i2));
        if v1 < v2 {
            dst.set(i_dst, v1);
            i1 += 1;
        } else {
            dst.set(i_dst, v2);
            i2 += 1;
        }
        i_dst += 1;
    }

    if i1 < k {
        dst.put_array(&src1.get_array(i1, k - i1), i_dst);
    } else {
        dst.put_array(&src2.get_array(i2, k - i2), i_dst);
    }
}
