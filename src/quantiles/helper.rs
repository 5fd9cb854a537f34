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

use super::MAX_K;
use super::MIN_K;

/// Returns true if `k` is a power of two within [MIN_K, MAX_K].
pub fn is_valid_k(k: u32) -> bool {
    k.is_power_of_two() && (MIN_K as u32..=MAX_K as u32).contains(&k)
}

/// Returns the position of the lowest zero bit of `bits` at or above
/// `starting_bit`.
pub fn lowest_zero_bit_starting_at(bits: u64, starting_bit: u32) -> u32 {
    let pos = starting_bit & 0x3f;
    pos + (bits >> pos).trailing_ones()
}

/// Zero-based position of the highest set bit, or -1 when `x` is zero.
pub fn hi_bit_position(x: u64) -> i32 {
    63 - x.leading_zeros() as i32
}

pub fn compute_num_levels_needed(k: u16, n: u64) -> usize {
    (1 + hi_bit_position(compute_bit_pattern(k, n))) as usize
}

pub fn compute_base_buffer_items(k: u16, n: u64) -> usize {
    (n % (2 * k as u64)) as usize
}

pub fn compute_bit_pattern(k: u16, n: u64) -> u64 {
    n / (2 * k as u64)
}

pub fn compute_total_levels(bit_pattern: u64) -> usize {
    (hi_bit_position(bit_pattern) + 1) as usize
}

pub fn compute_valid_levels(bit_pattern: u64) -> usize {
    bit_pattern.count_ones() as usize
}

pub fn compute_retained_items(k: u16, n: u64) -> usize {
    let bb_count = compute_base_buffer_items(k, n);
    let valid_levels = compute_valid_levels(compute_bit_pattern(k, n));
    bb_count + valid_levels * k as usize
}

/// Items a mutable sketch must hold once `n` reaches `new_n` at a full base
/// buffer: the 2k base region plus k slots per level.
pub fn compute_required_item_capacity(k: u16, new_n: u64) -> usize {
    (2 + compute_num_levels_needed(k, new_n)) * k as usize
}

/// Item slots of a mutable sketch's storage, as laid out by the updatable
/// serialization format.
pub fn compute_updatable_item_capacity(k: u16, n: u64) -> usize {
    let min_base = 2 * MIN_K as usize;
    if n <= k as u64 {
        ceiling_power_of_2(n as usize).max(min_base)
    } else {
        compute_required_item_capacity(k, n)
    }
}

/// Smallest power of two not less than `x`, clamped to 2^30.
pub fn ceiling_power_of_2(x: usize) -> usize {
    const TOP_POWER_OF_2: usize = 1 << 30;
    if x <= 1 {
        1
    } else if x >= TOP_POWER_OF_2 {
        TOP_POWER_OF_2
    } else {
        x.next_power_of_two()
    }
}

/// Capacity of the base region after one growth step.
pub fn grown_base_capacity(k: u16, old_capacity: usize) -> usize {
    2 * (k as usize).min(old_capacity).max(MIN_K as usize)
}
