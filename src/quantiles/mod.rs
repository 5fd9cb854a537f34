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

//! Quantiles sketch over `f64` values.
//!
//! The sketch keeps a base buffer of up to `2k` raw values and a hierarchy
//! of levels, each holding `k` sorted values. Level `i` stands for
//! `2^i * 2k` original values. Whenever the base buffer fills, it is sorted,
//! randomly halved and carried into the levels the way a binary counter is
//! incremented, so only `O(k log(n / k))` values are retained. Min and max
//! are tracked exactly.
//!
//! Rank and quantile queries are not provided here; the sketch keeps the
//! structure they need and persists it in the DataSketches binary format
//! (family 8, serial version 3).
//!
//! # Usage
//!
//! ```rust
//! # use datasketches_quantiles::quantiles::DoublesSketch;
//! # use datasketches_quantiles::quantiles::UpdateDoublesSketch;
//! let mut sketch = UpdateDoublesSketch::new(128).unwrap();
//! for i in 0..10_000 {
//!     sketch.update(i as f64);
//! }
//! assert_eq!(sketch.n(), 10_000);
//! assert_eq!(sketch.min_value(), Some(0.0));
//! assert_eq!(sketch.max_value(), Some(9999.0));
//!
//! let compact = sketch.compact();
//! let bytes = compact.serialize(true);
//! assert_eq!(bytes.len(), compact.serialized_size_bytes());
//! ```

mod accessor;
mod compact;
mod compactor;
mod helper;
mod serialization;
mod sketch;

pub use self::compact::CompactDoublesSketch;
pub use self::sketch::DoublesSketch;
pub use self::sketch::DoublesSketchBuilder;
pub use self::sketch::UpdateDoublesSketch;

/// Default value of parameter k.
pub const DEFAULT_K: u16 = 128;
/// Minimum value of parameter k.
pub const MIN_K: u16 = 2;
/// Maximum value of parameter k.
pub const MAX_K: u16 = 32768;
