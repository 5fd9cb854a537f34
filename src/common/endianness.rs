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

//! Byte order selection for serialized sketches.

/// Byte order used to encode multi-byte fields of a serialized sketch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Endianness {
    /// Least significant byte first. This is the interchange default.
    #[default]
    Little,
    /// Most significant byte first.
    Big,
}

impl Endianness {
    /// Returns the byte order of the platform this code was compiled for.
    ///
    /// # Examples
    ///
    /// ```
    /// # use datasketches_quantiles::common::Endianness;
    /// let native = Endianness::native();
    /// assert_eq!(native.is_big(), cfg!(target_endian = "big"));
    /// ```
    pub const fn native() -> Self {
        if cfg!(target_endian = "big") {
            Endianness::Big
        } else {
            Endianness::Little
        }
    }

    /// Returns true for big-endian.
    pub const fn is_big(self) -> bool {
        matches!(self, Endianness::Big)
    }
}
