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

use std::io;
use std::io::Cursor;

use byteorder::BigEndian;
use byteorder::ByteOrder;
use byteorder::LittleEndian;
use byteorder::ReadBytesExt;

use crate::common::Endianness;

/// A fixed-length output buffer written at absolute offsets.
///
/// The length is decided once at construction; writing past it is a logic
/// error upstream and panics.
pub(crate) struct SketchBytes {
    bytes: Vec<u8>,
    endianness: Endianness,
}

impl SketchBytes {
    pub fn zeroed(len: usize, endianness: Endianness) -> Self {
        Self {
            bytes: vec![0u8; len],
            endianness,
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn put_u8(&mut self, offset: usize, n: u8) {
        self.bytes[offset] = n;
    }

    pub fn put_u16(&mut self, offset: usize, n: u16) {
        let dst = &mut self.bytes[offset..offset + 2];
        match self.endianness {
            Endianness::Little => LittleEndian::write_u16(dst, n),
            Endianness::Big => BigEndian::write_u16(dst, n),
        }
    }

    pub fn put_u64(&mut self, offset: usize, n: u64) {
        let dst = &mut self.bytes[offset..offset + 8];
        match self.endianness {
            Endianness::Little => LittleEndian::write_u64(dst, n),
            Endianness::Big => BigEndian::write_u64(dst, n),
        }
    }

    pub fn put_f64(&mut self, offset: usize, n: f64) {
        let dst = &mut self.bytes[offset..offset + 8];
        match self.endianness {
            Endianness::Little => LittleEndian::write_f64(dst, n),
            Endianness::Big => BigEndian::write_f64(dst, n),
        }
    }

    /// Writes `src` contiguously starting at `offset`, returning the offset
    /// just past the last value.
    pub fn put_f64_slice(&mut self, offset: usize, src: &[f64]) -> usize {
        let end = offset + src.len() * 8;
        let dst = &mut self.bytes[offset..end];
        match self.endianness {
            Endianness::Little => LittleEndian::write_f64_into(src, dst),
            Endianness::Big => BigEndian::write_f64_into(src, dst),
        }
        end
    }
}

/// A cursor over serialized sketch bytes.
///
/// Starts out little-endian; call [`SketchSlice::set_endianness`] once the
/// byte order flag has been read.
pub(crate) struct SketchSlice<'a> {
    slice: Cursor<&'a [u8]>,
    endianness: Endianness,
}

impl<'a> SketchSlice<'a> {
    pub fn new(slice: &'a [u8]) -> Self {
        SketchSlice {
            slice: Cursor::new(slice),
            endianness: Endianness::Little,
        }
    }

    pub fn set_endianness(&mut self, endianness: Endianness) {
        self.endianness = endianness;
    }

    #[cfg(test)]
    pub fn remaining(&self) -> usize {
        let len = self.slice.get_ref().len() as u64;
        len.saturating_sub(self.slice.position()) as usize
    }

    pub fn seek(&mut self, offset: usize) {
        self.slice.set_position(offset as u64);
    }

    pub fn read_u8(&mut self) -> io::Result<u8> {
        self.slice.read_u8()
    }

    pub fn read_u16(&mut self) -> io::Result<u16> {
        match self.endianness {
            Endianness::Little => self.slice.read_u16::<LittleEndian>(),
            Endianness::Big => self.slice.read_u16::<BigEndian>(),
        }
    }

    pub fn read_u64(&mut self) -> io::Result<u64> {
        match self.endianness {
            Endianness::Little => self.slice.read_u64::<LittleEndian>(),
            Endianness::Big => self.slice.read_u64::<BigEndian>(),
        }
    }

    pub fn read_f64(&mut self) -> io::Result<f64> {
        match self.endianness {
            Endianness::Little => self.slice.read_f64::<LittleEndian>(),
            Endianness::Big => self.slice.read_f64::<BigEndian>(),
        }
    }

    pub fn read_f64_into(&mut self, dst: &mut [f64]) -> io::Result<()> {
        match self.endianness {
            Endianness::Little => self.slice.read_f64_into::<LittleEndian>(dst),
            Endianness::Big => self.slice.read_f64_into::<BigEndian>(dst),
        }
    }
}
