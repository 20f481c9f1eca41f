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

//! Spill byte format constants for KLL sketches.
//!
//! Layout: a fixed 8-byte header (format version, item width, flags, one
//! reserved byte, `k` as little-endian u32), followed for non-empty sketches
//! by `n`, the min and max items, the level offset array prefixed with its
//! length, and the retained items level by level. All integers are
//! little-endian; levels are serialized exactly as exposed by
//! [`SketchView`](super::SketchView), so `levels[0] == 0` and the last
//! offset equals the item count.

/// Version of the spill byte format.
pub const SPILL_FORMAT_VERSION: u8 = 1;

/// Flag indicating the sketch is empty (header-only serialization).
pub const FLAG_EMPTY: u8 = 1 << 0;
