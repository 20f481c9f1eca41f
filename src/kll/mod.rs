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

//! Weight-aware KLL sketch for estimating quantiles.
//!
//! KLL is a compact, streaming quantiles sketch with randomized compaction
//! and near-optimal accuracy per retained item. Samples live in levels; an
//! item at level `i` stands for `2^i` logical items, which makes the sketch
//! cheap to merge and lets [`KllSketch::from_repeated_value`] encode a large
//! repetition count through the binary representation of the count.
//!
//! The level storage is exposed through [`SketchView`] as a flat item buffer
//! plus level offsets, which is also the intermediate representation shuffled
//! between partial and final aggregation stages.
//!
//! # Usage
//!
//! ```rust
//! use approx_percentile::aggregate::MemoryContext;
//! use approx_percentile::kll::{KllSketch, DEFAULT_K};
//!
//! let mut sketch = KllSketch::<f64>::new(DEFAULT_K, 42, MemoryContext::Heap);
//! sketch.insert(1.0);
//! sketch.insert(2.0);
//! sketch.finish();
//! let q = sketch.estimate_quantile(0.5);
//! assert!((1.0..=2.0).contains(&q));
//! ```

mod helper;
mod serialization;
mod sketch;
mod view;

pub use self::helper::epsilon_from_k;
pub use self::helper::k_from_epsilon;
pub use self::sketch::KllSketch;
pub use self::sketch::SketchItem;
pub use self::view::SketchView;

/// Default value of the compaction parameter k.
pub const DEFAULT_K: u32 = 200;
/// Minimum value of the compaction parameter k.
pub const MIN_K: u32 = 8;
/// Maximum value of the compaction parameter k.
pub const MAX_K: u32 = u16::MAX as u32;
/// Minimum capacity of any level.
pub const MIN_LEVEL_CAPACITY: u32 = 8;
/// Largest repetition count a sketch can represent in one construction.
pub const MAX_REPEATED_COUNT: u64 = (1 << 60) - 1;
