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

//! Approximate-percentile aggregation core for columnar query engines.
//!
//! The centerpiece is a weighted [KLL sketch](kll::KllSketch): a compact
//! streaming quantiles summary with randomized compaction and an exactly
//! mergeable intermediate representation. On top of it sits the
//! [`aggregate::ApproxPercentileAggregate`] operator, which implements the
//! three execution paths of a distributed aggregation (raw ingest, partial
//! merge, final extract) with per-group accumulators backed by a shared,
//! byte-accounted arena.
//!
//! # Usage
//!
//! ```rust
//! use approx_percentile::kll::{KllSketch, DEFAULT_K};
//! use approx_percentile::aggregate::MemoryContext;
//!
//! let mut sketch = KllSketch::<i64>::new(DEFAULT_K, 42, MemoryContext::Heap);
//! for i in 1..=1000 {
//!     sketch.insert(i);
//! }
//! sketch.finish();
//! let median = sketch.estimate_quantile(0.5);
//! assert!((450..=550).contains(&median));
//! ```

pub mod aggregate;
#[doc(hidden)]
pub mod codec;
pub mod common;
pub mod error;
pub mod kll;
pub mod vector;
