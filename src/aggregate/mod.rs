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

//! The approx_percentile aggregation operator.
//!
//! Three execution paths cover distributed execution: raw ingest builds
//! per-group sketches, partial extraction snapshots them into mergeable
//! intermediate rows, and intermediate ingest merges those rows back,
//! possibly on another worker, before the final extraction estimates the
//! requested quantiles.
//!
//! All groups of one operator share an [`Arena`] accounting handle that is
//! not thread safe; spill-facing paths deep-copy group state onto the heap
//! instead of touching it.

mod accumulator;
mod config;
mod operator;
mod signature;

pub use self::accumulator::KllSketchAccumulator;
pub use self::config::AggregateConfig;
pub use self::config::FIXED_SEED_CONFIG;
pub use self::operator::ApproxPercentileAggregate;
pub use self::operator::GroupId;
pub use self::operator::RawInput;
pub use self::operator::MAX_WEIGHT;
pub use self::signature::intermediate_type;
pub use self::signature::resolve_arguments;
pub use self::signature::signatures;
pub use self::signature::AggregateSignature;
pub use self::signature::INPUT_TYPES;
pub use crate::common::Arena;
pub use crate::common::MemoryContext;
