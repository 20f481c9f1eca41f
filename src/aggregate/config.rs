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

use std::collections::HashMap;

use crate::error::Error;

/// Property forcing deterministic sketch seeding, for debugging.
pub const FIXED_SEED_CONFIG: &str = "debug.agg.approxPercentile.fixedSeed";

/// Configuration the aggregate consumes from the query session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregateConfig {
    /// When set, every sketch of the operator uses exactly this seed,
    /// including spill copies and repeated-value sub-sketches, making
    /// compaction deterministic across runs.
    pub fixed_seed: Option<u32>,
}

impl AggregateConfig {
    /// Reads the config keys from session properties.
    pub fn from_properties(properties: &HashMap<String, String>) -> Result<Self, Error> {
        let fixed_seed = match properties.get(FIXED_SEED_CONFIG) {
            None => None,
            Some(raw) => Some(raw.parse::<u32>().map_err(|source| {
                Error::config_invalid("fixed seed must be a 32-bit unsigned integer")
                    .with_context("property", FIXED_SEED_CONFIG)
                    .with_context("value", raw)
                    .set_source(source)
            })?),
        };
        Ok(Self { fixed_seed })
    }
}
