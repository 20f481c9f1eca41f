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

use std::cmp::Ordering;

use super::helper::sum_sample_weights;
use super::sketch::SketchItem;
use super::MIN_K;
use crate::error::Error;

/// A borrowed, read-only projection of a sketch's internal arrays.
///
/// Views are how sketch states travel: the intermediate rows of a
/// distributed aggregation carry exactly these fields, and merging a view
/// into a sketch never copies the underlying buffers. Level `i` of the
/// sketch occupies `items[levels[i]..levels[i + 1]]`; an item at level `i`
/// represents `2^i` logical items. `min_value`/`max_value` are only
/// meaningful when `n > 0`.
#[derive(Debug, Clone, Copy)]
pub struct SketchView<'a, T: SketchItem> {
    pub k: u32,
    pub n: u64,
    pub min_value: T,
    pub max_value: T,
    pub items: &'a [T],
    pub levels: &'a [u32],
}

impl<'a, T: SketchItem> SketchView<'a, T> {
    /// Returns the number of levels described by the view.
    pub fn num_levels(&self) -> usize {
        self.levels.len().saturating_sub(1)
    }

    /// Returns the items of `level`.
    pub fn level_slice(&self, level: usize) -> &'a [T] {
        if level + 1 >= self.levels.len() {
            return &[];
        }
        &self.items[self.levels[level] as usize..self.levels[level + 1] as usize]
    }

    /// Checks the serialized-state invariants of the view.
    ///
    /// Used by the validating intermediate-input mode and by the spill
    /// codec: level offsets must start at zero, be non-decreasing and end at
    /// the item count; the encoded weights must sum to `n`; every level must
    /// be sorted ascending.
    pub fn validate(&self) -> Result<(), Error> {
        if self.levels.len() < 2 {
            return Err(Error::malformed("levels array must have at least 2 offsets")
                .with_context("levels", self.levels.len()));
        }
        if self.levels[0] != 0 {
            return Err(Error::malformed("levels array must start at 0")
                .with_context("first", self.levels[0]));
        }
        for window in self.levels.windows(2) {
            if window[1] < window[0] {
                return Err(Error::malformed("levels array must be non-decreasing"));
            }
        }
        let last = self.levels[self.levels.len() - 1] as usize;
        if last != self.items.len() {
            return Err(Error::malformed("levels array must end at the item count")
                .with_context("last", last)
                .with_context("items", self.items.len()));
        }
        if self.n == 0 {
            return Err(Error::malformed("serialized sketch must not be empty"));
        }
        if self.k < MIN_K {
            return Err(Error::malformed("k is below the minimum")
                .with_context("k", self.k)
                .with_context("min", MIN_K));
        }
        if sum_sample_weights(self.levels) != self.n {
            return Err(Error::malformed("level sizes do not add up to n")
                .with_context("n", self.n));
        }
        for level in 0..self.num_levels() {
            let items = self.level_slice(level);
            for pair in items.windows(2) {
                if T::total_cmp(&pair[0], &pair[1]) == Ordering::Greater {
                    return Err(Error::malformed("level items must be sorted ascending")
                        .with_context("level", level));
                }
            }
        }
        Ok(())
    }
}
