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

use std::mem::size_of;

use crate::common::MemoryContext;
use crate::kll::k_from_epsilon;
use crate::kll::KllSketch;
use crate::kll::SketchItem;
use crate::kll::SketchView;
use crate::kll::DEFAULT_K;

/// Weights below this are cheaper to apply as repeated inserts.
pub(crate) const MIN_COUNT_TO_BUFFER: i64 = 512;
/// Buffered `(value, count)` pairs are drained once this many accumulate.
pub(crate) const MAX_BUFFER_SIZE: usize = 4096;

/// Per-group state: one sketch plus a buffer of large-count values.
///
/// Large weights are not applied as repeated inserts; they are parked in the
/// buffer and drained as repeated-value sub-sketches through one multiway
/// merge, which preserves sketch semantics at a fraction of the insert cost.
///
/// The sketch storage is accounted against the operator's shared arena. The
/// arena is not thread safe, so [`KllSketchAccumulator::compact_for_spill`],
/// which may run concurrently with ingestion, works on a heap-backed deep
/// copy and never touches the shared context.
pub struct KllSketchAccumulator<T: SketchItem> {
    mem: MemoryContext,
    sketch: KllSketch<T>,
    large_count_values: Vec<(T, i64)>,
    tracked_buffer_bytes: usize,
}

impl<T: SketchItem> KllSketchAccumulator<T> {
    pub fn new(mem: MemoryContext, seed: u64) -> Self {
        Self {
            sketch: KllSketch::new(DEFAULT_K, seed, mem.clone()),
            mem,
            large_count_values: Vec::new(),
            tracked_buffer_bytes: 0,
        }
    }

    /// Applies the query accuracy by lowering or raising the sketch's k.
    /// Called on every ingest touch; only the first call (before any data)
    /// has an effect, the accuracy is constant for the query.
    pub fn set_accuracy(&mut self, accuracy: f64) {
        self.sketch.set_k(k_from_epsilon(accuracy));
    }

    pub fn append(&mut self, value: T) {
        self.sketch.insert(value);
    }

    /// Appends `value` with multiplicity `count`.
    pub fn append_weighted(&mut self, value: T, count: i64, seed: u64) {
        if count < MIN_COUNT_TO_BUFFER {
            for _ in 0..count {
                self.sketch.insert(value);
            }
        } else {
            self.large_count_values.push((value, count));
            self.track_buffer();
            if self.large_count_values.len() >= MAX_BUFFER_SIZE {
                self.merge_buffered(seed);
            }
        }
    }

    /// Merges one serialized partial state.
    pub fn append_view(&mut self, view: SketchView<'_, T>) {
        self.sketch.merge_views(&[view]);
    }

    /// Merges a batch of serialized partial states in one pass.
    pub fn append_views(&mut self, views: &[SketchView<'_, T>]) {
        self.sketch.merge_views(views);
    }

    pub fn sketch(&self) -> &KllSketch<T> {
        &self.sketch
    }

    /// Drains the buffer into the sketch and finishes it. Must run before
    /// any quantile query. Idempotent.
    pub fn flush(&mut self, seed: u64) {
        self.merge_buffered(seed);
        self.sketch.finish();
    }

    /// Produces a finished, compacted deep copy of the group state on the
    /// heap. The buffered large counts are merged into the copy; the live
    /// sketch and the shared arena stay untouched, which is what makes this
    /// safe to call from a spill running concurrently with ingestion.
    pub fn compact_for_spill(&self, seed: u64) -> KllSketch<T> {
        let mut copy = KllSketch::from_view(self.sketch.to_view(), MemoryContext::Heap, seed);
        copy.finish();
        merge_counts_into(
            &mut copy,
            &self.large_count_values,
            self.sketch.k(),
            seed,
            MemoryContext::Heap,
        );
        copy.compact();
        copy
    }

    /// Returns the bytes held by this group's state.
    pub fn memory_usage(&self) -> usize {
        self.sketch.memory_usage()
            + self.large_count_values.capacity() * size_of::<(T, i64)>()
    }

    fn merge_buffered(&mut self, seed: u64) {
        if self.large_count_values.is_empty() {
            return;
        }
        let counts = std::mem::take(&mut self.large_count_values);
        let k = self.sketch.k();
        merge_counts_into(&mut self.sketch, &counts, k, seed, self.mem.clone());
        self.track_buffer();
    }

    fn track_buffer(&mut self) {
        let bytes = self.large_count_values.capacity() * size_of::<(T, i64)>();
        self.mem.adjust(self.tracked_buffer_bytes, bytes);
        self.tracked_buffer_bytes = bytes;
    }
}

impl<T: SketchItem> Drop for KllSketchAccumulator<T> {
    fn drop(&mut self) {
        self.mem.adjust(self.tracked_buffer_bytes, 0);
        self.tracked_buffer_bytes = 0;
    }
}

/// Builds one repeated-value sub-sketch per buffered pair and merges them
/// all at once. The sub-sketches are short-lived; they use the same memory
/// context as the target so spill copies never touch the shared arena.
fn merge_counts_into<T: SketchItem>(
    sketch: &mut KllSketch<T>,
    counts: &[(T, i64)],
    k: u32,
    seed: u64,
    mem: MemoryContext,
) {
    if counts.is_empty() {
        return;
    }
    let sub_sketches: Vec<KllSketch<T>> = counts
        .iter()
        .map(|&(value, count)| {
            KllSketch::from_repeated_value(value, count as u64, k, seed, mem.clone())
        })
        .collect();
    let views: Vec<SketchView<'_, T>> = sub_sketches.iter().map(|s| s.to_view()).collect();
    sketch.merge_views(&views);
}
