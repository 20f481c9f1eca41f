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
use std::fmt;
use std::mem::size_of;

use super::helper::level_capacity;
use super::helper::sum_sample_weights;
use super::serialization::FLAG_EMPTY;
use super::serialization::SPILL_FORMAT_VERSION;
use super::view::SketchView;
use super::MAX_K;
use super::MAX_REPEATED_COUNT;
use super::MIN_K;
use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::common::MemoryContext;
use crate::common::RandomSource;
use crate::common::XorShift64;
use crate::error::Error;

/// Trait implemented by the numeric element types a [`KllSketch`] orders.
pub trait SketchItem: Copy + Default + fmt::Debug + 'static {
    /// Total order used by the sketch. For floating-point types NaN compares
    /// greater than every non-NaN value and equal to itself, so an ingested
    /// NaN deterministically becomes the maximum.
    fn total_cmp(a: &Self, b: &Self) -> Ordering;

    /// Returns true if the value is NaN.
    fn is_nan(&self) -> bool {
        false
    }

    /// Serialized size in bytes in the spill codec.
    const SERIALIZED_SIZE: usize;

    /// Serialize a single item into the buffer.
    fn serialize(value: &Self, bytes: &mut SketchBytes);

    /// Deserialize a single item from the input.
    fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error>;
}

/// Weight-aware KLL sketch for estimating quantiles.
///
/// See the [kll module level documentation](crate::kll) for more.
///
/// Items are stored in a flat buffer carved into levels; `levels[i]` is the
/// offset of level `i`, relative to a slack region at the front of the
/// buffer into which level 0 grows. An item at level `i` represents `2^i`
/// logical items, so compaction halves a level by promoting every other
/// element, chosen with a pseudorandom parity, one level up.
///
/// A sketch must be [finished](KllSketch::finish) before quantile queries;
/// inserting again un-finishes it. Storage growth and release is reported to
/// the [`MemoryContext`] the sketch was created with.
pub struct KllSketch<T: SketchItem> {
    k: u32,
    n: u64,
    extremes: Option<(T, T)>,
    // Physical buffer: [0, base) is slack, logical items start at `base`.
    items: Vec<T>,
    // Offsets relative to `base`; levels[0] == 0, last == logical item count.
    levels: Vec<u32>,
    finished: bool,
    rng: XorShift64,
    mem: MemoryContext,
    tracked_bytes: usize,
    base: usize,
}

impl<T: SketchItem> KllSketch<T> {
    /// Creates an empty sketch with the given compaction parameter and seed.
    ///
    /// # Panics
    ///
    /// Panics if k is not in [MIN_K, MAX_K].
    ///
    /// # Examples
    ///
    /// ```
    /// # use approx_percentile::aggregate::MemoryContext;
    /// # use approx_percentile::kll::KllSketch;
    /// let sketch = KllSketch::<f64>::new(200, 42, MemoryContext::Heap);
    /// assert_eq!(sketch.k(), 200);
    /// assert!(sketch.is_empty());
    /// ```
    pub fn new(k: u32, seed: u64, mem: MemoryContext) -> Self {
        assert!(
            (MIN_K..=MAX_K).contains(&k),
            "k must be in [{MIN_K}, {MAX_K}], got {k}"
        );
        Self {
            k,
            n: 0,
            extremes: None,
            items: Vec::new(),
            levels: vec![0, 0],
            finished: false,
            rng: XorShift64::seeded(seed),
            mem,
            tracked_bytes: 0,
            base: 0,
        }
    }

    /// Constructs a sketch representing `count` copies of `value` without
    /// inserting `count` times: bit `i` of `count` contributes one copy of
    /// `value` at level `i`. The result is finished and mergeable.
    ///
    /// # Panics
    ///
    /// Panics if `count` is zero or exceeds [`MAX_REPEATED_COUNT`].
    pub fn from_repeated_value(
        value: T,
        count: u64,
        k: u32,
        seed: u64,
        mem: MemoryContext,
    ) -> Self {
        assert!(
            count >= 1 && count <= MAX_REPEATED_COUNT,
            "count must be in [1, {MAX_REPEATED_COUNT}], got {count}"
        );
        let num_levels = (64 - count.leading_zeros()) as usize;
        let mut items = Vec::with_capacity(count.count_ones() as usize);
        let mut levels = Vec::with_capacity(num_levels + 1);
        levels.push(0);
        for level in 0..num_levels {
            if count & (1u64 << level) != 0 {
                items.push(value);
            }
            levels.push(items.len() as u32);
        }
        let mut sketch = Self {
            k: k.clamp(MIN_K, MAX_K),
            n: count,
            extremes: Some((value, value)),
            items,
            levels,
            finished: true,
            rng: XorShift64::seeded(seed),
            mem,
            tracked_bytes: 0,
            base: 0,
        };
        sketch.track_memory();
        sketch
    }

    /// Copies a view into a fresh owned sketch.
    ///
    /// The copy is not finished: views taken from a live sketch may carry an
    /// unsorted level 0, and [`KllSketch::finish`] restores the query
    /// invariant either way.
    pub fn from_view(view: SketchView<'_, T>, mem: MemoryContext, seed: u64) -> Self {
        let mut sketch = Self {
            k: view.k.clamp(MIN_K, MAX_K),
            n: view.n,
            extremes: (view.n > 0).then_some((view.min_value, view.max_value)),
            items: view.items.to_vec(),
            levels: view.levels.to_vec(),
            finished: false,
            rng: XorShift64::seeded(seed),
            mem,
            tracked_bytes: 0,
            base: 0,
        };
        sketch.track_memory();
        sketch
    }

    /// Returns the compaction parameter.
    pub fn k(&self) -> u32 {
        self.k
    }

    /// Sets the compaction parameter, used when the query supplies an
    /// accuracy. Only allowed before any data arrives; once the sketch holds
    /// data the parameter is fixed.
    pub fn set_k(&mut self, k: u32) {
        assert!(
            (MIN_K..=MAX_K).contains(&k),
            "k must be in [{MIN_K}, {MAX_K}], got {k}"
        );
        if self.n == 0 {
            self.k = k;
        } else {
            debug_assert_eq!(self.k, k, "k cannot change once the sketch holds data");
        }
    }

    /// Returns the total logical count of inserted items.
    pub fn total_count(&self) -> u64 {
        self.n
    }

    /// Returns true if the sketch has not seen any data.
    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    /// Returns true if level 0 is sorted and the sketch admits queries.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Returns the number of retained samples.
    pub fn num_retained(&self) -> usize {
        self.items.len() - self.base
    }

    /// Returns the minimum inserted value, if any.
    pub fn min_value(&self) -> Option<T> {
        self.extremes.map(|(min, _)| min)
    }

    /// Returns the maximum inserted value, if any.
    pub fn max_value(&self) -> Option<T> {
        self.extremes.map(|(_, max)| max)
    }

    /// Returns the bytes held by the level storage.
    pub fn memory_usage(&self) -> usize {
        self.items.capacity() * size_of::<T>() + self.levels.capacity() * size_of::<u32>()
    }

    /// Inserts one value.
    pub fn insert(&mut self, value: T) {
        self.update_min_max(value);
        self.n += 1;
        self.finished = false;
        if self.base == 0 {
            self.grow_front();
        }
        self.base -= 1;
        self.items[self.base] = value;
        for offset in self.levels.iter_mut().skip(1) {
            *offset += 1;
        }
        self.compress_if_needed();
        self.track_memory();
    }

    /// Sorts level 0 so the sketch admits queries. Idempotent.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        let hi = self.base + self.levels[1] as usize;
        self.items[self.base..hi].sort_by(T::total_cmp);
        self.finished = true;
    }

    /// Merges another finished sketch into this one.
    ///
    /// The result is as if every item of `other` had been inserted here:
    /// `n`, `min` and `max` combine, and `k` is lowered to the smaller of
    /// the two so accuracy never silently improves past what either side
    /// promised.
    ///
    /// # Panics
    ///
    /// Panics if `other` is not finished.
    pub fn merge(&mut self, other: &KllSketch<T>) {
        assert!(other.finished, "merge requires a finished sketch");
        self.merge_views(&[other.to_view()]);
    }

    /// Merges a batch of views in one multiway pass.
    ///
    /// Same semantics as repeated pairwise [`KllSketch::merge`]; level
    /// contents are combined by sorted merge before a single compaction
    /// pass, so the result does not depend on the order of `views`. Views
    /// must carry sorted levels (serialized states always do). Empty views
    /// are skipped. The receiver is finished afterwards.
    pub fn merge_views(&mut self, views: &[SketchView<'_, T>]) {
        self.finish();
        let mut num_levels = self.num_levels();
        let mut added = 0u64;
        for view in views {
            if view.n == 0 {
                continue;
            }
            num_levels = num_levels.max(view.num_levels());
            added += view.n;
        }
        if added == 0 {
            return;
        }

        let mut merged_items: Vec<T> = Vec::new();
        let mut merged_levels: Vec<u32> = Vec::with_capacity(num_levels + 1);
        merged_levels.push(0);
        for level in 0..num_levels {
            let mut merged: Vec<T> = self.level_slice(level).to_vec();
            for view in views {
                if view.n == 0 {
                    continue;
                }
                let run = view.level_slice(level);
                if run.is_empty() {
                    continue;
                }
                merged = if merged.is_empty() {
                    run.to_vec()
                } else {
                    merge_sorted(&merged, run)
                };
            }
            merged_items.extend_from_slice(&merged);
            merged_levels.push(merged_items.len() as u32);
        }

        self.items = merged_items;
        self.levels = merged_levels;
        self.base = 0;
        self.n += added;
        for view in views {
            if view.n == 0 {
                continue;
            }
            self.k = self.k.min(view.k.clamp(MIN_K, MAX_K));
            self.update_min_max(view.min_value);
            self.update_min_max(view.max_value);
        }
        self.compress_if_needed();
        self.track_memory();
        debug_assert_eq!(
            sum_sample_weights(&self.levels),
            self.n,
            "level weights do not add up to n"
        );
    }

    /// Returns the smallest value whose weighted rank reaches
    /// `ceil(fraction * n)`. `0.0` maps to the minimum and `1.0` to the
    /// maximum.
    ///
    /// # Panics
    ///
    /// Panics if the sketch is unfinished or empty, or if `fraction` is
    /// outside `[0, 1]`.
    pub fn estimate_quantile(&self, fraction: f64) -> T {
        let mut out = [T::default()];
        self.estimate_quantiles(&[fraction], &mut out);
        out[0]
    }

    /// Computes [`KllSketch::estimate_quantile`] for every fraction with a
    /// single sort and scan. Results follow the input order; the fractions
    /// need not be sorted.
    ///
    /// # Panics
    ///
    /// See [`KllSketch::estimate_quantile`]; additionally panics if `out`
    /// is shorter than `fractions`.
    pub fn estimate_quantiles(&self, fractions: &[f64], out: &mut [T]) {
        assert!(self.finished, "sketch must be finished before queries");
        assert!(self.n > 0, "quantile of an empty sketch is undefined");
        assert!(
            out.len() >= fractions.len(),
            "output buffer too small: {} < {}",
            out.len(),
            fractions.len()
        );
        let (Some(min_value), Some(max_value)) = (self.min_value(), self.max_value()) else {
            unreachable!("non-empty sketch without extremes");
        };

        let mut entries: Vec<(T, u64)> = Vec::with_capacity(self.num_retained());
        for level in 0..self.num_levels() {
            let weight = 1u64 << level;
            for &item in self.level_slice(level) {
                entries.push((item, weight));
            }
        }
        entries.sort_by(|a, b| T::total_cmp(&a.0, &b.0));
        let mut total = 0u64;
        for entry in &mut entries {
            total += entry.1;
            entry.1 = total;
        }
        debug_assert_eq!(total, self.n, "cumulative weight does not match n");

        for (fraction, slot) in fractions.iter().zip(out.iter_mut()) {
            assert!(
                (0.0..=1.0).contains(fraction),
                "quantile fraction must be in [0, 1], got {fraction}"
            );
            if *fraction == 0.0 {
                *slot = min_value;
                continue;
            }
            if *fraction == 1.0 {
                *slot = max_value;
                continue;
            }
            let target = (fraction * self.n as f64).ceil() as u64;
            let idx = entries.partition_point(|entry| entry.1 < target);
            *slot = if idx < entries.len() {
                entries[idx].0
            } else {
                max_value
            };
        }
    }

    /// Returns a zero-copy read-only snapshot of the sketch state.
    ///
    /// `min_value`/`max_value` are defaults when the sketch is empty.
    pub fn to_view(&self) -> SketchView<'_, T> {
        let (min_value, max_value) = self.extremes.unwrap_or_default();
        SketchView {
            k: self.k,
            n: self.n,
            min_value,
            max_value,
            items: &self.items[self.base..],
            levels: &self.levels,
        }
    }

    /// Shrinks the internal buffers to exactly fit the level structure;
    /// called before serialization.
    pub fn compact(&mut self) {
        self.items.drain(..self.base);
        self.base = 0;
        while self.num_levels() > 1 {
            let len = self.levels.len();
            if self.levels[len - 1] == self.levels[len - 2] {
                self.levels.pop();
            } else {
                break;
            }
        }
        self.items.shrink_to_fit();
        self.levels.shrink_to_fit();
        self.track_memory();
    }

    /// Serializes the sketch for spilling.
    ///
    /// # Panics
    ///
    /// Panics if a non-empty sketch is not finished: spill snapshots are
    /// finished and compacted first, which is what keeps every serialized
    /// level sorted.
    pub fn serialize(&self) -> Vec<u8> {
        let is_empty = self.is_empty();
        assert!(
            is_empty || self.finished,
            "only finished sketches can be serialized"
        );
        let size = 8
            + if is_empty {
                0
            } else {
                8 + 4
                    + (self.levels.len()) * size_of::<u32>()
                    + (2 + self.num_retained()) * T::SERIALIZED_SIZE
            };
        let mut bytes = SketchBytes::with_capacity(size);
        bytes.write_u8(SPILL_FORMAT_VERSION);
        bytes.write_u8(T::SERIALIZED_SIZE as u8);
        bytes.write_u8(if is_empty { FLAG_EMPTY } else { 0 });
        bytes.write_u8(0);
        bytes.write_u32_le(self.k);
        if is_empty {
            return bytes.into_bytes();
        }

        let (Some(min_value), Some(max_value)) = (self.min_value(), self.max_value()) else {
            unreachable!("non-empty sketch without extremes");
        };
        bytes.write_u64_le(self.n);
        T::serialize(&min_value, &mut bytes);
        T::serialize(&max_value, &mut bytes);
        bytes.write_u32_le(self.levels.len() as u32);
        for offset in &self.levels {
            bytes.write_u32_le(*offset);
        }
        for item in &self.items[self.base..] {
            T::serialize(item, &mut bytes);
        }
        bytes.into_bytes()
    }

    /// Deserializes a spilled sketch.
    pub fn deserialize(bytes: &[u8], mem: MemoryContext, seed: u64) -> Result<Self, Error> {
        fn make_error(tag: &'static str) -> impl FnOnce(std::io::Error) -> Error {
            move |_| Error::insufficient_data(tag)
        }

        let mut cursor = SketchSlice::new(bytes);
        let version = cursor.read_u8().map_err(make_error("version"))?;
        if version != SPILL_FORMAT_VERSION {
            return Err(Error::malformed("unsupported spill format version")
                .with_context("version", version));
        }
        let item_size = cursor.read_u8().map_err(make_error("item_size"))?;
        if item_size as usize != T::SERIALIZED_SIZE {
            return Err(Error::malformed("item width does not match the sketch type")
                .with_context("expected", T::SERIALIZED_SIZE)
                .with_context("got", item_size));
        }
        let flags = cursor.read_u8().map_err(make_error("flags"))?;
        let _unused = cursor.read_u8().map_err(make_error("unused"))?;
        let k = cursor.read_u32_le().map_err(make_error("k"))?;
        if !(MIN_K..=MAX_K).contains(&k) {
            return Err(Error::malformed("k out of range").with_context("k", k));
        }
        if flags & FLAG_EMPTY != 0 {
            return Ok(Self::new(k, seed, mem));
        }

        let n = cursor.read_u64_le().map_err(make_error("n"))?;
        let min_value = T::deserialize(&mut cursor)?;
        let max_value = T::deserialize(&mut cursor)?;
        let num_offsets = cursor.read_u32_le().map_err(make_error("num_levels"))? as usize;
        if !(2..=65).contains(&num_offsets) {
            return Err(Error::malformed("level count out of range")
                .with_context("offsets", num_offsets));
        }
        let mut levels = Vec::with_capacity(num_offsets);
        for _ in 0..num_offsets {
            levels.push(cursor.read_u32_le().map_err(make_error("levels"))?);
        }
        let num_items = levels[num_offsets - 1] as usize;
        let mut items = Vec::with_capacity(num_items);
        for _ in 0..num_items {
            items.push(T::deserialize(&mut cursor)?);
        }

        let view = SketchView {
            k,
            n,
            min_value,
            max_value,
            items: &items,
            levels: &levels,
        };
        view.validate()?;
        let mut sketch = Self::from_view(view, mem, seed);
        sketch.finished = true;
        Ok(sketch)
    }

    fn num_levels(&self) -> usize {
        self.levels.len() - 1
    }

    fn level_slice(&self, level: usize) -> &[T] {
        if level + 1 >= self.levels.len() {
            return &[];
        }
        let lo = self.base + self.levels[level] as usize;
        let hi = self.base + self.levels[level + 1] as usize;
        &self.items[lo..hi]
    }

    fn update_min_max(&mut self, value: T) {
        match &mut self.extremes {
            None => self.extremes = Some((value, value)),
            Some((min, max)) => {
                if T::total_cmp(&value, min) == Ordering::Less {
                    *min = value;
                }
                if T::total_cmp(max, &value) == Ordering::Less {
                    *max = value;
                }
            }
        }
    }

    // Opens slack in front of level 0 so inserts are amortized O(1).
    fn grow_front(&mut self) {
        let slack = level_capacity(self.k, self.num_levels(), 0) as usize + 1;
        let mut grown = Vec::with_capacity(slack + self.items.len());
        grown.resize(slack, T::default());
        grown.extend_from_slice(&self.items);
        self.items = grown;
        self.base = slack;
    }

    fn compress_if_needed(&mut self) {
        while let Some(level) = self.find_level_to_compact() {
            self.compact_level(level);
        }
        debug_assert_eq!(
            sum_sample_weights(&self.levels),
            self.n,
            "level weights do not add up to n"
        );
    }

    fn find_level_to_compact(&self) -> Option<usize> {
        let num_levels = self.num_levels();
        (0..num_levels).find(|&level| {
            let pop = self.levels[level + 1] - self.levels[level];
            pop > level_capacity(self.k, num_levels, level)
        })
    }

    // Halves `level` into `level + 1`. The level is sorted first (only
    // level 0 can be unsorted); an odd population keeps its smallest element
    // at the level so the encoded total weight is preserved exactly.
    fn compact_level(&mut self, level: usize) {
        if level + 1 == self.num_levels() {
            let top = *self.levels.last().unwrap();
            self.levels.push(top);
        }
        let lo = self.levels[level] as usize;
        let hi = self.levels[level + 1] as usize;
        let above_hi = self.levels[level + 2] as usize;
        let pop = hi - lo;
        if level == 0 && !self.finished {
            let (p_lo, p_hi) = (self.base + lo, self.base + hi);
            self.items[p_lo..p_hi].sort_by(T::total_cmp);
        }
        let odd = pop & 1;
        let start = lo + odd;
        let parity = self.rng.next_bit() as usize;
        let promoted: Vec<T> = self.items[self.base + start..self.base + hi]
            .iter()
            .copied()
            .skip(parity)
            .step_by(2)
            .collect();
        let removed = promoted.len();
        let merged = merge_sorted(
            &promoted,
            &self.items[self.base + hi..self.base + above_hi],
        );
        self.items[self.base + start + removed..self.base + above_hi].copy_from_slice(&merged);
        // Slide the surviving lower items up; the freed space joins the
        // slack region in front of level 0.
        self.items
            .copy_within(self.base..self.base + start, self.base + removed);
        self.base += removed;
        self.levels[level + 1] = start as u32;
        for offset in self.levels.iter_mut().skip(level + 2) {
            *offset -= removed as u32;
        }
    }

    fn track_memory(&mut self) {
        let bytes = self.memory_usage();
        self.mem.adjust(self.tracked_bytes, bytes);
        self.tracked_bytes = bytes;
    }
}

impl<T: SketchItem> Drop for KllSketch<T> {
    fn drop(&mut self) {
        self.mem.adjust(self.tracked_bytes, 0);
        self.tracked_bytes = 0;
    }
}

impl<T: SketchItem> fmt::Debug for KllSketch<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KllSketch")
            .field("k", &self.k)
            .field("n", &self.n)
            .field("extremes", &self.extremes)
            .field("levels", &self.levels)
            .field("retained", &self.num_retained())
            .field("finished", &self.finished)
            .finish()
    }
}

impl<T: SketchItem> PartialEq for KllSketch<T> {
    /// Logical equality: same parameters, extremes and level contents under
    /// the sketch's total order. Buffer capacities and slack layout are
    /// ignored.
    fn eq(&self, other: &Self) -> bool {
        if self.k != other.k
            || self.n != other.n
            || self.finished != other.finished
            || self.levels != other.levels
        {
            return false;
        }
        match (self.extremes, other.extremes) {
            (None, None) => {}
            (Some((a_min, a_max)), Some((b_min, b_max))) => {
                if T::total_cmp(&a_min, &b_min) != Ordering::Equal
                    || T::total_cmp(&a_max, &b_max) != Ordering::Equal
                {
                    return false;
                }
            }
            _ => return false,
        }
        self.items[self.base..]
            .iter()
            .zip(other.items[other.base..].iter())
            .all(|(a, b)| T::total_cmp(a, b) == Ordering::Equal)
    }
}

fn merge_sorted<T: SketchItem>(left: &[T], right: &[T]) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left_iter = left.iter().copied().peekable();
    let mut right_iter = right.iter().copied().peekable();
    while let (Some(l), Some(r)) = (left_iter.peek(), right_iter.peek()) {
        if T::total_cmp(l, r) == Ordering::Greater {
            merged.push(right_iter.next().unwrap());
        } else {
            merged.push(left_iter.next().unwrap());
        }
    }
    merged.extend(left_iter);
    merged.extend(right_iter);
    merged
}

macro_rules! impl_integer_item {
    ($type:ty, $size:expr, $write:ident, $read:ident) => {
        impl SketchItem for $type {
            fn total_cmp(a: &Self, b: &Self) -> Ordering {
                a.cmp(b)
            }

            const SERIALIZED_SIZE: usize = $size;

            fn serialize(value: &Self, bytes: &mut SketchBytes) {
                bytes.$write(*value as _);
            }

            fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
                input
                    .$read()
                    .map(|value| value as $type)
                    .map_err(|_| Error::insufficient_data(stringify!($type)))
            }
        }
    };
}

impl_integer_item!(i8, 1, write_u8, read_u8);
impl_integer_item!(i16, 2, write_i16_le, read_i16_le);
impl_integer_item!(i32, 4, write_i32_le, read_i32_le);
impl_integer_item!(i64, 8, write_i64_le, read_i64_le);

macro_rules! impl_float_item {
    ($type:ty, $size:expr, $write:ident, $read:ident) => {
        impl SketchItem for $type {
            fn total_cmp(a: &Self, b: &Self) -> Ordering {
                match (a.is_nan(), b.is_nan()) {
                    (true, true) => Ordering::Equal,
                    (true, false) => Ordering::Greater,
                    (false, true) => Ordering::Less,
                    (false, false) => a.partial_cmp(b).unwrap_or(Ordering::Equal),
                }
            }

            fn is_nan(&self) -> bool {
                <$type>::is_nan(*self)
            }

            const SERIALIZED_SIZE: usize = $size;

            fn serialize(value: &Self, bytes: &mut SketchBytes) {
                bytes.$write(*value);
            }

            fn deserialize(input: &mut SketchSlice<'_>) -> Result<Self, Error> {
                input
                    .$read()
                    .map_err(|_| Error::insufficient_data(stringify!($type)))
            }
        }
    };
}

impl_float_item!(f32, 4, write_f32_le, read_f32_le);
impl_float_item!(f64, 8, write_f64_le, read_f64_le);

#[cfg(test)]
mod tests {
    use super::*;

    fn heap_sketch(k: u32, seed: u64) -> KllSketch<i64> {
        KllSketch::new(k, seed, MemoryContext::Heap)
    }

    fn check_level_invariants<T: SketchItem>(sketch: &KllSketch<T>) {
        assert_eq!(sketch.levels[0], 0);
        assert_eq!(
            *sketch.levels.last().unwrap() as usize,
            sketch.num_retained()
        );
        for window in sketch.levels.windows(2) {
            assert!(window[0] <= window[1]);
        }
        assert_eq!(sum_sample_weights(&sketch.levels), sketch.n);
    }

    #[test]
    fn test_levels_stay_consistent_under_inserts() {
        let mut sketch = heap_sketch(8, 7);
        for i in 0..10_000 {
            sketch.insert(i);
            if i % 97 == 0 {
                check_level_invariants(&sketch);
            }
        }
        check_level_invariants(&sketch);
        assert!(sketch.num_retained() < 200);
    }

    #[test]
    fn test_compaction_keeps_extremes_reachable() {
        let mut sketch = heap_sketch(8, 3);
        for i in 0..5_000 {
            sketch.insert(i);
        }
        sketch.finish();
        assert_eq!(sketch.estimate_quantile(0.0), 0);
        assert_eq!(sketch.estimate_quantile(1.0), 4_999);
    }

    #[test]
    fn test_from_repeated_value_encodes_count_bits() {
        let sketch =
            KllSketch::from_repeated_value(42i64, 0b1011, 200, 1, MemoryContext::Heap);
        // Bits 0, 1 and 3 are set: one item at each of levels 0, 1 and 3.
        assert_eq!(sketch.levels, vec![0, 1, 2, 2, 3]);
        assert_eq!(sketch.total_count(), 11);
        assert_eq!(sketch.num_retained(), 3);
        check_level_invariants(&sketch);
    }

    #[test]
    fn test_grow_front_preserves_content() {
        let mut sketch = heap_sketch(8, 5);
        for i in (0..100).rev() {
            sketch.insert(i);
        }
        sketch.finish();
        let view = sketch.to_view();
        assert_eq!(view.levels[0], 0);
        assert_eq!(*view.levels.last().unwrap() as usize, view.items.len());
        view.validate().unwrap();
    }

    #[test]
    fn test_compact_drops_empty_top_levels() {
        let mut sketch = KllSketch::from_repeated_value(7i64, 4, 200, 1, MemoryContext::Heap);
        // count = 0b100: levels 0 and 1 are empty, level 2 holds the item.
        assert_eq!(sketch.levels, vec![0, 0, 0, 1]);
        sketch.compact();
        // The top level is populated, nothing to drop.
        assert_eq!(sketch.levels, vec![0, 0, 0, 1]);
        check_level_invariants(&sketch);
    }

    #[test]
    fn test_merge_sorted_with_nan_tail() {
        let left = [1.0f64, f64::NAN];
        let right = [2.0f64];
        let merged = merge_sorted(&left, &right);
        assert_eq!(merged[0], 1.0);
        assert_eq!(merged[1], 2.0);
        assert!(merged[2].is_nan());
    }
}
