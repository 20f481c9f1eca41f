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

use approx_percentile::aggregate::MemoryContext;
use approx_percentile::kll::epsilon_from_k;
use approx_percentile::kll::KllSketch;
use approx_percentile::kll::SketchItem;
use approx_percentile::kll::SketchView;
use approx_percentile::kll::DEFAULT_K;
use approx_percentile::kll::MIN_K;
use googletest::assert_that;
use googletest::prelude::le;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_pcg::Pcg64Mcg;

const SEED: u64 = 42;

fn sketch_of<T: SketchItem>(values: impl IntoIterator<Item = T>) -> KllSketch<T> {
    let mut sketch = KllSketch::new(DEFAULT_K, SEED, MemoryContext::Heap);
    for value in values {
        sketch.insert(value);
    }
    sketch.finish();
    sketch
}

fn check_view_invariants<T: SketchItem>(view: &SketchView<'_, T>) {
    assert_eq!(view.levels[0], 0);
    assert_eq!(*view.levels.last().unwrap() as usize, view.items.len());
    for window in view.levels.windows(2) {
        assert!(window[0] <= window[1], "levels must be non-decreasing");
    }
    let mut total = 0u64;
    for (level, window) in view.levels.windows(2).enumerate() {
        total += ((window[1] - window[0]) as u64) << level;
    }
    assert_eq!(total, view.n, "encoded weights must add up to n");
}

#[test]
fn test_empty() {
    let sketch = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    assert!(sketch.is_empty());
    assert_eq!(sketch.total_count(), 0);
    assert_eq!(sketch.num_retained(), 0);
    assert!(sketch.min_value().is_none());
    assert!(sketch.max_value().is_none());
}

#[test]
#[should_panic(expected = "k must be in")]
fn test_k_too_small_panics() {
    KllSketch::<i64>::new(MIN_K - 1, SEED, MemoryContext::Heap);
}

#[test]
#[should_panic(expected = "finished")]
fn test_query_before_finish_panics() {
    let mut sketch = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    sketch.insert(1);
    sketch.estimate_quantile(0.5);
}

#[test]
#[should_panic(expected = "empty sketch")]
fn test_query_empty_panics() {
    let mut sketch = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    sketch.finish();
    sketch.estimate_quantile(0.5);
}

#[test]
#[should_panic(expected = "must be in [0, 1]")]
fn test_fraction_out_of_range_panics() {
    let sketch = sketch_of([1i64, 2, 3]);
    sketch.estimate_quantile(1.5);
}

#[test]
fn test_one_item() {
    let sketch = sketch_of([7i64]);
    assert_eq!(sketch.total_count(), 1);
    assert_eq!(sketch.min_value(), Some(7));
    assert_eq!(sketch.max_value(), Some(7));
    for fraction in [0.0, 0.01, 0.5, 0.99, 1.0] {
        assert_eq!(sketch.estimate_quantile(fraction), 7);
    }
}

#[test]
fn test_exact_mode_small_input() {
    let sketch = sketch_of(1..=100i64);
    assert_eq!(sketch.estimate_quantile(0.0), 1);
    assert_eq!(sketch.estimate_quantile(0.5), 50);
    assert_eq!(sketch.estimate_quantile(1.0), 100);
}

#[test]
fn test_extremes_always_exact() {
    let sketch = sketch_of(1..=100_000i64);
    assert_eq!(sketch.estimate_quantile(0.0), 1);
    assert_eq!(sketch.estimate_quantile(1.0), 100_000);
    assert_eq!(sketch.min_value(), Some(1));
    assert_eq!(sketch.max_value(), Some(100_000));
}

#[test]
fn test_finish_is_idempotent() {
    let mut sketch = sketch_of(1..=1000i64);
    let before: Vec<i64> = sketch.to_view().items.to_vec();
    sketch.finish();
    assert_eq!(sketch.to_view().items, &before[..]);
}

#[test]
fn test_reinsert_after_finish() {
    let mut sketch = sketch_of([5i64, 1, 9]);
    assert!(sketch.is_finished());
    sketch.insert(3);
    assert!(!sketch.is_finished());
    sketch.finish();
    assert_eq!(sketch.total_count(), 4);
    assert_eq!(sketch.estimate_quantile(0.0), 1);
    assert_eq!(sketch.estimate_quantile(1.0), 9);
}

#[test]
fn test_view_invariants_as_the_sketch_grows() {
    let mut sketch = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    for i in 0..50_000 {
        sketch.insert(i);
        if i % 1_013 == 0 {
            check_view_invariants(&sketch.to_view());
        }
    }
    sketch.finish();
    sketch.compact();
    let view = sketch.to_view();
    check_view_invariants(&view);
    view.validate().unwrap();
    assert!(view.items.len() < 700, "retained items must stay O(k)");
}

#[test]
fn test_estimate_quantiles_follows_input_order() {
    let sketch = sketch_of(1..=1000i64);
    let fractions = [0.9, 0.1, 0.5, 0.5];
    let mut out = [0i64; 4];
    sketch.estimate_quantiles(&fractions, &mut out);
    assert!(out[0] > out[1]);
    assert_eq!(out[2], out[3], "duplicate fractions must agree");
    assert_eq!(out[2], sketch.estimate_quantile(0.5));
}

#[test]
fn test_permutation_invariance_under_fixed_seed() {
    let values: Vec<i64> = (0..5_000).collect();
    let mut shuffled = values.clone();
    shuffled.shuffle(&mut Pcg64Mcg::seed_from_u64(9));

    let mut a = sketch_of(values);
    let mut b = sketch_of(shuffled);
    a.compact();
    b.compact();

    let (va, vb) = (a.to_view(), b.to_view());
    assert_eq!(va.n, vb.n);
    assert_eq!(va.levels, vb.levels);
    assert_eq!(va.items, vb.items, "same multiset and seed must match bit for bit");
}

#[test]
fn test_merge_combines_extremes_and_counts() {
    let mut low = sketch_of(0..10_000i64);
    let high = sketch_of(10_000..20_000i64);
    low.merge(&high);
    assert_eq!(low.total_count(), 20_000);
    assert_eq!(low.min_value(), Some(0));
    assert_eq!(low.max_value(), Some(19_999));
    let median = low.estimate_quantile(0.5);
    let tolerance = (20_000.0 * 2.0 * epsilon_from_k(DEFAULT_K)) as i64;
    assert!((median - 10_000).abs() <= tolerance, "median {median} too far off");
}

#[test]
fn test_merge_with_empty_is_identity() {
    let mut sketch = sketch_of(1..=100i64);
    let mut empty = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    empty.finish();
    let before: Vec<i64> = sketch.to_view().items.to_vec();
    sketch.merge(&empty);
    assert_eq!(sketch.to_view().items, &before[..]);

    empty.merge(&sketch);
    assert_eq!(empty.total_count(), 100);
    assert_eq!(empty.estimate_quantile(0.0), 1);
}

#[test]
fn test_merge_takes_the_smaller_k() {
    let mut coarse = KllSketch::<i64>::new(256, SEED, MemoryContext::Heap);
    let mut fine = KllSketch::<i64>::new(128, SEED, MemoryContext::Heap);
    coarse.insert(1);
    fine.insert(2);
    coarse.finish();
    fine.finish();
    coarse.merge(&fine);
    assert_eq!(coarse.k(), 128);
}

#[test]
fn test_merge_is_associative_under_fixed_seed() {
    let build = |range: std::ops::Range<i64>| sketch_of(range);
    // Small enough that merging never triggers compaction, so the merges
    // must agree bit for bit in any association.
    let (a, b, c) = (build(0..60), build(60..120), build(120..180));

    let mut left = KllSketch::from_view(a.to_view(), MemoryContext::Heap, SEED);
    left.finish();
    left.merge(&b);
    left.merge(&c);

    let mut bc = KllSketch::from_view(b.to_view(), MemoryContext::Heap, SEED);
    bc.finish();
    bc.merge(&c);
    let mut right = KllSketch::from_view(a.to_view(), MemoryContext::Heap, SEED);
    right.finish();
    right.merge(&bc);

    left.compact();
    right.compact();
    assert_eq!(left.to_view().items, right.to_view().items);
    assert_eq!(left.to_view().levels, right.to_view().levels);
    assert_eq!(left.total_count(), right.total_count());
}

#[test]
fn test_merge_views_is_order_independent() {
    let parts: Vec<KllSketch<i64>> = vec![
        sketch_of(0..3_000),
        sketch_of(3_000..6_000),
        sketch_of(6_000..9_000),
    ];
    let views: Vec<SketchView<'_, i64>> = parts.iter().map(|s| s.to_view()).collect();
    let reversed: Vec<SketchView<'_, i64>> = parts.iter().rev().map(|s| s.to_view()).collect();

    let mut forward = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    forward.merge_views(&views);
    let mut backward = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    backward.merge_views(&reversed);

    forward.compact();
    backward.compact();
    assert_eq!(forward.to_view().items, backward.to_view().items);
    assert_eq!(forward.to_view().levels, backward.to_view().levels);
}

#[test]
fn test_from_repeated_value_matches_repeated_inserts() {
    let repeated =
        KllSketch::<i64>::from_repeated_value(42, 10_000, DEFAULT_K, SEED, MemoryContext::Heap);
    assert_eq!(repeated.total_count(), 10_000);
    assert_eq!(repeated.min_value(), Some(42));
    assert_eq!(repeated.max_value(), Some(42));
    for fraction in [0.0, 0.01, 0.5, 0.99, 1.0] {
        assert_eq!(repeated.estimate_quantile(fraction), 42);
    }
    check_view_invariants(&repeated.to_view());
}

#[test]
fn test_weighted_equivalence() {
    // One (value, weight) pair must be indistinguishable from `weight`
    // repeated inserts, up to randomized ties.
    for weight in [1u64, 2, 37, 512, 4_096] {
        let mut inserted = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
        for value in 0..100 {
            for _ in 0..weight {
                inserted.insert(value);
            }
        }
        inserted.finish();

        let mut merged = KllSketch::<i64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
        let repeats: Vec<KllSketch<i64>> = (0..100)
            .map(|value| {
                KllSketch::from_repeated_value(value, weight, DEFAULT_K, SEED, MemoryContext::Heap)
            })
            .collect();
        let views: Vec<SketchView<'_, i64>> = repeats.iter().map(|s| s.to_view()).collect();
        merged.merge_views(&views);

        let n = 100 * weight;
        assert_eq!(merged.total_count(), n);
        // Both sides are approximate, so allow twice the single-sketch bound.
        let tolerance = (100.0 * 4.0 * epsilon_from_k(DEFAULT_K)).ceil() as i64;
        for fraction in [0.1, 0.25, 0.5, 0.75, 0.9] {
            let expected = inserted.estimate_quantile(fraction);
            let actual = merged.estimate_quantile(fraction);
            assert!(
                (expected - actual).abs() <= tolerance,
                "weight {weight} fraction {fraction}: {expected} vs {actual}"
            );
        }
    }
}

#[test]
fn test_round_trip_through_view() {
    let sketch = sketch_of(1..=5_000i64);
    let copy = KllSketch::from_view(sketch.to_view(), MemoryContext::Heap, SEED);
    let (original, copied) = (sketch.to_view(), copy.to_view());
    assert_eq!(original.k, copied.k);
    assert_eq!(original.n, copied.n);
    assert_eq!(original.min_value, copied.min_value);
    assert_eq!(original.max_value, copied.max_value);
    assert_eq!(original.items, copied.items);
    assert_eq!(original.levels, copied.levels);
}

#[test]
fn test_nan_sorts_greater_than_everything() {
    let mut sketch = KllSketch::<f64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    sketch.insert(f64::NAN);
    for i in 1..=100 {
        sketch.insert(i as f64);
    }
    sketch.finish();
    assert_eq!(sketch.estimate_quantile(0.0), 1.0);
    assert!(sketch.estimate_quantile(1.0).is_nan());
    assert!(!sketch.estimate_quantile(0.5).is_nan());
    assert!(sketch.max_value().unwrap().is_nan());
    assert_eq!(sketch.min_value(), Some(1.0));
}

#[test]
fn test_only_nan_input() {
    let mut sketch = KllSketch::<f64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    sketch.insert(f64::NAN);
    sketch.finish();
    assert!(sketch.estimate_quantile(0.5).is_nan());
    assert!(sketch.min_value().unwrap().is_nan());
}

#[test]
fn test_rank_error_bound_over_seed_sweep() {
    const N: usize = 10_000;
    let bound = 2.0 * epsilon_from_k(DEFAULT_K);
    for seed in 1..=20u64 {
        let mut sketch = KllSketch::<i64>::new(DEFAULT_K, seed, MemoryContext::Heap);
        let mut values: Vec<i64> = (0..N as i64).collect();
        values.shuffle(&mut Pcg64Mcg::seed_from_u64(seed));
        for value in values {
            sketch.insert(value);
        }
        sketch.finish();

        let mut worst = 0.0f64;
        for percent in 1..100 {
            let fraction = percent as f64 / 100.0;
            let estimate = sketch.estimate_quantile(fraction);
            let actual_rank = (estimate + 1) as f64 / N as f64;
            worst = worst.max((actual_rank - fraction).abs());
        }
        assert_that!(worst, le(bound));
    }
}

#[test]
fn test_arena_accounting_follows_sketch_lifetime() {
    use approx_percentile::aggregate::Arena;
    use std::rc::Rc;

    let arena = Rc::new(Arena::new());
    {
        let mut sketch = KllSketch::<i64>::new(
            DEFAULT_K,
            SEED,
            MemoryContext::Arena(Rc::clone(&arena)),
        );
        for i in 0..10_000 {
            sketch.insert(i);
        }
        assert!(arena.bytes_reserved() > 0);
        let reserved_before_spill = arena.bytes_reserved();
        let copy = KllSketch::from_view(sketch.to_view(), MemoryContext::Heap, SEED);
        assert_eq!(
            arena.bytes_reserved(),
            reserved_before_spill,
            "heap copies must not touch the arena"
        );
        drop(copy);
    }
    assert_eq!(arena.bytes_reserved(), 0, "dropping the sketch releases its bytes");
}
