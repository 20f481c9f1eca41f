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
use approx_percentile::error::ErrorKind;
use approx_percentile::kll::KllSketch;
use approx_percentile::kll::DEFAULT_K;

const SEED: u64 = 42;

fn spilled_sketch(n: i64) -> KllSketch<i64> {
    let mut sketch = KllSketch::new(DEFAULT_K, SEED, MemoryContext::Heap);
    for i in 0..n {
        sketch.insert(i);
    }
    sketch.finish();
    sketch.compact();
    sketch
}

#[test]
fn test_round_trip() {
    let sketch = spilled_sketch(25_000);
    let bytes = sketch.serialize();
    let restored = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap();

    let (a, b) = (sketch.to_view(), restored.to_view());
    assert_eq!(a.k, b.k);
    assert_eq!(a.n, b.n);
    assert_eq!(a.min_value, b.min_value);
    assert_eq!(a.max_value, b.max_value);
    assert_eq!(a.items, b.items);
    assert_eq!(a.levels, b.levels);
    assert_eq!(
        sketch.estimate_quantile(0.25),
        restored.estimate_quantile(0.25)
    );
}

#[test]
fn test_round_trip_small_sketch() {
    let sketch = spilled_sketch(3);
    let bytes = sketch.serialize();
    let restored = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap();
    assert_eq!(restored.total_count(), 3);
    assert_eq!(restored.estimate_quantile(0.5), 1);
}

#[test]
fn test_round_trip_float_with_nan() {
    let mut sketch = KllSketch::<f64>::new(DEFAULT_K, SEED, MemoryContext::Heap);
    sketch.insert(1.5);
    sketch.insert(f64::NAN);
    sketch.finish();
    sketch.compact();
    let bytes = sketch.serialize();
    let restored = KllSketch::<f64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap();
    assert!(restored.max_value().unwrap().is_nan());
    assert_eq!(restored.min_value(), Some(1.5));
    assert!(restored.estimate_quantile(1.0).is_nan());
}

#[test]
fn test_empty_round_trip() {
    let mut sketch = KllSketch::<i64>::new(64, SEED, MemoryContext::Heap);
    sketch.finish();
    let bytes = sketch.serialize();
    assert_eq!(bytes.len(), 8, "empty sketches are header-only");
    let restored = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap();
    assert!(restored.is_empty());
    assert_eq!(restored.k(), 64);
}

#[test]
fn test_truncated_input() {
    let bytes = spilled_sketch(1_000).serialize();
    for len in [0, 1, 4, 12, bytes.len() - 1] {
        let err = KllSketch::<i64>::deserialize(&bytes[..len], MemoryContext::Heap, SEED)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedSketchData, "len {len}");
    }
}

#[test]
fn test_wrong_version() {
    let mut bytes = spilled_sketch(10).serialize();
    bytes[0] = 99;
    let err = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedSketchData);
    assert!(err.to_string().contains("version"));
}

#[test]
fn test_wrong_item_width() {
    let bytes = spilled_sketch(10).serialize();
    let err = KllSketch::<i32>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap_err();
    assert!(err.to_string().contains("item width"));
}

#[test]
fn test_corrupted_level_offsets() {
    let sketch = spilled_sketch(10);
    let mut bytes = sketch.serialize();
    // Header (8) + n (8) + min/max (16), then the offset count and the
    // first offset, which must be zero.
    let first_offset_pos = 8 + 8 + 16 + 4;
    bytes[first_offset_pos] = 7;
    let err = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::MalformedSketchData);
}

#[test]
fn test_deserialized_sketch_is_mergeable() {
    let a = spilled_sketch(5_000);
    let bytes = a.serialize();
    let mut restored = KllSketch::<i64>::deserialize(&bytes, MemoryContext::Heap, SEED).unwrap();
    let b = spilled_sketch(5_000);
    restored.merge(&b);
    assert_eq!(restored.total_count(), 10_000);
    assert_eq!(restored.estimate_quantile(0.0), 0);
    assert_eq!(restored.estimate_quantile(1.0), 4_999);
}
