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

use super::MAX_K;
use super::MIN_K;
use super::MIN_LEVEL_CAPACITY;

/// The error exponent of the KLL bound: epsilon ~ 1.65 * k^-0.9.
const EPSILON_EXPONENT: f64 = 0.9;
const EPSILON_FACTOR: f64 = 1.65;

/// Returns the capacity of `level` in a sketch with `num_levels` levels.
///
/// Capacities decay geometrically with depth so that the whole sketch
/// retains O(k) items: `ceil(k * (2/3)^(num_levels - 1 - level))`, never
/// below [`MIN_LEVEL_CAPACITY`].
pub(crate) fn level_capacity(k: u32, num_levels: usize, level: usize) -> u32 {
    debug_assert!(level < num_levels, "level must be < num_levels");
    let depth = (num_levels - level - 1) as i32;
    let cap = (k as f64 * (2.0f64 / 3.0).powi(depth)).ceil() as u32;
    cap.max(MIN_LEVEL_CAPACITY)
}

/// Returns the total logical weight encoded by the level offsets:
/// every item at level `i` counts as `2^i`.
pub(crate) fn sum_sample_weights(levels: &[u32]) -> u64 {
    let mut total = 0u64;
    for (level, window) in levels.windows(2).enumerate() {
        total += ((window[1] - window[0]) as u64) << level;
    }
    total
}

/// Returns the expected normalized rank error for the given k.
pub fn epsilon_from_k(k: u32) -> f64 {
    EPSILON_FACTOR / (k as f64).powf(EPSILON_EXPONENT)
}

/// Returns the smallest k whose expected error is at most `epsilon`.
///
/// The result is clamped to `[MIN_K, MAX_K]`; callers validate that
/// `epsilon` lies in `(0, 1]` before mapping it.
pub fn k_from_epsilon(epsilon: f64) -> u32 {
    let k = (EPSILON_FACTOR / epsilon).powf(1.0 / EPSILON_EXPONENT).ceil();
    (k as u32).clamp(MIN_K, MAX_K)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_capacity_decays_with_depth() {
        // Deepest level keeps the full k, shallower levels decay by 2/3.
        assert_eq!(level_capacity(200, 1, 0), 200);
        assert_eq!(level_capacity(200, 2, 1), 200);
        assert_eq!(level_capacity(200, 2, 0), 134);
        assert_eq!(level_capacity(200, 3, 0), 89);
    }

    #[test]
    fn test_level_capacity_floor() {
        assert_eq!(level_capacity(200, 14, 0), MIN_LEVEL_CAPACITY);
        assert_eq!(level_capacity(8, 1, 0), 8);
    }

    #[test]
    fn test_sum_sample_weights() {
        // Two items at level 0, one at level 1, one at level 3.
        assert_eq!(sum_sample_weights(&[0, 2, 3, 3, 4]), 2 + 2 + 8);
        assert_eq!(sum_sample_weights(&[0, 0]), 0);
    }

    #[test]
    fn test_k_epsilon_round_trip() {
        for k in [8u32, 64, 200, 1024, 4096] {
            let eps = epsilon_from_k(k);
            let recovered = k_from_epsilon(eps);
            assert!(recovered >= k, "k_from_epsilon must not lose accuracy");
            assert!(recovered <= k + 1);
        }
    }

    #[test]
    fn test_k_from_epsilon_clamps() {
        assert_eq!(k_from_epsilon(1.0), MIN_K);
        assert_eq!(k_from_epsilon(1e-12), MAX_K);
    }
}
