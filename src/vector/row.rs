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

use super::ArrayColumn;
use super::ScalarColumn;

/// The intermediate row column shuffled between partial and final
/// aggregation stages.
///
/// The first three children are query-scope constants; the rest are
/// per-group sketch snapshots. A group whose sketch is empty is emitted as a
/// row-level null, and its child cells are left untouched; readers must not
/// interpret children of null rows.
#[derive(Debug, Clone)]
pub struct SketchRowColumn<T> {
    len: usize,
    nulls: Option<Vec<bool>>,
    pub percentiles: ArrayColumn<f64>,
    pub percentiles_is_array: ScalarColumn<bool>,
    pub accuracy: ScalarColumn<f64>,
    pub k: ScalarColumn<i32>,
    pub n: ScalarColumn<i64>,
    pub min_value: ScalarColumn<T>,
    pub max_value: ScalarColumn<T>,
    pub items: ArrayColumn<T>,
    pub levels: ArrayColumn<i32>,
}

impl<T: Copy> SketchRowColumn<T> {
    /// Assembles a row column from its children.
    ///
    /// # Panics
    ///
    /// Panics if any child disagrees with `len`, or the null mask does.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        len: usize,
        nulls: Option<Vec<bool>>,
        percentiles: ArrayColumn<f64>,
        percentiles_is_array: ScalarColumn<bool>,
        accuracy: ScalarColumn<f64>,
        k: ScalarColumn<i32>,
        n: ScalarColumn<i64>,
        min_value: ScalarColumn<T>,
        max_value: ScalarColumn<T>,
        items: ArrayColumn<T>,
        levels: ArrayColumn<i32>,
    ) -> Self {
        if let Some(nulls) = &nulls {
            assert_eq!(nulls.len(), len, "row null mask length mismatch");
        }
        assert_eq!(percentiles.len(), len, "percentiles length mismatch");
        assert_eq!(
            percentiles_is_array.len(),
            len,
            "percentiles_is_array length mismatch"
        );
        assert_eq!(accuracy.len(), len, "accuracy length mismatch");
        assert_eq!(k.len(), len, "k length mismatch");
        assert_eq!(n.len(), len, "n length mismatch");
        assert_eq!(min_value.len(), len, "min_value length mismatch");
        assert_eq!(max_value.len(), len, "max_value length mismatch");
        assert_eq!(items.len(), len, "items length mismatch");
        assert_eq!(levels.len(), len, "levels length mismatch");
        Self {
            len,
            nulls,
            percentiles,
            percentiles_is_array,
            accuracy,
            k,
            n,
            min_value,
            max_value,
            items,
            levels,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns true if the whole row is null (empty group).
    pub fn is_null_at(&self, row: usize) -> bool {
        debug_assert!(row < self.len, "row {row} out of bounds {}", self.len);
        match &self.nulls {
            None => false,
            Some(nulls) => nulls[row],
        }
    }
}
