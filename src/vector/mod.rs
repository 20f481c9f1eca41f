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

//! Minimal columnar interfaces consumed and produced by the aggregate.
//!
//! The surrounding execution runtime owns vector decoding; by the time rows
//! reach the aggregate, dictionary and lazy encodings are resolved and only
//! two encodings remain: flat values and query-wide constants. These types
//! are that contract, nothing more.

mod row;

pub use self::row::SketchRowColumn;

/// Encoding of a decoded column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Flat,
    Constant,
}

/// A decoded column of fixed-width values.
#[derive(Debug, Clone)]
pub struct ScalarColumn<V> {
    len: usize,
    encoding: Encoding,
    values: Vec<V>,
    nulls: Option<Vec<bool>>,
}

impl<V: Copy> ScalarColumn<V> {
    /// A flat column without nulls.
    pub fn flat(values: Vec<V>) -> Self {
        Self {
            len: values.len(),
            encoding: Encoding::Flat,
            values,
            nulls: None,
        }
    }

    /// A flat column with a null mask (`true` marks a null row).
    ///
    /// # Panics
    ///
    /// Panics if the mask length differs from the value count.
    pub fn flat_nullable(values: Vec<V>, nulls: Vec<bool>) -> Self {
        assert_eq!(values.len(), nulls.len(), "null mask length mismatch");
        Self {
            len: values.len(),
            encoding: Encoding::Flat,
            values,
            nulls: Some(nulls),
        }
    }

    /// A constant column repeating `value` for `len` rows.
    pub fn constant(value: V, len: usize) -> Self {
        Self {
            len,
            encoding: Encoding::Constant,
            values: vec![value],
            nulls: None,
        }
    }

    /// A constant null column of `len` rows.
    pub fn null_constant(len: usize) -> Self
    where
        V: Default,
    {
        Self {
            len,
            encoding: Encoding::Constant,
            values: vec![V::default()],
            nulls: Some(vec![true]),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_constant(&self) -> bool {
        self.encoding == Encoding::Constant
    }

    pub fn is_null_at(&self, row: usize) -> bool {
        match &self.nulls {
            None => false,
            Some(nulls) => nulls[self.index(row)],
        }
    }

    /// Returns the value at `row`; meaningless if the row is null.
    pub fn value_at(&self, row: usize) -> V {
        self.values[self.index(row)]
    }

    pub fn may_have_nulls(&self) -> bool {
        self.nulls.is_some()
    }

    fn index(&self, row: usize) -> usize {
        debug_assert!(row < self.len, "row {row} out of bounds {}", self.len);
        match self.encoding {
            Encoding::Flat => row,
            Encoding::Constant => 0,
        }
    }
}

/// A decoded column of variable-length arrays over a flat element buffer.
#[derive(Debug, Clone)]
pub struct ArrayColumn<V> {
    len: usize,
    encoding: Encoding,
    elements: Vec<V>,
    offsets: Vec<usize>,
    sizes: Vec<usize>,
    nulls: Option<Vec<bool>>,
}

impl<V: Copy> ArrayColumn<V> {
    /// A flat array column from raw parts.
    ///
    /// # Panics
    ///
    /// Panics if offsets/sizes lengths differ or any slice leaves the
    /// element buffer.
    pub fn flat(elements: Vec<V>, offsets: Vec<usize>, sizes: Vec<usize>) -> Self {
        assert_eq!(offsets.len(), sizes.len(), "offsets/sizes length mismatch");
        for (offset, size) in offsets.iter().zip(sizes.iter()) {
            assert!(offset + size <= elements.len(), "array slice out of bounds");
        }
        Self {
            len: offsets.len(),
            encoding: Encoding::Flat,
            elements,
            offsets,
            sizes,
            nulls: None,
        }
    }

    /// A constant column repeating one array for `len` rows.
    pub fn constant(values: Vec<V>, len: usize) -> Self {
        let size = values.len();
        Self {
            len,
            encoding: Encoding::Constant,
            elements: values,
            offsets: vec![0],
            sizes: vec![size],
            nulls: None,
        }
    }

    /// A constant null column of `len` rows.
    pub fn null_constant(len: usize) -> Self {
        Self {
            len,
            encoding: Encoding::Constant,
            elements: Vec::new(),
            offsets: vec![0],
            sizes: vec![0],
            nulls: Some(vec![true]),
        }
    }

    /// An empty flat column ready for [`ArrayColumn::push_row`].
    pub fn empty() -> Self {
        Self {
            len: 0,
            encoding: Encoding::Flat,
            elements: Vec::new(),
            offsets: Vec::new(),
            sizes: Vec::new(),
            nulls: None,
        }
    }

    /// Appends one array row.
    pub fn push_row(&mut self, values: &[V]) {
        debug_assert_eq!(self.encoding, Encoding::Flat);
        self.offsets.push(self.elements.len());
        self.sizes.push(values.len());
        self.elements.extend_from_slice(values);
        if let Some(nulls) = &mut self.nulls {
            nulls.push(false);
        }
        self.len += 1;
    }

    /// Appends one null row.
    pub fn push_null(&mut self) {
        debug_assert_eq!(self.encoding, Encoding::Flat);
        self.offsets.push(self.elements.len());
        self.sizes.push(0);
        let len = self.len;
        let nulls = self.nulls.get_or_insert_with(|| vec![false; len]);
        nulls.push(true);
        self.len += 1;
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn encoding(&self) -> Encoding {
        self.encoding
    }

    pub fn is_constant(&self) -> bool {
        self.encoding == Encoding::Constant
    }

    pub fn is_null_at(&self, row: usize) -> bool {
        match &self.nulls {
            None => false,
            Some(nulls) => nulls[self.index(row)],
        }
    }

    /// Returns the array at `row`; empty if the row is null.
    pub fn slice_at(&self, row: usize) -> &[V] {
        let idx = self.index(row);
        let offset = self.offsets[idx];
        &self.elements[offset..offset + self.sizes[idx]]
    }

    /// Returns the element-buffer offset of the array at `row`.
    pub fn offset_at(&self, row: usize) -> usize {
        self.offsets[self.index(row)]
    }

    /// Returns the length of the array at `row`.
    pub fn size_at(&self, row: usize) -> usize {
        self.sizes[self.index(row)]
    }

    /// Returns the whole element buffer.
    pub fn elements(&self) -> &[V] {
        &self.elements
    }

    fn index(&self, row: usize) -> usize {
        debug_assert!(row < self.len, "row {row} out of bounds {}", self.len);
        match self.encoding {
            Encoding::Flat => row,
            Encoding::Constant => 0,
        }
    }
}

/// The percentile argument: a constant `double` or `array(double)` column.
#[derive(Debug, Clone)]
pub enum PercentileColumn {
    Scalar(ScalarColumn<f64>),
    Array(ArrayColumn<f64>),
}

/// Final output of the aggregate: one quantile (or array of quantiles) per
/// group, or a null constant when the query never resolved percentiles.
#[derive(Debug, Clone)]
pub enum QuantileColumn<V> {
    NullConstant(usize),
    Scalar(ScalarColumn<V>),
    Array(ArrayColumn<V>),
}
