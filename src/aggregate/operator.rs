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
use std::rc::Rc;

use super::accumulator::KllSketchAccumulator;
use crate::common::process_seed;
use crate::common::Arena;
use crate::common::MemoryContext;
use crate::error::Error;
use crate::kll::SketchItem;
use crate::kll::SketchView;
use crate::vector::ArrayColumn;
use crate::vector::PercentileColumn;
use crate::vector::QuantileColumn;
use crate::vector::ScalarColumn;
use crate::vector::SketchRowColumn;

/// Largest weight a row may carry.
pub const MAX_WEIGHT: i64 = (1 << 60) - 1;

/// Slot index of a group, assigned by the surrounding runtime.
pub type GroupId = usize;

/// The decoded raw-input columns of one batch.
///
/// `weights` and `accuracy` must be present exactly when the operator was
/// built with the corresponding flags; `percentiles` and `accuracy` are
/// query-scope constants validated on first contact and checked for
/// equality afterwards.
pub struct RawInput<'a, T: SketchItem> {
    pub values: &'a ScalarColumn<T>,
    pub weights: Option<&'a ScalarColumn<i64>>,
    pub percentiles: &'a PercentileColumn,
    pub accuracy: Option<&'a ScalarColumn<f64>>,
}

#[derive(Debug, Clone)]
struct Percentiles {
    values: Vec<f64>,
    is_array: bool,
}

/// The approx_percentile aggregation operator.
///
/// One instance serves one physical aggregation node. Per-query scalars
/// (percentiles, accuracy) start unset, are resolved on the first input row
/// and are immutable afterwards; every subsequent row must agree. Group
/// state lives in slots backed by a shared [`Arena`] accounting handle; the
/// operator is single-threaded within a task and performs no locking.
pub struct ApproxPercentileAggregate<T: SketchItem> {
    has_weight: bool,
    has_accuracy: bool,
    validate_intermediate_inputs: bool,
    fixed_seed: Option<u32>,
    percentiles: Option<Percentiles>,
    accuracy: Option<f64>,
    arena: Rc<Arena>,
    accumulators: Vec<Option<KllSketchAccumulator<T>>>,
}

impl<T: SketchItem> ApproxPercentileAggregate<T> {
    pub fn new(
        has_weight: bool,
        has_accuracy: bool,
        validate_intermediate_inputs: bool,
        fixed_seed: Option<u32>,
    ) -> Self {
        Self {
            has_weight,
            has_accuracy,
            validate_intermediate_inputs,
            fixed_seed,
            percentiles: None,
            accuracy: None,
            arena: Rc::new(Arena::new()),
            accumulators: Vec::new(),
        }
    }

    /// Returns the arena accounting handle shared by all groups.
    pub fn arena(&self) -> &Rc<Arena> {
        &self.arena
    }

    /// Returns the fixed-width size of the per-group struct.
    pub fn accumulator_fixed_width_size(&self) -> usize {
        size_of::<KllSketchAccumulator<T>>()
    }

    /// Initializes accumulators at the given slots.
    pub fn new_groups(&mut self, group_ids: &[GroupId]) {
        let max = group_ids.iter().copied().max().map_or(0, |id| id + 1);
        if self.accumulators.len() < max {
            self.accumulators.resize_with(max, || None);
        }
        for &group in group_ids {
            let seed = self.sketch_seed();
            let mem = MemoryContext::Arena(Rc::clone(&self.arena));
            self.accumulators[group] = Some(KllSketchAccumulator::new(mem, seed));
        }
    }

    /// Destroys the accumulators at the given slots, releasing their arena
    /// reservation.
    pub fn destroy_groups(&mut self, group_ids: &[GroupId]) {
        for &group in group_ids {
            self.accumulators[group] = None;
        }
    }

    /// Adds raw input rows, `groups[row]` selecting the slot per row.
    pub fn add_raw_input(
        &mut self,
        groups: &[GroupId],
        selected_rows: &[usize],
        input: &RawInput<'_, T>,
        _may_pushdown: bool,
    ) -> Result<(), Error> {
        self.decode_raw_arguments(selected_rows, input)?;
        if self.has_weight {
            let weights = self.raw_weights(input)?;
            for &row in selected_rows {
                if input.values.is_null_at(row) || weights.is_null_at(row) {
                    continue;
                }
                let value = input.values.value_at(row);
                let weight = weights.value_at(row);
                check_weight(weight)?;
                let seed = self.sketch_seed();
                let accumulator = self.init_raw_accumulator(groups[row]);
                accumulator.append_weighted(value, weight, seed);
            }
        } else if input.values.may_have_nulls() {
            for &row in selected_rows {
                if input.values.is_null_at(row) {
                    continue;
                }
                let value = input.values.value_at(row);
                self.init_raw_accumulator(groups[row]).append(value);
            }
        } else {
            for &row in selected_rows {
                let value = input.values.value_at(row);
                self.init_raw_accumulator(groups[row]).append(value);
            }
        }
        Ok(())
    }

    /// Adds raw input rows that all belong to one group.
    pub fn add_single_group_raw_input(
        &mut self,
        group: GroupId,
        selected_rows: &[usize],
        input: &RawInput<'_, T>,
    ) -> Result<(), Error> {
        self.decode_raw_arguments(selected_rows, input)?;
        if self.has_weight {
            let weights = self.raw_weights(input)?;
            for &row in selected_rows {
                if input.values.is_null_at(row) || weights.is_null_at(row) {
                    continue;
                }
                let value = input.values.value_at(row);
                let weight = weights.value_at(row);
                check_weight(weight)?;
                let seed = self.sketch_seed();
                self.init_raw_accumulator(group).append_weighted(value, weight, seed);
            }
        } else {
            for &row in selected_rows {
                if input.values.is_null_at(row) {
                    continue;
                }
                let value = input.values.value_at(row);
                self.init_raw_accumulator(group).append(value);
            }
        }
        Ok(())
    }

    /// Adds serialized partial states, `groups[row]` selecting the slot.
    pub fn add_intermediate_results(
        &mut self,
        groups: &[GroupId],
        selected_rows: &[usize],
        input: &SketchRowColumn<T>,
    ) -> Result<(), Error> {
        self.check_intermediate_encodings(input)?;
        let levels = self.decode_levels(input)?;
        let mut constants_resolved = false;
        for &row in selected_rows {
            if input.is_null_at(row) || input.percentiles_is_array.is_null_at(row) {
                continue;
            }
            if !constants_resolved {
                self.resolve_intermediate_constants(input, row)?;
                constants_resolved = true;
            }
            self.check_intermediate_row(input, row)?;
            let view = build_view(input, &levels, row);
            let accumulator = self.init_raw_accumulator(groups[row]);
            accumulator.append_view(view);
        }
        Ok(())
    }

    /// Adds serialized partial states that all belong to one group. The
    /// views of the batch are collected and merged in a single pass.
    pub fn add_single_group_intermediate_results(
        &mut self,
        group: GroupId,
        selected_rows: &[usize],
        input: &SketchRowColumn<T>,
    ) -> Result<(), Error> {
        self.check_intermediate_encodings(input)?;
        let levels = self.decode_levels(input)?;
        let mut views: Vec<SketchView<'_, T>> = Vec::with_capacity(selected_rows.len());
        let mut constants_resolved = false;
        for &row in selected_rows {
            if input.is_null_at(row) || input.percentiles_is_array.is_null_at(row) {
                continue;
            }
            if !constants_resolved {
                self.resolve_intermediate_constants(input, row)?;
                constants_resolved = true;
            }
            self.check_intermediate_row(input, row)?;
            views.push(build_view(input, &levels, row));
        }
        if !views.is_empty() {
            self.init_raw_accumulator(group).append_views(&views);
        }
        Ok(())
    }

    /// Extracts final per-group results.
    pub fn extract_values(&mut self, groups: &[GroupId]) -> Result<QuantileColumn<T>, Error> {
        for &group in groups {
            let seed = self.sketch_seed();
            self.accumulator_mut(group).flush(seed);
        }

        // When all inputs were null or masked out, the percentiles were
        // never resolved; the result is null for every group.
        let Some(percentiles) = self.percentiles.clone() else {
            return Ok(QuantileColumn::NullConstant(groups.len()));
        };

        if percentiles.is_array {
            let mut out = ArrayColumn::empty();
            let mut scratch = vec![T::default(); percentiles.values.len()];
            for &group in groups {
                let sketch = self.accumulator(group).sketch();
                if sketch.total_count() == 0 {
                    out.push_null();
                } else {
                    sketch.estimate_quantiles(&percentiles.values, &mut scratch);
                    out.push_row(&scratch);
                }
            }
            Ok(QuantileColumn::Array(out))
        } else {
            debug_assert_eq!(percentiles.values.len(), 1);
            let fraction = *percentiles.values.last().unwrap();
            let mut values = Vec::with_capacity(groups.len());
            let mut nulls = Vec::with_capacity(groups.len());
            for &group in groups {
                let sketch = self.accumulator(group).sketch();
                if sketch.total_count() == 0 {
                    values.push(T::default());
                    nulls.push(true);
                } else {
                    values.push(sketch.estimate_quantile(fraction));
                    nulls.push(false);
                }
            }
            Ok(QuantileColumn::Scalar(ScalarColumn::flat_nullable(
                values, nulls,
            )))
        }
    }

    /// Extracts serialized partial states for shuffling.
    ///
    /// Groups whose sketch is empty become row-level nulls with untouched
    /// children. The query-scope children are constants; when the operator
    /// never resolved percentiles they are null constants.
    pub fn extract_accumulators(
        &mut self,
        groups: &[GroupId],
    ) -> Result<SketchRowColumn<T>, Error> {
        let num_groups = groups.len();
        let sketches: Vec<_> = groups
            .iter()
            .map(|&group| {
                let seed = self.sketch_seed();
                self.accumulator(group).compact_for_spill(seed)
            })
            .collect();

        let (percentiles_col, is_array_col, accuracy_col) = match &self.percentiles {
            None => (
                ArrayColumn::null_constant(num_groups),
                ScalarColumn::null_constant(num_groups),
                ScalarColumn::null_constant(num_groups),
            ),
            Some(percentiles) => (
                ArrayColumn::constant(percentiles.values.clone(), num_groups),
                ScalarColumn::constant(percentiles.is_array, num_groups),
                match self.accuracy {
                    Some(accuracy) => ScalarColumn::constant(accuracy, num_groups),
                    None => ScalarColumn::null_constant(num_groups),
                },
            ),
        };

        let mut row_nulls = Vec::with_capacity(num_groups);
        let mut k = Vec::with_capacity(num_groups);
        let mut n = Vec::with_capacity(num_groups);
        let mut min_value = Vec::with_capacity(num_groups);
        let mut max_value = Vec::with_capacity(num_groups);
        let mut items = ArrayColumn::empty();
        let mut levels = ArrayColumn::empty();
        let mut levels_scratch: Vec<i32> = Vec::new();
        for sketch in &sketches {
            let view = sketch.to_view();
            if view.n == 0 {
                row_nulls.push(true);
                k.push(0);
                n.push(0);
                min_value.push(T::default());
                max_value.push(T::default());
                items.push_row(&[]);
                levels.push_row(&[]);
                continue;
            }
            row_nulls.push(false);
            k.push(view.k as i32);
            n.push(view.n as i64);
            min_value.push(view.min_value);
            max_value.push(view.max_value);
            items.push_row(view.items);
            levels_scratch.clear();
            levels_scratch.extend(view.levels.iter().map(|&offset| offset as i32));
            levels.push_row(&levels_scratch);
        }

        Ok(SketchRowColumn::new(
            num_groups,
            Some(row_nulls),
            percentiles_col,
            is_array_col,
            accuracy_col,
            ScalarColumn::flat(k),
            ScalarColumn::flat(n),
            ScalarColumn::flat(min_value),
            ScalarColumn::flat(max_value),
            items,
            levels,
        ))
    }

    fn decode_raw_arguments(
        &mut self,
        selected_rows: &[usize],
        input: &RawInput<'_, T>,
    ) -> Result<(), Error> {
        if self.has_weight != input.weights.is_some()
            || self.has_accuracy != input.accuracy.is_some()
        {
            return Err(Error::invalid_argument(
                "wrong number of arguments passed to approx_percentile",
            ));
        }
        if selected_rows.is_empty() {
            return Ok(());
        }
        self.check_set_percentile_column(selected_rows, input.percentiles)?;
        if let Some(accuracy) = input.accuracy {
            self.check_set_accuracy_column(selected_rows, accuracy)?;
        }
        Ok(())
    }

    fn raw_weights<'a>(
        &self,
        input: &RawInput<'a, T>,
    ) -> Result<&'a ScalarColumn<i64>, Error> {
        input.weights.ok_or_else(|| {
            Error::invalid_argument("weight column missing for weighted approx_percentile")
        })
    }

    fn check_set_percentile_column(
        &mut self,
        selected_rows: &[usize],
        column: &PercentileColumn,
    ) -> Result<(), Error> {
        let first_row = selected_rows[0];
        match column {
            PercentileColumn::Scalar(column) => {
                if !column.is_constant() {
                    for &row in selected_rows {
                        if column.is_null_at(row) {
                            return Err(Error::invalid_argument("Percentile cannot be null"));
                        }
                        if column.value_at(row) != column.value_at(first_row) {
                            return Err(Error::invalid_argument(
                                "Percentile argument must be constant for all input rows",
                            ));
                        }
                    }
                } else if column.is_null_at(first_row) {
                    return Err(Error::invalid_argument("Percentile cannot be null"));
                }
                self.check_set_percentiles(false, &[column.value_at(first_row)])
            }
            PercentileColumn::Array(column) => {
                if !column.is_constant() {
                    for &row in selected_rows {
                        if column.is_null_at(row) {
                            return Err(Error::invalid_argument("Percentile cannot be null"));
                        }
                        if column.slice_at(row) != column.slice_at(first_row) {
                            return Err(Error::invalid_argument(
                                "Percentile argument must be constant for all input rows",
                            ));
                        }
                    }
                } else if column.is_null_at(first_row) {
                    return Err(Error::invalid_argument("Percentile cannot be null"));
                }
                self.check_set_percentiles(true, column.slice_at(first_row))
            }
        }
    }

    fn check_set_percentiles(&mut self, is_array: bool, values: &[f64]) -> Result<(), Error> {
        match &self.percentiles {
            None => {
                if values.is_empty() {
                    return Err(Error::invalid_argument("Percentile cannot be empty"));
                }
                for &value in values {
                    if value.is_nan() || !(0.0..=1.0).contains(&value) {
                        return Err(Error::invalid_argument(
                            "Percentile must be between 0 and 1",
                        )
                        .with_context("percentile", value));
                    }
                }
                self.percentiles = Some(Percentiles {
                    values: values.to_vec(),
                    is_array,
                });
                Ok(())
            }
            Some(existing) => {
                if existing.is_array != is_array || existing.values != values {
                    return Err(Error::invalid_argument(
                        "Percentile argument must be constant for all input rows",
                    ));
                }
                Ok(())
            }
        }
    }

    fn check_set_accuracy_column(
        &mut self,
        selected_rows: &[usize],
        column: &ScalarColumn<f64>,
    ) -> Result<(), Error> {
        if column.is_constant() {
            if column.is_null_at(selected_rows[0]) {
                return Err(Error::invalid_argument("Accuracy cannot be null"));
            }
            return self.check_set_accuracy(column.value_at(selected_rows[0]));
        }
        for &row in selected_rows {
            if column.is_null_at(row) {
                return Err(Error::invalid_argument("Accuracy cannot be null"));
            }
            self.check_set_accuracy(column.value_at(row))?;
        }
        Ok(())
    }

    fn check_set_accuracy(&mut self, accuracy: f64) -> Result<(), Error> {
        if !(accuracy > 0.0 && accuracy <= 1.0) {
            return Err(
                Error::invalid_argument("Accuracy must be between 0 and 1")
                    .with_context("accuracy", accuracy),
            );
        }
        match self.accuracy {
            None => {
                self.accuracy = Some(accuracy);
                Ok(())
            }
            Some(existing) if existing == accuracy => Ok(()),
            Some(_) => Err(Error::invalid_argument(
                "Accuracy argument must be constant for all input rows",
            )),
        }
    }

    fn check_intermediate_encodings(&self, input: &SketchRowColumn<T>) -> Result<(), Error> {
        if !self.validate_intermediate_inputs {
            debug_assert!(!input.k.is_constant() && !input.n.is_constant());
            return Ok(());
        }
        if !input.percentiles.is_constant()
            || !input.percentiles_is_array.is_constant()
            || !input.accuracy.is_constant()
        {
            return Err(Error::malformed(
                "query-scope intermediate columns must be constant encoded",
            ));
        }
        if input.k.is_constant()
            || input.n.is_constant()
            || input.min_value.is_constant()
            || input.max_value.is_constant()
            || input.items.is_constant()
            || input.levels.is_constant()
        {
            return Err(Error::malformed(
                "per-group intermediate columns must be flat encoded",
            ));
        }
        Ok(())
    }

    // The wire type of level offsets is int32; sketches address them as
    // u32. Converted once per batch so row views stay zero-copy.
    fn decode_levels(&self, input: &SketchRowColumn<T>) -> Result<Vec<u32>, Error> {
        let elements = input.levels.elements();
        let mut levels = Vec::with_capacity(elements.len());
        for &offset in elements {
            if offset < 0 {
                if self.validate_intermediate_inputs {
                    return Err(Error::malformed("negative level offset")
                        .with_context("offset", offset));
                }
                debug_assert!(offset >= 0, "negative level offset {offset}");
            }
            levels.push(offset as u32);
        }
        Ok(levels)
    }

    fn resolve_intermediate_constants(
        &mut self,
        input: &SketchRowColumn<T>,
        row: usize,
    ) -> Result<(), Error> {
        if self.validate_intermediate_inputs && input.percentiles.is_null_at(row) {
            return Err(Error::malformed("percentiles cell of a non-null row is null"));
        }
        let is_array = input.percentiles_is_array.value_at(row);
        let values = input.percentiles.slice_at(row);
        self.check_set_percentiles(is_array, values)?;
        if !input.accuracy.is_null_at(row) {
            self.check_set_accuracy(input.accuracy.value_at(row))?;
        }
        Ok(())
    }

    fn check_intermediate_row(
        &self,
        input: &SketchRowColumn<T>,
        row: usize,
    ) -> Result<(), Error> {
        if !self.validate_intermediate_inputs {
            return Ok(());
        }
        if input.k.is_null_at(row)
            || input.n.is_null_at(row)
            || input.min_value.is_null_at(row)
            || input.max_value.is_null_at(row)
            || input.items.is_null_at(row)
            || input.levels.is_null_at(row)
        {
            return Err(Error::malformed("sketch cell of a non-null row is null")
                .with_context("row", row));
        }
        Ok(())
    }

    fn init_raw_accumulator(&mut self, group: GroupId) -> &mut KllSketchAccumulator<T> {
        let accuracy = self.accuracy;
        let accumulator = self.accumulator_mut(group);
        if let Some(accuracy) = accuracy {
            accumulator.set_accuracy(accuracy);
        }
        accumulator
    }

    fn accumulator(&self, group: GroupId) -> &KllSketchAccumulator<T> {
        self.accumulators[group]
            .as_ref()
            .expect("group slot is not initialized")
    }

    fn accumulator_mut(&mut self, group: GroupId) -> &mut KllSketchAccumulator<T> {
        self.accumulators[group]
            .as_mut()
            .expect("group slot is not initialized")
    }

    fn sketch_seed(&self) -> u64 {
        self.fixed_seed
            .map(u64::from)
            .unwrap_or_else(process_seed)
    }
}

fn check_weight(weight: i64) -> Result<(), Error> {
    if !(1..=MAX_WEIGHT).contains(&weight) {
        return Err(Error::invalid_argument(format!(
            "approx_percentile: weight must be in range [1, {MAX_WEIGHT}], got {weight}"
        )));
    }
    Ok(())
}

fn build_view<'a, T: SketchItem>(
    input: &'a SketchRowColumn<T>,
    levels: &'a [u32],
    row: usize,
) -> SketchView<'a, T> {
    let levels_offset = input.levels.offset_at(row);
    let levels_size = input.levels.size_at(row);
    SketchView {
        k: input.k.value_at(row) as u32,
        n: input.n.value_at(row) as u64,
        min_value: input.min_value.value_at(row),
        max_value: input.max_value.value_at(row),
        items: input.items.slice_at(row),
        levels: &levels[levels_offset..levels_offset + levels_size],
    }
}
