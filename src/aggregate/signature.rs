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

//! The registration surface of the aggregate: the signatures it is exposed
//! under, and the resolution of raw argument types into the operator's
//! `(has_weight, has_accuracy)` shape.

use crate::error::Error;

/// The numeric input types the aggregate is registered for.
pub const INPUT_TYPES: [&str; 6] = [
    "tinyint", "smallint", "integer", "bigint", "real", "double",
];

/// One registered signature of the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregateSignature {
    pub return_type: String,
    pub intermediate_type: String,
    pub argument_types: Vec<String>,
}

/// The intermediate row type for a given input type.
pub fn intermediate_type(input_type: &str) -> String {
    format!(
        "row(array(double), boolean, double, integer, bigint, {0}, {0}, array({0}), array(integer))",
        input_type
    )
}

/// Enumerates all registered signatures: each input type crossed with the
/// percentile cardinalities and the optional weight and accuracy arguments,
/// eight signatures per input type.
pub fn signatures() -> Vec<AggregateSignature> {
    let mut signatures = Vec::with_capacity(INPUT_TYPES.len() * 8);
    for input_type in INPUT_TYPES {
        add_signatures(input_type, "double", input_type.to_string(), &mut signatures);
        add_signatures(
            input_type,
            "array(double)",
            format!("array({input_type})"),
            &mut signatures,
        );
    }
    signatures
}

fn add_signatures(
    input_type: &str,
    percentile_type: &str,
    return_type: String,
    signatures: &mut Vec<AggregateSignature>,
) {
    let intermediate = intermediate_type(input_type);
    let argument_lists = [
        vec![input_type, percentile_type],
        vec![input_type, "bigint", percentile_type],
        vec![input_type, percentile_type, "double"],
        vec![input_type, "bigint", percentile_type, "double"],
    ];
    for arguments in argument_lists {
        signatures.push(AggregateSignature {
            return_type: return_type.clone(),
            intermediate_type: intermediate.clone(),
            argument_types: arguments.into_iter().map(str::to_string).collect(),
        });
    }
}

/// Derives `(has_weight, has_accuracy)` from raw argument types, raising
/// the user errors for malformed calls.
pub fn resolve_arguments(argument_types: &[&str]) -> Result<(bool, bool), Error> {
    let has_weight = argument_types.len() >= 2 && argument_types[1] == "bigint";
    let has_accuracy = argument_types.len() == if has_weight { 4 } else { 3 };
    let expected = 2 + usize::from(has_weight) + usize::from(has_accuracy);
    if argument_types.len() != expected {
        return Err(Error::invalid_argument(
            "wrong number of arguments passed to approx_percentile",
        )
        .with_context("arguments", argument_types.len()));
    }
    if has_accuracy && argument_types[argument_types.len() - 1] != "double" {
        return Err(Error::invalid_argument(
            "the accuracy argument of approx_percentile must be double",
        ));
    }
    let percentile = argument_types[argument_types.len() - 1 - usize::from(has_accuracy)];
    if percentile != "double" && percentile != "array(double)" {
        return Err(Error::invalid_argument(
            "the percentile argument of approx_percentile must be double or array(double)",
        )
        .with_context("got", percentile));
    }
    Ok((has_weight, has_accuracy))
}
