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

//! Error types for the approximate-percentile aggregation core.
//!
//! User errors (invalid arguments, malformed intermediate state, bad
//! configuration) surface as [`Error`] values and halt the query. Internal
//! invariant violations are bug indicators and abort via assertions instead.

use std::fmt;

/// ErrorKind is all kinds of [`Error`] this crate reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// An aggregate function argument violates its contract.
    InvalidArgument,
    /// A configuration property is invalid.
    ConfigInvalid,
    /// An intermediate sketch state is malformed.
    MalformedSketchData,
}

impl ErrorKind {
    /// Convert this error kind instance into static str.
    pub const fn into_static(self) -> &'static str {
        match self {
            ErrorKind::InvalidArgument => "InvalidArgument",
            ErrorKind::ConfigInvalid => "ConfigInvalid",
            ErrorKind::MalformedSketchData => "MalformedSketchData",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.into_static())
    }
}

/// Error is the error struct returned by all fallible operations of this
/// crate.
pub struct Error {
    kind: ErrorKind,
    message: String,
    context: Vec<(&'static str, String)>,
    source: Option<anyhow::Error>,
}

impl Error {
    /// Create a new Error with error kind and message.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            context: Vec::default(),
            source: None,
        }
    }

    /// Create a user error for an invalid aggregate argument.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    /// Create an error for malformed intermediate sketch state.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedSketchData, message)
    }

    /// Create an error for an invalid configuration property.
    pub fn config_invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ConfigInvalid, message)
    }

    /// Create an error for a truncated serialized sketch.
    pub fn insufficient_data(field: &'static str) -> Self {
        Self::new(ErrorKind::MalformedSketchData, "insufficient data")
            .with_context("field", field)
    }

    /// Add more context in error.
    pub fn with_context(mut self, key: &'static str, value: impl ToString) -> Self {
        self.context.push((key, value.to_string()));
        self
    }

    /// Set source for error.
    ///
    /// # Panics
    ///
    /// Panics if the source has been set.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::error::Error as _;
    /// use approx_percentile::error::{Error, ErrorKind};
    ///
    /// let mut error = Error::new(ErrorKind::MalformedSketchData, "failed to read sketch state");
    /// assert!(error.source().is_none());
    /// error = error.set_source(std::io::Error::new(std::io::ErrorKind::Other, "IO error"));
    /// assert!(error.source().is_some());
    /// ```
    pub fn set_source(mut self, src: impl Into<anyhow::Error>) -> Self {
        assert!(self.source.is_none(), "the source error has been set");
        self.source = Some(src.into());
        self
    }

    /// Return error's kind.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Return error's message.
    pub fn message(&self) -> &str {
        self.message.as_str()
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // If alternate has been specified, we will print like Debug.
        if f.alternate() {
            let mut de = f.debug_struct("Error");
            de.field("kind", &self.kind);
            de.field("message", &self.message);
            de.field("context", &self.context);
            de.field("source", &self.source);
            return de.finish();
        }

        write!(f, "{}", self.kind)?;
        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }
        writeln!(f)?;

        if !self.context.is_empty() {
            writeln!(f)?;
            writeln!(f, "Context:")?;
            for (k, v) in self.context.iter() {
                writeln!(f, "   {k}: {v}")?;
            }
        }

        if let Some(source) = &self.source {
            writeln!(f)?;
            writeln!(f, "Source:")?;
            writeln!(f, "   {source:#}")?;
        }

        Ok(())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;

        if !self.context.is_empty() {
            write!(f, ", context: {{ ")?;
            write!(
                f,
                "{}",
                self.context
                    .iter()
                    .map(|(k, v)| format!("{k}: {v}"))
                    .collect::<Vec<_>>()
                    .join(", ")
            )?;
            write!(f, " }}")?;
        }

        if !self.message.is_empty() {
            write!(f, " => {}", self.message)?;
        }

        if let Some(source) = &self.source {
            write!(f, ", source: {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|v| v.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_context() {
        let error = Error::invalid_argument("weight must be in range [1, 1152921504606846975]")
            .with_context("weight", 0);
        let rendered = format!("{error}");
        assert!(rendered.contains("InvalidArgument"));
        assert!(rendered.contains("weight: 0"));
    }

    #[test]
    fn test_kind_round_trip() {
        let error = Error::malformed("levels array must be non-decreasing");
        assert_eq!(error.kind(), ErrorKind::MalformedSketchData);
        assert_eq!(error.message(), "levels array must be non-decreasing");
    }
}
