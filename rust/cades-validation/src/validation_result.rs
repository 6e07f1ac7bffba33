// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Stage result types.
//!
//! Each pipeline stage reports a structured result rather than raising. This keeps
//! the pipeline resilient and gives callers enough detail for diagnostics
//! (message + error code per finding).

use std::collections::BTreeMap;

use serde::Serialize;

use crate::error::VerificationError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationFailure {
    /// Human-readable explanation of the failure.
    pub message: String,
    /// Machine-readable error code.
    pub error_code: Option<String>,
}

impl From<&VerificationError> for ValidationFailure {
    fn from(value: &VerificationError) -> Self {
        Self {
            message: value.to_string(),
            error_code: Some(value.kind().code().to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub is_valid: bool,
    /// Pipeline stage that produced this result.
    pub stage_name: String,
    pub failures: Vec<ValidationFailure>,
    pub warnings: Vec<ValidationFailure>,
    pub metadata: BTreeMap<String, String>,
}

impl ValidationResult {
    /// Builds a stage result from the fatal findings and warnings the stage produced.
    pub fn from_findings(
        stage_name: impl Into<String>,
        fatal: &[VerificationError],
        warnings: &[VerificationError],
    ) -> Self {
        Self {
            is_valid: fatal.is_empty(),
            stage_name: stage_name.into(),
            failures: fatal.iter().map(ValidationFailure::from).collect(),
            warnings: warnings.iter().map(ValidationFailure::from).collect(),
            metadata: BTreeMap::new(),
        }
    }
}
