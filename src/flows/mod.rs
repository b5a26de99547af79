//! The two AI flows.
//!
//! [`HighlightFlow`] never fails outward: anything that goes wrong turns into
//! an empty selection. [`TransitionFlow`] returns a [`FlowError`] when a model
//! call fails, but tolerates a missing description or image.

mod highlight;
mod transition;

pub use highlight::{HighlightFlow, HighlightRequest, HighlightResult, enforce_subset};
pub use transition::{TransitionFlow, TransitionRequest, TransitionResult};

use serde::Serialize;
use serde_json::Value;

use crate::error::FlowError;
use crate::schema::{Schema, SchemaError};

/// Validates a typed request against its schema before any model call.
fn check_input<T: Serialize>(schema: &Schema, request: &T) -> Result<(), FlowError> {
    let value = serde_json::to_value(request)
        .map_err(|_| FlowError::InvalidInput(SchemaError::not_an_object()))?;
    schema.validate(&value).map(|_| ()).map_err(FlowError::InvalidInput)
}

/// Pulls the structured output out of a response and checks it.
fn parse_output<T: serde::de::DeserializeOwned>(
    schema: &Schema,
    output: Option<&Value>,
) -> Result<T, FlowError> {
    let output = output.ok_or_else(|| FlowError::OutputShape(SchemaError::not_an_object()))?;
    schema.parse(output).map_err(FlowError::OutputShape)
}
