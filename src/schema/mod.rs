//! Input document schema
//!
//! This module defines the JSON records accepted for the five input documents
//! (glucose, pump history, ISF, basal profile and profile) and the adapter that
//! turns them into pipeline types. Validation is limited to what the pipeline
//! needs to run.

mod adapter;
mod records;

pub use adapter::*;
pub use records::*;
