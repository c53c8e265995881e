//! Core domain building blocks shared by every aggregate.

pub mod error;
pub(crate) mod id;
pub mod json;
