//! Workflow pipelines orchestrating domain and adapter components.

pub mod sign;
