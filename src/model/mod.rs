//! Core data model types: attachment patterns and entries, size budgets, content types.

pub mod attachment;
pub mod budget;
pub mod content_type;
