//! Core data model: the gap buffer, the segments that hold documents, and the
//! operations that only need a buffer (selection and search).

pub mod document;
pub mod error;
pub mod gap_buffer;
pub mod search;
pub mod segment;
pub mod selection;
