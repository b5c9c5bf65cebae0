//! View layer
//!
//! The synchronizer keeps a character grid in step with the active document;
//! the surface is where it paints; the prompt drives the status line.

pub mod prompt;
pub mod surface;
pub mod synchronizer;
