//! segedit: a terminal screen editor over a segmented gap-buffer engine.
//!
//! The engine keeps every document in a fixed-size segment of one arena. The
//! segment holds a control block followed by a gap buffer; long files spill
//! over into a chain of segments. The view layer keeps a character grid in
//! step with the active document by patching only the rows an edit touches.

pub mod config;
pub mod input;
pub mod model;
pub mod services;
pub mod session;
pub mod view;
