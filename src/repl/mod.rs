//! Line-editing support for the demo shell. Only history file
//! persistence is carried here — cursor-positioning and rendering
//! machinery belongs to a complete interactive SQL shell, out of this
//! crate's core scope.

pub mod history;
