pub use wsgate_core::prelude::*;

// vim: ts=4
