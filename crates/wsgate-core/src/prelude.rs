pub use crate::app::{App, AppState};
pub use wsgate_types::prelude::*;

// vim: ts=4
