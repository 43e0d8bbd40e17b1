pub use crate::error::{Error, ErrorBody, GwResult};

pub use tracing::{debug, error, info, warn};

// vim: ts=4
