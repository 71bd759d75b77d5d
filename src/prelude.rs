//! Items used throughout the crate: a thin re-export surface over the
//! logging and error handling stack, plus the crate's own error types.

pub use color_eyre::eyre::{bail, ensure, eyre, Context as EyreContext, ContextCompat};
pub use color_eyre::{Report, Result as EyreResult, Section};
pub use tracing::{debug, error, info, trace, warn};

pub use crate::error::{AssignError, Error, NoMatch, Result, SolveError, StoreError};
