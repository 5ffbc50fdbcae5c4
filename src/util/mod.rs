//! Utility functions shared by the projector and the command-line host.
//!
//! - **URL resolution**: origin parsing and absolute-URL construction
//! - **Text processing**: Unicode-aware truncation for terminal columns

mod text;
mod url_resolver;

pub use text::{fit_column, strip_control_chars, truncate_to_width};
pub use url_resolver::{absolutize, has_scheme, parse_origin, OriginError};
