//! Email handling: MIME extraction and recipient resolution.

pub mod parser;
pub mod recipient;
pub mod types;

pub use parser::extract;
pub use recipient::resolve;
pub use types::{CanonicalAddress, ParsedEmail, RawEmailObject};
