//! Domain types for recipients, diagnostic events, lots and drafts.

mod diagnostic;
mod draft;
mod lot;
mod recipient;

pub use diagnostic::*;
pub use draft::*;
pub use lot::*;
pub use recipient::*;
