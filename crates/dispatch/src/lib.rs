//! The multimethod dispatch engine: methods, definitions, bundles, and the
//! lazily-expanded dispatch tree that picks a definition for a send
//! (spec.md §4.3).

mod error;
mod method;
mod tree;

pub use error::DispatchError;
pub use method::{Bundle, Definition, Method};
