//! Two-tier product extraction: embedded JSON-LD first, selector chains
//! against the live DOM when a page carries no Product metadata.

pub mod jsonld;
pub mod selectors;

pub use jsonld::extract_structured;
pub use selectors::{extract_with_selectors, first_text};
