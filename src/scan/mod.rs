//! Raw inventory-scan domain: event vocabulary, identifier grammar,
//! field parsing and record normalization.

pub mod event;
pub mod normalize;
pub mod parse;
pub mod slot;
