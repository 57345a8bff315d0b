//! File adapters at the pipeline's edges. The engine itself only sees
//! in-memory records and tables.

pub mod emit;
pub mod source;
