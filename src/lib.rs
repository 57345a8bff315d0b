//! Reconstructs GPU operational lifetimes from a sparse, periodic
//! physical-inventory log: raw (serial, location, insert, remove)
//! observations in, non-overlapping life intervals per unit and per slot
//! out, with inventory-induced conflicts resolved deterministically and
//! every retained interval's ending classified or right-censored.

pub mod config;
pub mod reconcile;
pub mod scan;
pub mod table;
