use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// Physical slot grammar: `c<COL>-<ROW>c<CAGE>s<SLOT>n<NODE>`.
/// Columns and rows run 0-99, cages 0-2, slots 0-7, nodes 0-3.
static SLOT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^c(\d{1,2})-(\d{1,2})c([0-2])s([0-7])n([0-3])$").expect("slot pattern compiles")
});

/// Unit serial numbers are exactly 13 ASCII digits.
static UNIT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{13}$").expect("unit pattern compiles"));

/// A parsed physical slot address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotAddress {
    pub column: u8,
    pub row: u8,
    pub cage: u8,
    pub slot: u8,
    pub node: u8,
}

impl SlotAddress {
    /// Parse a raw slot identifier. Returns None when the string does not
    /// match the grammar; callers reject the record in that case.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = SLOT_RE.captures(raw.trim())?;
        Some(Self {
            column: caps[1].parse().ok()?,
            row: caps[2].parse().ok()?,
            cage: caps[3].parse().ok()?,
            slot: caps[4].parse().ok()?,
            node: caps[5].parse().ok()?,
        })
    }
}

impl fmt::Display for SlotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "c{}-{}c{}s{}n{}",
            self.column, self.row, self.cage, self.slot, self.node
        )
    }
}

/// True when the trimmed string is a well-formed slot address.
pub fn is_valid_slot_id(raw: &str) -> bool {
    SLOT_RE.is_match(raw.trim())
}

/// True when the trimmed string is a well-formed 13-digit unit serial.
pub fn is_valid_unit_id(raw: &str) -> bool {
    UNIT_RE.is_match(raw.trim())
}
