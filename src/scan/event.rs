use std::fmt;

/// EventKind classifies a normalized inventory record by the shape of its
/// `(insert, remove)` field pair. Classification is total over accepted
/// records and mutually exclusive; records that fit none of these variants
/// are rejected during normalization, never silently reinterpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Both timestamps present, insert strictly before remove.
    Life,
    /// Both timestamps present and equal. No measurable service time.
    ZeroLife,
    /// One field carried a failure tag, the other a timestamp.
    Failure,
    /// One field carried a removal tag, the other a timestamp.
    Removed,
    /// Only the remove timestamp present. Occupancy start never recorded.
    OpenStart,
    /// Only the insert timestamp present. Occupancy end never recorded.
    OpenEnd,
}

impl EventKind {
    /// Returns the canonical label used in logs and output tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Life => "life",
            Self::ZeroLife => "zero_life",
            Self::Failure => "failure",
            Self::Removed => "removed",
            Self::OpenStart => "open_start",
            Self::OpenEnd => "open_end",
        }
    }

    /// Convert from the canonical label.
    pub fn from_str(name: &str) -> Option<Self> {
        match name {
            "life" => Some(Self::Life),
            "zero_life" => Some(Self::ZeroLife),
            "failure" => Some(Self::Failure),
            "removed" => Some(Self::Removed),
            "open_start" => Some(Self::OpenStart),
            "open_end" => Some(Self::OpenEnd),
            _ => None,
        }
    }

    /// Return all kinds in classification order.
    pub fn all() -> &'static [Self] {
        &[
            Self::Life,
            Self::ZeroLife,
            Self::Failure,
            Self::Removed,
            Self::OpenStart,
            Self::OpenEnd,
        ]
    }

    /// True for kinds that become event markers rather than intervals.
    pub const fn is_marker(self) -> bool {
        !matches!(self, Self::Life)
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// EventTag is the canonical form of a non-timestamp value found in a
/// timestamp column of the raw log. The upstream vocabulary is closed;
/// strings outside the synonym table reject the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventTag {
    /// Hardware fault, e.g. an uncorrectable double bit error.
    Failure,
    /// Deliberate removal, e.g. the device dropped off the bus.
    Removed,
}

impl EventTag {
    /// Returns the canonical label used in logs and output tables.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Failure => "failure",
            Self::Removed => "removed",
        }
    }

    /// The event kind a record of this tag classifies as.
    pub const fn kind(self) -> EventKind {
        match self {
            Self::Failure => EventKind::Failure,
            Self::Removed => EventKind::Removed,
        }
    }
}

impl fmt::Display for EventTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map a raw field value onto its canonical tag. Matching is
/// case-insensitive on the trimmed string. Returns None for strings
/// outside the known vocabulary.
pub fn canonicalize_tag(raw: &str) -> Option<EventTag> {
    let lowered = raw.trim().to_ascii_lowercase();
    match lowered.as_str() {
        "dbe" | "double bit error" | "double-bit error" | "hard error" | "hard_error"
        | "failed" => Some(EventTag::Failure),
        "otb" | "off the bus" | "off-the-bus" | "off bus" | "offline" | "removed"
        | "taken offline" | "taken_offline" => Some(EventTag::Removed),
        _ => None,
    }
}
