use serde::Serialize;

/// Receiver-side progress through a transfer.
///
/// Observability only: completion is decided by frame count, never by
/// inspecting `missing`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanProgress {
    /// Distinct frame indices stored so far.
    pub stored: usize,
    /// Expected frame count, once a metadata frame has been seen.
    pub total: Option<usize>,
    /// Index of the most recently accepted frame.
    pub last_index: Option<usize>,
    /// Indices not yet stored, ascending. Empty while `total` is unknown.
    pub missing: Vec<usize>,
}

impl ScanProgress {
    /// Returns progress as a whole percentage (0-100), truncated.
    pub fn percentage(&self) -> u8 {
        match self.total {
            Some(total) if total > 0 => (self.stored.min(total) * 100 / total) as u8,
            _ => 0,
        }
    }
}
