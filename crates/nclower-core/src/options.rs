//! Options shared by all lowering passes.

/// How an explicit axis-order permutation is written to the backend node.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AxisEncoding {
    /// Write the backend enumeration code under key `"0"`.
    #[default]
    Enumerated,

    /// Write `-1` under key `"0"` followed by the source axis of every output
    /// axis under keys `"1"` through `"R"`.
    Explicit,
}

/// Configuration for a lowering run.
#[derive(Debug, Clone, Default)]
pub struct LowerOptions {
    /// Encoding used by passes that lower an explicit axis list.
    pub axis_encoding: AxisEncoding,
}

impl LowerOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_axis_encoding(mut self, encoding: AxisEncoding) -> Self {
        self.axis_encoding = encoding;
        self
    }
}
