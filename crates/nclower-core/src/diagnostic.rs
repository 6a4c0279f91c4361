//! Diagnostics for rewrites the backend cannot express.

use std::fmt;

/// A non-fatal diagnostic recorded when a rewrite leaves a node unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Name of the pass that rejected the node.
    pub pass: String,

    /// Name of the node that was left unchanged.
    pub node: String,

    /// Failure kind (e.g. "UnsupportedRank").
    pub kind: &'static str,

    /// Human-readable description including the offending values.
    pub message: String,
}

impl Diagnostic {
    pub fn new(
        pass: impl Into<String>,
        node: impl Into<String>,
        kind: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self {
            pass: pass.into(),
            node: node.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.pass, self.node, self.kind, self.message
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let diagnostic = Diagnostic::new(
            "permute",
            "op_0",
            "UnsupportedRank",
            "permute 6-rank tensor is not supported",
        );
        assert_eq!(
            diagnostic.to_string(),
            "[permute] op_0 (UnsupportedRank): permute 6-rank tensor is not supported"
        );
    }
}
