//! Pass registry.

use crate::pass::RewritePass;

/// Registry of rewrite passes.
///
/// Passes are yielded in priority order; passes with equal priority keep
/// their registration order.
///
/// # Example
///
/// ```ignore
/// let mut registry = PassRegistry::new();
/// registry.register(TensorPermutePass).register(TorchTransposePass);
///
/// for pass in registry.ordered() {
///     // match pass.match_pattern() and call pass.rewrite() per match
/// }
/// ```
#[derive(Default)]
pub struct PassRegistry {
    passes: Vec<Box<dyn RewritePass>>,
}

impl PassRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pass.
    ///
    /// Returns `self` for method chaining.
    pub fn register<P>(&mut self, pass: P) -> &mut Self
    where
        P: RewritePass + 'static,
    {
        self.passes.push(Box::new(pass));
        self
    }

    /// Passes sorted by priority, ties in registration order.
    pub fn ordered(&self) -> Vec<&dyn RewritePass> {
        let mut passes: Vec<&dyn RewritePass> = self.passes.iter().map(|p| p.as_ref()).collect();
        passes.sort_by_key(|p| p.priority());
        passes
    }

    pub fn len(&self) -> usize {
        self.passes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passes.is_empty()
    }
}
