//! Lowering driver.

use crate::{LowerError, Result, default_registry};
use nclower_core::{
    Diagnostic, Graph, LowerOptions, NOOP_TYPE, PassRegistry, Rewrite, RewritePass,
};
use nclower_pattern::{find_matches, parse_template};
use tracing::{debug, warn};

/// Summary of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LowerReport {
    /// Nodes relabeled to a backend type.
    pub lowered: usize,

    /// Nodes relabeled to [`NOOP_TYPE`].
    pub noops: usize,

    /// Rejected matches, in the order they were found.
    pub diagnostics: Vec<Diagnostic>,
}

impl LowerReport {
    /// Whether every match was lowered or turned into a no-op.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Runs registered passes over a graph.
///
/// Passes run in priority order. For every match of a pass's template the
/// matched node is handed to the rewrite with its parameters cleared, and the
/// outcome is committed:
/// - `Lowered`: the node takes the pass's backend type and a fresh
///   `<name_str>_<n>` name
/// - `Noop`: the node becomes [`NOOP_TYPE`] without parameters
/// - `Rejected`: the node is restored as matched and a [`Diagnostic`] is
///   recorded
pub struct LoweringPipeline {
    registry: PassRegistry,
    options: LowerOptions,
}

impl LoweringPipeline {
    /// Create a pipeline with the built-in permute passes.
    pub fn new(options: LowerOptions) -> Self {
        Self::with_registry(default_registry(), options)
    }

    /// Create a pipeline over a custom registry.
    pub fn with_registry(registry: PassRegistry, options: LowerOptions) -> Self {
        Self { registry, options }
    }

    /// Add a pass to the pipeline.
    ///
    /// Returns a mutable reference to self for method chaining.
    pub fn add_pass(&mut self, pass: impl RewritePass + 'static) -> &mut Self {
        self.registry.register(pass);
        self
    }

    pub fn registry(&self) -> &PassRegistry {
        &self.registry
    }

    /// Run every pass once over `graph`.
    ///
    /// # Errors
    ///
    /// Returns an error if a registered template does not parse or the graph
    /// is inconsistent. Rejected matches do not fail the run.
    #[tracing::instrument(skip_all, fields(num_nodes = graph.node_count(), num_passes = self.registry.len()))]
    pub fn run(&self, graph: &mut Graph) -> Result<LowerReport> {
        let mut report = LowerReport::default();

        for pass in self.registry.ordered() {
            let _span = tracing::debug_span!(
                "pass",
                name = pass.name_str(),
                priority = pass.priority()
            )
            .entered();
            self.run_pass(pass, graph, &mut report)?;
        }

        debug!(
            lowered = report.lowered,
            noops = report.noops,
            rejected = report.diagnostics.len(),
            "lowering finished"
        );
        Ok(report)
    }

    fn run_pass(
        &self,
        pass: &dyn RewritePass,
        graph: &mut Graph,
        report: &mut LowerReport,
    ) -> Result<()> {
        let template =
            parse_template(pass.match_pattern()).map_err(|source| LowerError::Template {
                pass: pass.name_str().to_string(),
                source,
            })?;

        let matches = find_matches(graph, &template);
        debug!(matches = matches.len(), "template matched");

        let mut counter = 0;
        for m in matches {
            let anchor = m.anchor();

            let (outcome, original) = {
                let (node, inputs) = graph.node_with_inputs_mut(anchor)?;
                let original = node.clone();
                node.params.clear();
                let outcome = pass.rewrite(node, &inputs, &m.captures, &self.options);
                (outcome, original)
            };

            match outcome {
                Rewrite::Lowered => {
                    let name = fresh_name(graph, pass.name_str(), &mut counter);
                    debug!(node = %original.name, renamed = %name, "lowered");

                    let node = graph.node_mut(anchor)?;
                    node.op_type = pass.type_str().to_string();
                    node.name = name;
                    report.lowered += 1;
                }
                Rewrite::Noop => {
                    debug!(node = %original.name, "identity, marked as no-op");

                    let node = graph.node_mut(anchor)?;
                    node.op_type = NOOP_TYPE.to_string();
                    node.params.clear();
                    report.noops += 1;
                }
                Rewrite::Rejected { kind, message } => {
                    let diagnostic = Diagnostic::new(pass.name_str(), &original.name, kind, message);
                    warn!("{diagnostic}");

                    *graph.node_mut(anchor)? = original;
                    report.diagnostics.push(diagnostic);
                }
            }
        }

        Ok(())
    }
}

/// Next `<stem>_<n>` not already used by a node in `graph`.
fn fresh_name(graph: &Graph, stem: &str, counter: &mut usize) -> String {
    loop {
        let name = format!("{stem}_{counter}");
        *counter += 1;
        if graph.find_node_by_name(&name).is_err() {
            return name;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nclower_core::{Captures, Node, Tensor};
    use nclower_pattern::parse_graph;

    struct BrokenPass;

    impl RewritePass for BrokenPass {
        fn match_pattern(&self) -> &str {
            "not a template"
        }
        fn type_str(&self) -> &str {
            "Broken"
        }
        fn name_str(&self) -> &str {
            "broken"
        }
        fn priority(&self) -> i32 {
            0
        }
        fn rewrite(&self, _: &mut Node, _: &[&Tensor], _: &Captures, _: &LowerOptions) -> Rewrite {
            Rewrite::Lowered
        }
    }

    #[test]
    fn test_fresh_name_skips_taken_names() {
        let graph = parse_graph(
            "7767517
1 1
pnnx.Input permute_0 0 1 x
",
        )
        .unwrap();

        let mut counter = 0;
        assert_eq!(fresh_name(&graph, "permute", &mut counter), "permute_1");
        assert_eq!(fresh_name(&graph, "permute", &mut counter), "permute_2");
    }

    #[test]
    fn test_bad_template_fails_run() {
        let mut pipeline = LoweringPipeline::with_registry(PassRegistry::new(), LowerOptions::new());
        pipeline.add_pass(BrokenPass);

        let mut graph = Graph::new();
        let err = pipeline.run(&mut graph).unwrap_err();
        assert!(matches!(err, LowerError::Template { ref pass, .. } if pass == "broken"));
    }

    #[test]
    fn test_default_pipeline_has_both_passes() {
        let pipeline = LoweringPipeline::new(LowerOptions::new());
        let names: Vec<_> = pipeline
            .registry()
            .ordered()
            .iter()
            .map(|p| p.name_str().to_string())
            .collect();
        assert_eq!(names, vec!["permute", "transpose"]);
    }
}
