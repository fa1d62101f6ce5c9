//! Domain-specific assertion macros for termed harnesses.
//!
//! These wrap `pretty_assertions` and add context-rich failure messages that
//! make it clear *which* specification or query disagreed and *how*.

// ---------------------------------------------------------------------------
// Specification assertions
// ---------------------------------------------------------------------------

/// Assert that an index search for `spec` returns exactly the corpus nodes
/// for which `spec.test` holds, in key order.
///
/// ```rust
/// assert_index_agrees!(index, corpus, spec);
/// ```
#[macro_export]
macro_rules! assert_index_agrees {
    ($index:expr, $corpus:expr, $spec:expr) => {{
        let spec: &termed::NodeSpecification = &$spec;
        let mut expected: Vec<termed::NodeId> = $corpus
            .iter()
            .filter(|n: &&termed::Node| spec.test(&n.node_id(), n))
            .map(termed::Node::node_id)
            .collect();
        expected.sort();
        let query = spec
            .to_index_query()
            .unwrap_or_else(|e| panic!("assert_index_agrees! failed: {} does not compile: {}", spec, e));
        let mut actual: Vec<termed::NodeId> = $index
            .keys(&query, &[], None)
            .expect("search")
            .collect::<Result<_, _>>()
            .expect("decode keys");
        actual.sort();
        if actual != expected {
            panic!(
                "assert_index_agrees! failed:\n  spec:     {}\n  query:    {}\n  expected: {:?}\n  actual:   {:?}",
                spec, query, expected, actual
            );
        }
    }};
}

/// Assert that a specification has no rendering for an engine.
#[macro_export]
macro_rules! assert_unsupported {
    ($result:expr) => {{
        match $result {
            Err(termed::CompileError::Unsupported { .. }) => {}
            Ok(other) => panic!("assert_unsupported! failed: compiled to {}", other),
        }
    }};
}

// ---------------------------------------------------------------------------
// Hit assertions
// ---------------------------------------------------------------------------

/// Assert the codes of a result stream, in order.
///
/// ```rust
/// assert_codes!(index.search(&query, &[], None)?, ["cat", "dog"]);
/// ```
#[macro_export]
macro_rules! assert_codes {
    ($hits:expr, [$($code:expr),* $(,)?]) => {{
        let nodes: Vec<termed::Node> = $hits.collect::<Result<_, _>>().expect("decode hits");
        let actual: Vec<&str> = nodes.iter().map(|n| n.code.as_deref().unwrap_or("<none>")).collect();
        let expected: Vec<&str> = vec![$($code),*];
        pretty_assertions::assert_eq!(actual, expected, "assert_codes! failed: result codes differ");
    }};
}
