//! Dependency-ordered emission of argument fragments.
//!
//! Fragments are placed in passes: every fragment whose dependencies are
//! already placed is appended, in declaration order, until none remain. A
//! pass that places nothing means the remaining fragments form or depend
//! on a cycle; they are appended in declaration order and reported.

use petgraph::algo::kosaraju_scc;
use petgraph::graph::DiGraph;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

/// Generated code attached to one argument.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Fragment {
    /// The argument name.
    pub name: String,
    /// Code emitted before the native call.
    pub enter: String,
    /// Code emitted after the native call; empty unless the fragment splits.
    pub exit: String,
    /// The call-site expression, or `None` if the argument is not passed.
    pub use_expr: Option<String>,
    /// Fragments that must be entered first.
    pub dependencies: Vec<String>,
}

impl Fragment {
    /// A fragment with no code.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the pre-call half.
    #[must_use]
    pub fn enter(mut self, code: impl Into<String>) -> Self {
        self.enter = code.into();
        self
    }

    /// Set the post-call half.
    #[must_use]
    pub fn exit(mut self, code: impl Into<String>) -> Self {
        self.exit = code.into();
        self
    }

    /// Set the call-site expression.
    #[must_use]
    pub fn use_expr(mut self, expr: impl Into<String>) -> Self {
        self.use_expr = Some(expr.into());
        self
    }

    /// Add dependencies.
    #[must_use]
    pub fn depends_on<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.dependencies.extend(names.into_iter().map(Into::into));
        self
    }

    /// True if the fragment has a post-call half.
    #[must_use]
    pub fn is_split(&self) -> bool {
        !self.exit.is_empty()
    }
}

/// The result of sequencing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Ordering {
    /// Indices into the fragment list, in emission order.
    pub order: Vec<usize>,
    /// Fragments that could not be ordered, in declaration order.
    pub unresolved: Vec<String>,
    /// The cycles among the unresolved fragments.
    pub cycles: Vec<Vec<String>>,
}

impl Ordering {
    /// True if the fallback order had to be used.
    #[must_use]
    pub fn has_cycle(&self) -> bool {
        !self.unresolved.is_empty()
    }
}

/// Order `fragments` so every fragment follows its dependencies.
///
/// Dependencies naming no fragment are treated as satisfied.
#[must_use]
pub fn sequence(fragments: &[Fragment]) -> Ordering {
    let index: FxHashMap<&str, usize> = fragments
        .iter()
        .enumerate()
        .map(|(i, f)| (f.name.as_str(), i))
        .collect();
    let deps: Vec<Vec<usize>> = fragments
        .iter()
        .map(|f| {
            f.dependencies
                .iter()
                .filter_map(|d| index.get(d.as_str()).copied())
                .collect()
        })
        .collect();

    let mut placed = vec![false; fragments.len()];
    let mut order = Vec::with_capacity(fragments.len());

    while order.len() < fragments.len() {
        let before = order.len();
        for i in 0..fragments.len() {
            if !placed[i] && deps[i].iter().all(|&d| placed[d]) {
                placed[i] = true;
                order.push(i);
            }
        }
        if order.len() == before {
            break;
        }
    }

    if order.len() == fragments.len() {
        return Ordering {
            order,
            ..Ordering::default()
        };
    }

    let residual: Vec<usize> = (0..fragments.len()).filter(|&i| !placed[i]).collect();
    let cycles = find_cycles(fragments, &deps, &residual);
    let unresolved: Vec<String> = residual.iter().map(|&i| fragments[i].name.clone()).collect();
    debug!(
        unresolved = %unresolved.join(", "),
        "dependency cycle between fragments, using declaration order"
    );
    order.extend(residual);

    Ordering {
        order,
        unresolved,
        cycles,
    }
}

/// Strongly connected components of the residual graph that are cycles.
fn find_cycles(fragments: &[Fragment], deps: &[Vec<usize>], residual: &[usize]) -> Vec<Vec<String>> {
    let mut graph: DiGraph<usize, ()> = DiGraph::new();
    let nodes: FxHashMap<usize, _> = residual.iter().map(|&i| (i, graph.add_node(i))).collect();
    let mut self_loops = FxHashSet::default();

    for &i in residual {
        for &d in &deps[i] {
            if d == i {
                self_loops.insert(i);
            } else if let Some(&to) = nodes.get(&d) {
                graph.add_edge(nodes[&i], to, ());
            }
        }
    }

    let mut cycles: Vec<Vec<usize>> = kosaraju_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || self_loops.contains(&graph[scc[0]]))
        .map(|scc| {
            let mut members: Vec<usize> = scc.iter().map(|&n| graph[n]).collect();
            members.sort_unstable();
            members
        })
        .collect();
    cycles.sort();

    cycles
        .into_iter()
        .map(|members| members.into_iter().map(|i| fragments[i].name.clone()).collect())
        .collect()
}

/// Code emitted around the native call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Emission {
    /// Enter halves, in sequence order.
    pub enter: Vec<String>,
    /// Exit halves, in reverse sequence order so blocks nest.
    pub exit: Vec<String>,
}

/// Split fragments into pre-call and post-call code.
///
/// Empty halves are skipped.
#[must_use]
pub fn emit(fragments: &[Fragment], order: &[usize]) -> Emission {
    let enter = order
        .iter()
        .map(|&i| &fragments[i].enter)
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    let exit = order
        .iter()
        .rev()
        .map(|&i| &fragments[i].exit)
        .filter(|s| !s.is_empty())
        .cloned()
        .collect();
    Emission { enter, exit }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn names(fragments: &[Fragment], ordering: &Ordering) -> Vec<String> {
        ordering
            .order
            .iter()
            .map(|&i| fragments[i].name.clone())
            .collect()
    }

    #[test]
    fn test_chain_in_any_input_order() {
        let a = Fragment::new("a");
        let b = Fragment::new("b").depends_on(["a"]);
        let c = Fragment::new("c").depends_on(["b"]);

        for frags in [
            vec![a.clone(), b.clone(), c.clone()],
            vec![c.clone(), b.clone(), a.clone()],
            vec![b.clone(), c.clone(), a.clone()],
        ] {
            let ordering = sequence(&frags);
            assert!(!ordering.has_cycle());
            assert_eq!(names(&frags, &ordering), vec!["a", "b", "c"]);
        }
    }

    #[test]
    fn test_unknown_dependency_is_satisfied() {
        let frags = vec![Fragment::new("a").depends_on(["nowhere"]), Fragment::new("b")];
        let ordering = sequence(&frags);
        assert_eq!(names(&frags, &ordering), vec!["a", "b"]);
    }

    #[test]
    fn test_cycle_falls_back_to_declaration_order() {
        let frags = vec![
            Fragment::new("x"),
            Fragment::new("a").depends_on(["b"]),
            Fragment::new("b").depends_on(["a"]),
            Fragment::new("c").depends_on(["a"]),
        ];
        let ordering = sequence(&frags);
        assert!(ordering.has_cycle());
        assert_eq!(names(&frags, &ordering), vec!["x", "a", "b", "c"]);
        assert_eq!(ordering.unresolved, vec!["a", "b", "c"]);
        assert_eq!(ordering.cycles, vec![vec!["a".to_string(), "b".to_string()]]);
    }

    #[test]
    fn test_self_dependency_is_a_cycle() {
        let frags = vec![Fragment::new("a").depends_on(["a"])];
        let ordering = sequence(&frags);
        assert_eq!(ordering.order, vec![0]);
        assert_eq!(ordering.cycles, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn test_emit_nests_exits() {
        let frags = vec![
            Fragment::new("x").enter("open x {").exit("} close x"),
            Fragment::new("n").enter("n = 1;").depends_on(["x"]),
            Fragment::new("y").enter("open y {").exit("} close y"),
        ];
        let ordering = sequence(&frags);
        let emitted = emit(&frags, &ordering.order);
        assert_eq!(emitted.enter, vec!["open x {", "n = 1;", "open y {"]);
        assert_eq!(emitted.exit, vec!["} close y", "} close x"]);
    }

    proptest! {
        #[test]
        fn prop_dependencies_precede(
            edges in proptest::collection::vec((0usize..8, 0usize..8), 0..16),
            len in 1usize..8,
        ) {
            // Only backward edges, so the graph is acyclic.
            let mut frags: Vec<Fragment> = (0..len).map(|i| Fragment::new(format!("f{i}"))).collect();
            for (a, b) in edges {
                let (a, b) = (a % len, b % len);
                if a > b {
                    frags[a].dependencies.push(format!("f{b}"));
                }
            }
            // Reverse declaration order so sorting has work to do.
            frags.reverse();

            let ordering = sequence(&frags);
            prop_assert!(!ordering.has_cycle());
            prop_assert_eq!(ordering.order.len(), frags.len());
            let position: FxHashMap<&str, usize> = ordering
                .order
                .iter()
                .enumerate()
                .map(|(pos, &i)| (frags[i].name.as_str(), pos))
                .collect();
            for f in &frags {
                for d in &f.dependencies {
                    prop_assert!(position[d.as_str()] < position[f.name.as_str()]);
                }
            }
        }

        #[test]
        fn prop_split_halves_surround_call(
            splits in proptest::collection::vec(any::<bool>(), 1..8),
        ) {
            let frags: Vec<Fragment> = splits
                .iter()
                .enumerate()
                .map(|(i, &split)| {
                    let f = Fragment::new(format!("f{i}")).enter(format!("enter {i}"));
                    if split { f.exit(format!("exit {i}")) } else { f }
                })
                .collect();
            let ordering = sequence(&frags);
            let emitted = emit(&frags, &ordering.order);
            prop_assert_eq!(emitted.enter.len(), frags.len());
            prop_assert_eq!(emitted.exit.len(), splits.iter().filter(|s| **s).count());
            // Each split fragment's exit appears after the call in nesting order.
            let opened: Vec<String> = ordering
                .order
                .iter()
                .filter(|&&i| frags[i].is_split())
                .map(|&i| format!("exit {i}"))
                .rev()
                .collect();
            prop_assert_eq!(emitted.exit, opened);
        }
    }
}
