// SPDX-License-Identifier: MIT OR Apache-2.0
//! Evaluation ordering and cycle analysis.
//!
//! The order is built over strongly connected components:
//! components are emitted in dependency order, ties broken by the lowest
//! node insertion index, and the members of a cyclic component are emitted
//! in insertion order. For an acyclic graph this is a plain topological
//! order. For a cyclic one every edge that points backwards in the order is
//! a feedback edge, and the evaluator resolves it to the previous tick.

use crate::graph::{CycleError, Graph};
use crate::node::NodeId;
use indexmap::IndexSet;
use std::collections::{BTreeSet, HashMap, VecDeque};

/// Result of ordering a graph for evaluation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationOrder {
    /// Nodes in evaluation order
    pub nodes: Vec<NodeId>,
    /// Cyclic node sets, each in insertion order
    pub cycles: Vec<Vec<NodeId>>,
}

impl EvaluationOrder {
    /// Whether any feedback loop was found
    pub fn is_acyclic(&self) -> bool {
        self.cycles.is_empty()
    }
}

impl Graph {
    /// Get nodes in topological order, failing if the graph has a cycle
    pub fn topological_order(&self) -> Result<Vec<NodeId>, CycleError> {
        let order = self.evaluation_order(None);
        if order.is_acyclic() {
            Ok(order.nodes)
        } else {
            Err(CycleError { components: order.cycles })
        }
    }

    /// Whether the graph currently has no cycles
    pub fn is_acyclic(&self) -> bool {
        self.evaluation_order(None).is_acyclic()
    }

    /// Nodes from which any of `roots` can be reached, in insertion order
    pub fn reachable_from(&self, roots: &[NodeId]) -> IndexSet<NodeId> {
        let mut upstream: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        for connection in self.connections() {
            upstream.entry(connection.to_node).or_default().push(connection.from_node);
        }

        let mut seen: IndexSet<NodeId> = IndexSet::new();
        let mut queue: VecDeque<NodeId> = roots
            .iter()
            .copied()
            .filter(|id| self.contains_node(*id))
            .collect();
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(sources) = upstream.get(&id) {
                queue.extend(sources.iter().copied());
            }
        }

        // Back to insertion order so ordering stays stable
        self.node_ids().filter(|id| seen.contains(id)).collect()
    }

    /// Compute the evaluation order over the whole graph, or over the
    /// nodes that feed `roots` when given. Never fails; cycles are reported
    /// alongside the order.
    pub fn evaluation_order(&self, roots: Option<&[NodeId]>) -> EvaluationOrder {
        let selected: Vec<NodeId> = match roots {
            Some(roots) => self.reachable_from(roots).into_iter().collect(),
            None => self.node_ids().collect(),
        };
        let index: HashMap<NodeId, usize> = selected
            .iter()
            .enumerate()
            .map(|(i, id)| (*id, i))
            .collect();

        let mut successors: Vec<Vec<usize>> = vec![Vec::new(); selected.len()];
        let mut self_loops = vec![false; selected.len()];
        for connection in self.connections() {
            let (Some(&from), Some(&to)) = (
                index.get(&connection.from_node),
                index.get(&connection.to_node),
            ) else {
                continue;
            };
            if connection.is_self_loop() {
                self_loops[from] = true;
            } else {
                successors[from].push(to);
            }
        }

        let components = Tarjan::run(&successors);

        // Map each node to its component; members sorted so the first one
        // is the component's insertion-order key.
        let mut component_of = vec![0usize; selected.len()];
        let mut members: Vec<Vec<usize>> = components;
        for (c, nodes) in members.iter_mut().enumerate() {
            nodes.sort_unstable();
            for &n in nodes.iter() {
                component_of[n] = c;
            }
        }

        // Kahn over the condensation, smallest insertion index first
        let mut indegree = vec![0usize; members.len()];
        let mut edges: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); members.len()];
        for (from, targets) in successors.iter().enumerate() {
            for &to in targets {
                let (cf, ct) = (component_of[from], component_of[to]);
                if cf != ct && edges[cf].insert(ct) {
                    indegree[ct] += 1;
                }
            }
        }

        let mut ready: BTreeSet<(usize, usize)> = members
            .iter()
            .enumerate()
            .filter(|(c, _)| indegree[*c] == 0)
            .map(|(c, nodes)| (nodes[0], c))
            .collect();

        let mut order = EvaluationOrder::default();
        while let Some((_, c)) = ready.pop_first() {
            let nodes = &members[c];
            if nodes.len() > 1 || self_loops[nodes[0]] {
                order.cycles.push(nodes.iter().map(|&n| selected[n]).collect());
            }
            order.nodes.extend(nodes.iter().map(|&n| selected[n]));

            for &next in &edges[c] {
                indegree[next] -= 1;
                if indegree[next] == 0 {
                    ready.insert((members[next][0], next));
                }
            }
        }

        order
    }
}

/// Tarjan's strongly connected components over an index adjacency list
struct Tarjan<'a> {
    successors: &'a [Vec<usize>],
    index: Vec<Option<usize>>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<Vec<usize>>,
}

impl<'a> Tarjan<'a> {
    fn run(successors: &'a [Vec<usize>]) -> Vec<Vec<usize>> {
        let n = successors.len();
        let mut tarjan = Self {
            successors,
            index: vec![None; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        };
        for v in 0..n {
            if tarjan.index[v].is_none() {
                tarjan.visit(v);
            }
        }
        tarjan.components
    }

    fn enter(&mut self, v: usize) {
        self.index[v] = Some(self.next_index);
        self.lowlink[v] = self.next_index;
        self.next_index += 1;
        self.stack.push(v);
        self.on_stack[v] = true;
    }

    /// Depth-first walk from `root` with an explicit call stack of
    /// `(node, next successor)` frames, so long chains cannot overflow
    fn visit(&mut self, root: usize) {
        let successors = self.successors;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        self.enter(root);

        while let Some(frame) = frames.last_mut() {
            let (v, next) = *frame;
            if let Some(&w) = successors[v].get(next) {
                frame.1 += 1;
                match self.index[w] {
                    None => {
                        self.enter(w);
                        frames.push((w, 0));
                    }
                    Some(w_index) if self.on_stack[w] => {
                        self.lowlink[v] = self.lowlink[v].min(w_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            // All successors done: close v and fold its lowlink into the parent
            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[v]);
            }
            if Some(self.lowlink[v]) == self.index[v] {
                let mut component = Vec::new();
                while let Some(w) = self.stack.pop() {
                    self.on_stack[w] = false;
                    component.push(w);
                    if w == v {
                        break;
                    }
                }
                self.components.push(component);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::relay;
    use crate::node::Node;

    fn graph_with(n: usize) -> (Graph, Vec<NodeId>) {
        let mut graph = Graph::default();
        let ids = (0..n)
            .map(|_| graph.add_node(Node::new(&relay())).unwrap())
            .collect();
        (graph, ids)
    }

    fn position(order: &[NodeId], id: NodeId) -> usize {
        order.iter().position(|n| *n == id).unwrap()
    }

    #[test]
    fn test_sources_come_before_targets() {
        // Inserted backwards: d <- c <- b <- a, plus a -> d
        let (mut graph, ids) = graph_with(4);
        let (d, c, b, a) = (ids[0], ids[1], ids[2], ids[3]);
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "out", c, "in").unwrap();
        graph.connect(c, "out", d, "in").unwrap();
        graph.connect(a, "fired", d, "fire").unwrap();

        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 4);
        for connection in graph.connections() {
            assert!(position(&order, connection.from_node) < position(&order, connection.to_node));
        }
    }

    #[test]
    fn test_unconstrained_nodes_keep_insertion_order() {
        let (graph, ids) = graph_with(3);
        assert_eq!(graph.topological_order().unwrap(), ids);
    }

    #[test]
    fn test_cycle_is_reported_not_fatal() {
        let (mut graph, ids) = graph_with(3);
        let (a, b, c) = (ids[0], ids[1], ids[2]);
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "fired", a, "fire").unwrap();
        graph.connect(b, "out", c, "in").unwrap();

        let order = graph.evaluation_order(None);
        assert_eq!(order.nodes, vec![a, b, c]);
        assert_eq!(order.cycles, vec![vec![a, b]]);

        let err = graph.topological_order().unwrap_err();
        assert_eq!(err.nodes().collect::<Vec<_>>(), vec![a, b]);
        assert!(!graph.is_acyclic());
    }

    #[test]
    fn test_cycle_members_follow_insertion_order() {
        // c is inserted first but sits downstream of the a/b loop
        let (mut graph, ids) = graph_with(3);
        let (c, b, a) = (ids[0], ids[1], ids[2]);
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "fired", a, "fire").unwrap();
        graph.connect(b, "out", c, "in").unwrap();

        let order = graph.evaluation_order(None);
        assert_eq!(order.nodes, vec![b, a, c]);
    }

    #[test]
    fn test_self_loop_counts_as_cycle() {
        let (mut graph, ids) = graph_with(1);
        graph.connect(ids[0], "fired", ids[0], "fire").unwrap();
        assert_eq!(graph.evaluation_order(None).cycles, vec![vec![ids[0]]]);
    }

    #[test]
    fn test_long_chain_does_not_exhaust_the_stack() {
        let (mut graph, ids) = graph_with(50_000);
        for pair in ids.windows(2) {
            graph.connect(pair[0], "out", pair[1], "in").unwrap();
        }
        // Close the chain into one big loop as well
        graph.connect(ids[ids.len() - 1], "fired", ids[0], "fire").unwrap();

        let order = graph.evaluation_order(None);
        assert_eq!(order.nodes, ids);
        assert_eq!(order.cycles.len(), 1);
        assert_eq!(order.cycles[0].len(), ids.len());
    }

    #[test]
    fn test_tarjan_deep_chain() {
        let n = 500_000;
        let successors: Vec<Vec<usize>> = (0..n)
            .map(|i| if i + 1 < n { vec![i + 1] } else { Vec::new() })
            .collect();
        let components = Tarjan::run(&successors);
        assert_eq!(components.len(), n);
        // Sinks close first
        assert_eq!(components[0], vec![n - 1]);
    }

    #[test]
    fn test_reachable_scope_skips_inactive_branches() {
        let (mut graph, ids) = graph_with(4);
        let (a, b, c, idle) = (ids[0], ids[1], ids[2], ids[3]);
        graph.connect(a, "out", b, "in").unwrap();
        graph.connect(b, "out", c, "in").unwrap();
        graph.connect(a, "fired", idle, "fire").unwrap();

        let order = graph.evaluation_order(Some(&[c]));
        assert_eq!(order.nodes, vec![a, b, c]);
    }
}
