//! SPQR decomposition: turns the netlist's multigraph into a tree of series (S), parallel (P)
//! and rigid (R) triconnected components.
//!
//! No crate in the corpus implements Hopcroft-Tarjan triconnectivity, and the reference
//! implementation leans on SageMath's `TriconnectivitySPQR` for it. This instead runs iterative
//! series/parallel graph reduction to a fixed point: repeatedly collapse a degree-2 vertex
//! (series) or a bundle of parallel edges (parallel) into one edge standing for a freshly built
//! [`SpqrNode`], until no such motif remains. What's left is either a single edge (the whole
//! netlist was series-parallel, and that edge's node is the tree root) or a residual multigraph
//! with no degree-2 vertex and no parallel bundle, wrapped as one final `Rigid` node. This
//! matches the canonical SPQR tree whenever the netlist is itself series-parallel (true of every
//! testable property in the specification this crate implements) but, unlike Hopcroft-Tarjan,
//! never further decomposes a rigid skeleton that itself nests smaller separable pieces; see
//! `DESIGN.md`.
use std::collections::HashMap;

use petgraph::stable_graph::{EdgeIndex, NodeIndex, StableUnGraph};
use petgraph::visit::{EdgeRef, IntoEdgeReferences};

use crate::element::Element;
use crate::error::WdfError;
use crate::netlist::{LumpedElement, Netlist};

/// The three SPQR node kinds (Q, for a single edge, never appears since every edge here
/// originates from a circuit element rather than from recursive SPQR bookkeeping).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpqrKind {
    /// Series chain (cycle), reduced from a run of degree-2 vertices.
    Series,
    /// Parallel bundle of two or more branches between the same vertex pair.
    Parallel,
    /// Triconnected (or scope-residual) rigid component.
    Rigid,
}

/// A link from an `S`/`P`/`R` node to a child node, carrying the vertex pair (in original
/// netlist node-index space) at which the child is glued to its parent. This is the "virtual
/// edge" of classical SPQR decomposition, named by its endpoints instead of being re-derived by
/// subgraph intersection at tree-build time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChildLink {
    /// Index of the child node within the owning [`SpqrTree::nodes`].
    pub child: usize,
    /// First endpoint of the glue edge.
    pub u: u32,
    /// Second endpoint of the glue edge.
    pub w: u32,
}

/// One node of the SPQR tree.
#[derive(Debug, Clone)]
pub struct SpqrNode {
    /// The node's type.
    pub kind: SpqrKind,
    /// Real (non-artificial) vertices of this node's induced subgraph, ascending and deduped.
    pub real_vertices: Vec<u32>,
    /// Two-terminal (and, for `Rigid` nodes, wider) lumped elements bound directly to this node.
    pub elements: Vec<LumpedElement>,
    /// Child nodes, each glued in at a specific vertex pair.
    pub children: Vec<ChildLink>,
}

impl SpqrNode {
    /// Whether `nodes` (terminal node indices of a wider element) are entirely contained in this
    /// node's real vertex set.
    fn contains_all(&self, nodes: &[u32]) -> bool {
        nodes.iter().all(|n| self.real_vertices.contains(n))
    }
}

/// The SPQR decomposition of a netlist's multigraph.
#[derive(Debug, Clone)]
pub struct SpqrTree {
    /// All nodes, in build order (the last-built node is always the root).
    pub nodes: Vec<SpqrNode>,
    /// Index of the root node within `nodes`.
    pub root: usize,
}

#[derive(Debug, Clone)]
enum Leaf {
    Element(String),
    Artificial,
    Child(usize),
}

struct Absorbed {
    real_vertices: Vec<u32>,
    elements: Vec<LumpedElement>,
    children: Vec<ChildLink>,
}

fn absorb(
    leaf: Leaf,
    endpoint_a: u32,
    endpoint_b: u32,
    same_kind: SpqrKind,
    nodes: &[SpqrNode],
    netlist: &Netlist,
) -> Absorbed {
    match leaf {
        Leaf::Element(key) => {
            let element = netlist
                .get(&key)
                .expect("spqr leaf references a live netlist key")
                .clone();
            Absorbed {
                real_vertices: Vec::new(),
                elements: vec![element],
                children: Vec::new(),
            }
        }
        Leaf::Artificial => Absorbed {
            real_vertices: Vec::new(),
            elements: Vec::new(),
            children: Vec::new(),
        },
        Leaf::Child(idx) if nodes[idx].kind == same_kind => Absorbed {
            real_vertices: nodes[idx].real_vertices.clone(),
            elements: nodes[idx].elements.clone(),
            children: nodes[idx].children.clone(),
        },
        Leaf::Child(idx) => Absorbed {
            real_vertices: Vec::new(),
            elements: Vec::new(),
            children: vec![ChildLink {
                child: idx,
                u: endpoint_a,
                w: endpoint_b,
            }],
        },
    }
}

fn dedup_sorted(mut v: Vec<u32>) -> Vec<u32> {
    v.sort_unstable();
    v.dedup();
    v
}

/// Find a vertex of degree exactly 2 whose two incident edges lead to two *distinct* neighbors
/// (a vertex with two parallel edges to the same neighbor is left for the parallel step).
fn find_series_candidate(
    graph: &StableUnGraph<u32, Leaf>,
) -> Option<(NodeIndex, EdgeIndex, EdgeIndex, NodeIndex, NodeIndex)> {
    for v in graph.node_indices() {
        let incident: Vec<_> = graph.edges(v).collect();
        if incident.len() != 2 {
            continue;
        }
        let (e0, e1) = (incident[0], incident[1]);
        let other = |e: &petgraph::stable_graph::EdgeReference<'_, Leaf>| -> NodeIndex {
            if e.source() == v {
                e.target()
            } else {
                e.source()
            }
        };
        let (u, w) = (other(&e0), other(&e1));
        if u != w {
            return Some((v, e0.id(), e1.id(), u, w));
        }
    }
    None
}

/// Find a bundle of two or more parallel edges between the same vertex pair.
fn find_parallel_bundle(
    graph: &StableUnGraph<u32, Leaf>,
) -> Option<(NodeIndex, NodeIndex, Vec<EdgeIndex>)> {
    let mut bundles: HashMap<(NodeIndex, NodeIndex), Vec<EdgeIndex>> = HashMap::new();
    for e in graph.edge_references() {
        let (a, b) = (e.source(), e.target());
        let key = if a.index() <= b.index() { (a, b) } else { (b, a) };
        bundles.entry(key).or_default().push(e.id());
    }
    bundles
        .into_iter()
        .find(|(_, edges)| edges.len() >= 2)
        .map(|((u, w), edges)| (u, w, edges))
}

fn is_real(id: u32, free_node: u32) -> bool {
    id < free_node
}

/// Decompose `netlist` into its SPQR tree.
///
/// Returns [`WdfError::InvalidTopology`] if the netlist's multigraph (after triangle-fan
/// expansion of wider elements) is disconnected.
#[profiling::function]
pub fn decompose(netlist: &Netlist) -> Result<SpqrTree, WdfError> {
    let free_node = netlist.free_node();
    let mut graph: StableUnGraph<u32, Leaf> = StableUnGraph::default();
    let mut index_of: HashMap<u32, NodeIndex> = HashMap::new();
    let mut next_artificial = free_node;
    let mut multiport: Vec<(String, Vec<u32>)> = Vec::new();

    fn ensure_node(
        graph: &mut StableUnGraph<u32, Leaf>,
        index_of: &mut HashMap<u32, NodeIndex>,
        id: u32,
    ) -> NodeIndex {
        *index_of.entry(id).or_insert_with(|| graph.add_node(id))
    }

    for element in netlist.values() {
        let arity = element.element.arity();
        if arity < 2 {
            log::warn!("element '{}' has fewer than 2 terminals, ignored", element.key);
            continue;
        }
        if arity == 2 {
            let a = ensure_node(&mut graph, &mut index_of, element.nodes[0]);
            let b = ensure_node(&mut graph, &mut index_of, element.nodes[1]);
            graph.add_edge(a, b, Leaf::Element(element.key.clone()));
        } else {
            let artificials: Vec<u32> = (0..3).map(|i| next_artificial + i).collect();
            next_artificial += 3;
            for &art in &artificials {
                let art_idx = ensure_node(&mut graph, &mut index_of, art);
                for &real in &element.nodes {
                    let real_idx = ensure_node(&mut graph, &mut index_of, real);
                    graph.add_edge(real_idx, art_idx, Leaf::Artificial);
                }
            }
            multiport.push((element.key.clone(), element.sorted_nodes()));
        }
    }

    if graph.node_count() == 0 {
        return Err(WdfError::InvalidTopology {
            reason: "netlist has no usable elements".to_string(),
        });
    }
    if !is_connected(&graph) {
        return Err(WdfError::InvalidTopology {
            reason: "netlist multigraph is disconnected".to_string(),
        });
    }

    let mut nodes: Vec<SpqrNode> = Vec::new();

    loop {
        if let Some((v, e0, e1, u, w)) = find_series_candidate(&graph) {
            let v_id = graph[v];
            let u_id = graph[u];
            let w_id = graph[w];
            let leaf0 = graph.remove_edge(e0).expect("edge exists");
            let leaf1 = graph.remove_edge(e1).expect("edge exists");
            let a0 = absorb(leaf0, v_id, u_id, SpqrKind::Series, &nodes, netlist);
            let a1 = absorb(leaf1, v_id, w_id, SpqrKind::Series, &nodes, netlist);
            let mut real_vertices = Vec::new();
            if is_real(v_id, free_node) {
                real_vertices.push(v_id);
            }
            if is_real(u_id, free_node) {
                real_vertices.push(u_id);
            }
            if is_real(w_id, free_node) {
                real_vertices.push(w_id);
            }
            real_vertices.extend(a0.real_vertices);
            real_vertices.extend(a1.real_vertices);
            let mut elements = a0.elements;
            elements.extend(a1.elements);
            let mut children = a0.children;
            children.extend(a1.children);
            let idx = nodes.len();
            nodes.push(SpqrNode {
                kind: SpqrKind::Series,
                real_vertices: dedup_sorted(real_vertices),
                elements,
                children,
            });
            if graph.edges(v).count() == 0 {
                graph.remove_node(v);
            }
            graph.add_edge(u, w, Leaf::Child(idx));
            continue;
        }

        if let Some((u, w, edges)) = find_parallel_bundle(&graph) {
            let u_id = graph[u];
            let w_id = graph[w];
            let mut real_vertices = Vec::new();
            if is_real(u_id, free_node) {
                real_vertices.push(u_id);
            }
            if is_real(w_id, free_node) {
                real_vertices.push(w_id);
            }
            let mut elements = Vec::new();
            let mut children = Vec::new();
            for e in edges {
                let leaf = graph.remove_edge(e).expect("edge exists");
                let a = absorb(leaf, u_id, w_id, SpqrKind::Parallel, &nodes, netlist);
                real_vertices.extend(a.real_vertices);
                elements.extend(a.elements);
                children.extend(a.children);
            }
            let idx = nodes.len();
            nodes.push(SpqrNode {
                kind: SpqrKind::Parallel,
                real_vertices: dedup_sorted(real_vertices),
                elements,
                children,
            });
            graph.add_edge(u, w, Leaf::Child(idx));
            continue;
        }

        break;
    }

    let root = if graph.edge_count() == 1 {
        let e = graph.edge_references().next().expect("one edge present");
        match e.weight() {
            Leaf::Child(idx) => *idx,
            Leaf::Element(key) => {
                let element = netlist.get(key).expect("live key").clone();
                nodes.push(SpqrNode {
                    kind: SpqrKind::Series,
                    real_vertices: element
                        .nodes
                        .iter()
                        .copied()
                        .filter(|n| is_real(*n, free_node))
                        .collect(),
                    elements: vec![element],
                    children: Vec::new(),
                });
                nodes.len() - 1
            }
            Leaf::Artificial => {
                return Err(WdfError::InvalidTopology {
                    reason: "netlist reduced to a bare artificial edge".to_string(),
                });
            }
        }
    } else {
        let mut real_vertices: Vec<u32> = graph
            .node_indices()
            .map(|n| graph[n])
            .filter(|id| is_real(*id, free_node))
            .collect();
        real_vertices.sort_unstable();
        let mut elements = Vec::new();
        let mut children = Vec::new();
        for e in graph.edge_references() {
            match e.weight() {
                Leaf::Element(key) => {
                    elements.push(netlist.get(key).expect("live key").clone());
                }
                Leaf::Child(idx) => children.push(ChildLink {
                    child: *idx,
                    u: graph[e.source()],
                    w: graph[e.target()],
                }),
                Leaf::Artificial => {}
            }
        }
        let rigid = SpqrNode {
            kind: SpqrKind::Rigid,
            real_vertices,
            elements,
            children,
        };
        let attach_mask: Vec<bool> = multiport
            .iter()
            .map(|(_, nodes)| rigid.contains_all(nodes))
            .collect();
        let mut rigid = rigid;
        for ((key, _), attach) in multiport.iter().zip(attach_mask) {
            if attach {
                rigid
                    .elements
                    .push(netlist.get(key).expect("live key").clone());
            }
        }
        nodes.push(rigid);
        nodes.len() - 1
    };

    log::debug!("spqr decomposition produced {} node(s), root {root}", nodes.len());
    Ok(SpqrTree { nodes, root })
}

fn is_connected(graph: &StableUnGraph<u32, Leaf>) -> bool {
    let Some(start) = graph.node_indices().next() else {
        return true;
    };
    let mut seen = std::collections::HashSet::new();
    let mut stack = vec![start];
    seen.insert(start);
    while let Some(n) = stack.pop() {
        for neighbor in graph.neighbors(n) {
            if seen.insert(neighbor) {
                stack.push(neighbor);
            }
        }
    }
    seen.len() == graph.node_count()
}
