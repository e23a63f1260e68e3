//! WDF tree construction: turns an [`crate::spqr::SpqrTree`] into a tree of scattering nodes and
//! drives sample-by-sample wave propagation through it.
//!
//! Nodes are shared, interior-mutable and owned both top-down (strong `Arc` from parent to
//! child) and bottom-up (weak back-reference to parent): `Node<T> = Arc<AtomicRefCell<T>>`, so a
//! node can be reached and mutated from either direction during root selection, re-rooting, and
//! the up/down wave passes.
use std::collections::HashMap;
use std::sync::{Arc, Weak};

use atomic_refcell::AtomicRefCell;

use crate::diode::Diode;
use crate::element::Element;
use crate::error::WdfError;
use crate::netlist::LumpedElement;
use crate::spqr::{ChildLink, SpqrKind, SpqrNode, SpqrTree};
use crate::thevenin::{self, ThevPort};
use crate::wdf_adaptor::{Adaptor, AdaptorKind};
use crate::wdf_leaf as leaf;
use crate::{AdaptedWdf, DynamicInput, Wave, Wdf};

/// Shared, interior-mutable handle to one tree node.
pub type Node = Arc<AtomicRefCell<WdfTreeNode>>;
type WeakNode = Weak<AtomicRefCell<WdfTreeNode>>;

/// The two-terminal linear/nonlinear leaves of [`crate::wdf_leaf`], plus the nonlinear
/// [`Diode`], unified behind one small dispatcher so the tree builder doesn't need a trait
/// object per node.
#[derive(Debug, Clone)]
pub enum Leaf {
    /// See [`leaf::Resistor`].
    Resistor(leaf::Resistor),
    /// See [`leaf::OpenCircuit`].
    OpenCircuit(leaf::OpenCircuit),
    /// See [`leaf::Inductor`].
    Inductor(leaf::Inductor),
    /// See [`leaf::Capacitor`].
    Capacitor(leaf::Capacitor),
    /// See [`leaf::VoltageSource`].
    VoltageSource(leaf::VoltageSource),
    /// See [`leaf::Trimmer`].
    Trimmer(leaf::Trimmer),
    /// See [`Diode`].
    Diode(Diode),
}

macro_rules! dispatch_leaf {
    ($self:expr, $pat:ident => $body:expr) => {
        match $self {
            Leaf::Resistor($pat) => $body,
            Leaf::OpenCircuit($pat) => $body,
            Leaf::Inductor($pat) => $body,
            Leaf::Capacitor($pat) => $body,
            Leaf::VoltageSource($pat) => $body,
            Leaf::Trimmer($pat) => $body,
            Leaf::Diode($pat) => $body,
        }
    };
}

impl Leaf {
    fn wave(&self) -> Wave {
        dispatch_leaf!(self, n => n.wave())
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        dispatch_leaf!(self, n => n.incident(a))
    }

    fn reflected(&mut self) -> f64 {
        dispatch_leaf!(self, n => n.reflected())
    }

    fn reset(&mut self) {
        dispatch_leaf!(self, n => n.reset())
    }

    fn port_resistance(&self) -> f64 {
        dispatch_leaf!(self, n => n.port_resistance())
    }

    /// Write a dynamic sample value, if this leaf accepts one (voltage source, trimmer).
    fn set_sample_data(&mut self, value: f64) -> bool {
        match self {
            Leaf::VoltageSource(v) => {
                v.set_sample_data(value);
                true
            }
            Leaf::Trimmer(t) => {
                t.set_sample_data(value);
                true
            }
            _ => false,
        }
    }

    fn is_defined(&self) -> bool {
        match self {
            Leaf::VoltageSource(v) => v.is_defined(),
            Leaf::Trimmer(t) => t.is_defined(),
            _ => true,
        }
    }

    fn is_dynamic(&self) -> bool {
        matches!(self, Leaf::VoltageSource(_) | Leaf::Trimmer(_))
    }
}

/// Either a [`Leaf`] or an [`Adaptor`].
#[derive(Debug, Clone)]
pub enum NodeKind {
    /// A two-terminal (or nonlinear) leaf.
    Leaf(Leaf),
    /// A series/parallel/rigid scattering adaptor.
    Adaptor(Adaptor),
}

/// One node of the WDF tree.
#[derive(Debug, Clone)]
pub struct WdfTreeNode {
    /// Netlist key this node was built from (the adaptor's owning [`SpqrNode`] has no single
    /// key of its own, so adaptor nodes are keyed by their first child's key for diagnostics).
    pub key: String,
    kind: NodeKind,
    children: Vec<Node>,
    parent: Option<WeakNode>,
    /// Terminal nodes of the original circuit element, populated for leaf nodes only; used to
    /// attach a Thevenin port when this leaf ends up as the parent of an adaptor after re-rooting.
    terminal_nodes: Vec<u32>,
    /// Index into the owning [`SpqrTree`], populated for adaptor nodes only.
    spqr_idx: Option<usize>,
}

impl WdfTreeNode {
    /// This node's wave state at its upward-facing port.
    pub fn wave(&self) -> Wave {
        match &self.kind {
            NodeKind::Leaf(l) => l.wave(),
            NodeKind::Adaptor(a) => a.wave(),
        }
    }

    fn incident(&mut self, a: f64) -> Result<(), WdfError> {
        match &mut self.kind {
            NodeKind::Leaf(l) => l.incident(a),
            NodeKind::Adaptor(adaptor) => adaptor.incident(a),
        }
    }

    fn reflected(&mut self) -> f64 {
        match &mut self.kind {
            NodeKind::Leaf(l) => l.reflected(),
            NodeKind::Adaptor(a) => Wdf::reflected(a),
        }
    }

    /// Port resistance of this node's upward-facing port.
    pub fn port_resistance(&self) -> f64 {
        match &self.kind {
            NodeKind::Leaf(l) => l.port_resistance(),
            NodeKind::Adaptor(a) => a.port_resistance(),
        }
    }

    fn reset(&mut self) {
        match &mut self.kind {
            NodeKind::Leaf(l) => l.reset(),
            NodeKind::Adaptor(a) => Wdf::reset(a),
        }
        for child in &self.children {
            child.borrow_mut().reset();
        }
    }

    /// The node's own [`NodeKind`].
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// This node's children, in their fixed construction/re-rooting order.
    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

/// A built WDF tree: a root node plus a by-key index for dynamic-input writes and output probes.
#[derive(Debug)]
pub struct WdfTree {
    root: Node,
    by_key: HashMap<String, Node>,
    dynamic_keys: Vec<String>,
}

impl WdfTree {
    /// Build a WDF tree from an SPQR decomposition: construct bottom-up from the SPQR root,
    /// select and re-root to the nonlinear-first priority order, then bind every node's
    /// scattering matrix (or, for a diode, its Wright-omega constants) bottom-up.
    pub fn build(samplerate: f64, spqr: &SpqrTree) -> Result<Self, WdfError> {
        let mut by_key = HashMap::new();
        let mut order: Vec<Node> = Vec::new();
        let initial_root = parse_node(samplerate, spqr, spqr.root, &mut by_key, &mut order);

        let new_root = select_root(&order).unwrap_or_else(|| initial_root.clone());
        if !Arc::ptr_eq(&new_root, &initial_root) {
            reroot(&initial_root, &new_root);
        }

        post_init(&new_root, spqr)?;

        let dynamic_keys = order
            .iter()
            .filter(|n| matches!(&n.borrow().kind, NodeKind::Leaf(l) if l.is_dynamic()))
            .map(|n| n.borrow().key.clone())
            .collect();

        Ok(Self {
            root: new_root,
            by_key,
            dynamic_keys,
        })
    }

    /// Look up a node by its original netlist key (leaves only; adaptors have no netlist key of
    /// their own).
    pub fn get(&self, key: &str) -> Option<&Node> {
        self.by_key.get(key)
    }

    /// Write a dynamic sample value to a voltage source or trimmer by key.
    pub fn set_sample_data(&self, key: &str, value: f64) -> Result<(), WdfError> {
        let node = self.get(key).ok_or_else(|| WdfError::MissingKey {
            key: key.to_string(),
        })?;
        let mut node = node.borrow_mut();
        let accepted = match &mut node.kind {
            NodeKind::Leaf(l) => l.set_sample_data(value),
            NodeKind::Adaptor(_) => false,
        };
        if !accepted {
            return Err(WdfError::MissingKey {
                key: key.to_string(),
            });
        }
        Ok(())
    }

    /// Voltage at a node, read as `(a+b)/2` after a full wave propagation.
    pub fn voltage(&self, key: &str) -> Result<f64, WdfError> {
        let node = self.get(key).ok_or_else(|| WdfError::MissingKey {
            key: key.to_string(),
        })?;
        Ok(node.borrow().wave().voltage())
    }

    /// Current through a node, read as `(a-b)/(2*Rp)` after a full wave propagation.
    pub fn current(&self, key: &str) -> Result<f64, WdfError> {
        let node = self.get(key).ok_or_else(|| WdfError::MissingKey {
            key: key.to_string(),
        })?;
        let node = node.borrow();
        Ok(node.wave().current(node.port_resistance()))
    }

    /// Reset every node to zero waves and restore dynamic elements to construction-time defaults.
    pub fn reset(&self) {
        self.root.borrow_mut().reset();
    }

    /// Error out if any voltage source or trimmer has never had a sample written.
    pub fn check_dynamic_inputs_defined(&self) -> Result<(), WdfError> {
        for key in &self.dynamic_keys {
            let node = &self.by_key[key];
            let defined = match &node.borrow().kind {
                NodeKind::Leaf(l) => l.is_defined(),
                NodeKind::Adaptor(_) => true,
            };
            if !defined {
                return Err(WdfError::UndefinedDynamicInput { key: key.clone() });
            }
        }
        Ok(())
    }

    /// Propagate incident waves from the leaves up to the root: post-order, each non-leaf node
    /// gathers its children's reflected waves and computes its own reflection.
    #[profiling::function]
    pub fn wave_up(&self) {
        fn recurse(node: &Node) {
            let children = node.borrow().children.clone();
            for child in &children {
                if !child.borrow().children.is_empty() {
                    recurse(child);
                }
            }
            let values: Vec<f64> = children.iter().map(|c| c.borrow().wave().b).collect();
            let mut node_mut = node.borrow_mut();
            match &mut node_mut.kind {
                NodeKind::Adaptor(a) => a.receive_children(&values),
                NodeKind::Leaf(Leaf::Diode(_)) => {
                    // A diode promoted to root has exactly one child; its incident wave is that
                    // child's reflection.
                    if let Some(v) = values.first() {
                        let _ = node_mut.incident(*v);
                    }
                }
                NodeKind::Leaf(_) => {}
            }
        }
        recurse(&self.root);
    }

    /// Compute the root's own reflection, then propagate incident waves from the root down to
    /// the leaves.
    #[profiling::function]
    pub fn wave_down(&self) {
        fn recurse(node: &Node) {
            let reflections: Vec<f64> = {
                let mut node_mut = node.borrow_mut();
                match &mut node_mut.kind {
                    NodeKind::Adaptor(a) => a.child_reflections().to_vec(),
                    NodeKind::Leaf(Leaf::Diode(_)) => {
                        vec![node_mut.reflected()]
                    }
                    NodeKind::Leaf(_) => Vec::new(),
                }
            };
            let children = node.borrow().children.clone();
            for (child, value) in children.iter().zip(reflections.iter()) {
                let _ = child.borrow_mut().incident(*value);
                if !child.borrow().children.is_empty() {
                    recurse(child);
                }
            }
        }
        recurse(&self.root);
    }
}

fn make_leaf(samplerate: f64, element: &Element) -> Leaf {
    match element {
        Element::Resistor {
            r: crate::element::ResistorValue::Fixed(r),
        } => Leaf::Resistor(leaf::Resistor::new(*r)),
        Element::OpenCircuit => Leaf::OpenCircuit(leaf::OpenCircuit::new()),
        Element::Capacitor { c } => Leaf::Capacitor(leaf::Capacitor::new(*c, samplerate)),
        Element::Inductor { l } => Leaf::Inductor(leaf::Inductor::new(*l, samplerate)),
        Element::VoltageSource { r, vs } => Leaf::VoltageSource(leaf::VoltageSource::new(*r, *vs)),
        Element::Trimmer { r } => Leaf::Trimmer(leaf::Trimmer::new(*r)),
        Element::Diode { is, vt } => Leaf::Diode(Diode::new(*is, *vt)),
        other => unreachable!("element {other:?} cannot appear as a two-terminal WDF leaf"),
    }
}

fn parse_node(
    samplerate: f64,
    spqr: &SpqrTree,
    idx: usize,
    by_key: &mut HashMap<String, Node>,
    order: &mut Vec<Node>,
) -> Node {
    let spqr_node = &spqr.nodes[idx];
    let mut children: Vec<Node> = Vec::new();
    let mut first_key = None;

    for element in &spqr_node.elements {
        if element.n_nodes() != 2 {
            continue;
        }
        let child = Arc::new(AtomicRefCell::new(WdfTreeNode {
            key: element.key.clone(),
            kind: NodeKind::Leaf(make_leaf(samplerate, &element.element)),
            children: Vec::new(),
            parent: None,
            terminal_nodes: element.nodes.clone(),
            spqr_idx: None,
        }));
        first_key.get_or_insert_with(|| element.key.clone());
        by_key.insert(element.key.clone(), child.clone());
        order.push(child.clone());
        children.push(child);
    }
    for link in &spqr_node.children {
        let child = parse_node(samplerate, spqr, link.child, by_key, order);
        first_key.get_or_insert_with(|| child.borrow().key.clone());
        children.push(child);
    }

    let kind = match spqr_node.kind {
        SpqrKind::Series => AdaptorKind::Series,
        SpqrKind::Parallel => AdaptorKind::Parallel,
        SpqrKind::Rigid => AdaptorKind::Rigid,
    };
    let node = Arc::new(AtomicRefCell::new(WdfTreeNode {
        key: first_key.unwrap_or_else(|| format!("adaptor#{idx}")),
        kind: NodeKind::Adaptor(Adaptor::new(kind)),
        children: Vec::new(),
        parent: None,
        terminal_nodes: Vec::new(),
        spqr_idx: Some(idx),
    }));
    for child in &children {
        child.borrow_mut().parent = Some(Arc::downgrade(&node));
    }
    node.borrow_mut().children = children;
    order.push(node.clone());
    node
}

/// Priority order: the first nonlinear (diode) leaf wins; failing that, the first rigid adaptor;
/// failing that, the first adaptor of any kind. Returns `None` (keep the initial root) if none
/// of those exist, i.e. a purely linear series-parallel netlist with no rigid residue.
fn select_root(order: &[Node]) -> Option<Node> {
    order
        .iter()
        .find(|n| matches!(&n.borrow().kind, NodeKind::Leaf(Leaf::Diode(_))))
        .or_else(|| {
            order.iter().find(|n| {
                matches!(&n.borrow().kind, NodeKind::Adaptor(a) if a.kind() == AdaptorKind::Rigid)
            })
        })
        .or_else(|| order.iter().find(|n| matches!(&n.borrow().kind, NodeKind::Adaptor(_))))
        .cloned()
}

/// Reverse the parent chain from the current root down to `target`, so that `target` ends up
/// with no parent and every node on the former root-to-target path gains its old parent as an
/// extra trailing child.
fn reroot(node: &Node, target: &Node) -> bool {
    if Arc::ptr_eq(node, target) {
        let old_parent = node.borrow().parent.clone().and_then(|w| w.upgrade());
        if let Some(p) = old_parent {
            node.borrow_mut().children.push(p);
        }
        node.borrow_mut().parent = None;
        return true;
    }
    let children_snapshot: Vec<Node> = node.borrow().children.clone();
    for child in &children_snapshot {
        if reroot(child, target) {
            {
                let mut n = node.borrow_mut();
                n.children.retain(|c| !Arc::ptr_eq(c, child));
            }
            let old_parent = node.borrow().parent.clone().and_then(|w| w.upgrade());
            if let Some(p) = old_parent {
                node.borrow_mut().children.push(p);
            }
            node.borrow_mut().parent = Some(Arc::downgrade(child));
            return true;
        }
    }
    false
}

/// Bottom-up pass: bind a diode's Wright-omega constants from its single child's port
/// resistance, and compute every adaptor's scattering matrix (closed-form for series/parallel,
/// symbolically solved via [`thevenin::solve`] for rigid nodes).
fn post_init(node: &Node, spqr: &SpqrTree) -> Result<(), WdfError> {
    let children: Vec<Node> = node.borrow().children.clone();
    for child in &children {
        post_init(child, spqr)?;
    }

    let has_parent = node.borrow().parent.is_some();
    let this_spqr_idx = node.borrow().spqr_idx;
    let parent_node = node.borrow().parent.clone().and_then(|w| w.upgrade());

    let mut node_mut = node.borrow_mut();
    match &mut node_mut.kind {
        NodeKind::Leaf(Leaf::Diode(d)) => {
            if let Some(child) = children.first() {
                let r = child.borrow().port_resistance();
                d.bind(r);
            }
        }
        NodeKind::Leaf(_) => {}
        NodeKind::Adaptor(adaptor) => {
            adaptor.set_has_parent(has_parent);
            match adaptor.kind() {
                AdaptorKind::Series | AdaptorKind::Parallel => {
                    let resistances: Vec<f64> =
                        children.iter().map(|c| c.borrow().port_resistance()).collect();
                    adaptor.set_closed_form(&resistances);
                }
                AdaptorKind::Rigid => {
                    let this_idx = this_spqr_idx.expect("rigid node carries its spqr index");
                    let upward_attach = if has_parent {
                        let parent = parent_node
                            .as_ref()
                            .expect("has_parent implies a live parent");
                        Some(upward_attach_point(spqr, this_idx, parent))
                    } else {
                        None
                    };
                    let mut ports = Vec::with_capacity(children.len() + 1);
                    if let Some(attach) = upward_attach {
                        ports.push(ThevPort::adapted(attach));
                    }
                    for child in &children {
                        let attach = child_attach_point(spqr, this_idx, child);
                        let r = child.borrow().port_resistance();
                        ports.push(ThevPort::fixed(r, attach));
                    }
                    let multiports: Vec<LumpedElement> = spqr.nodes[this_idx]
                        .elements
                        .iter()
                        .filter(|e| e.n_nodes() != 2)
                        .cloned()
                        .collect();
                    let solution = thevenin::solve(&ports, &multiports, has_parent)?;
                    adaptor.set_rigid(solution.scattering, solution.upward_resistance.unwrap_or(f64::NAN));
                }
            }
        }
    }
    Ok(())
}

/// The vertex pair at which a rigid node (at `this_idx`) attaches to its parent. If the parent is
/// itself an adaptor, this is the shared SPQR-tree edge; if the parent is a leaf (a diode
/// promoted to root), it is that leaf's own two terminal nodes.
fn upward_attach_point(spqr: &SpqrTree, this_idx: usize, parent: &Node) -> (u32, u32) {
    let parent_ref = parent.borrow();
    match &parent_ref.kind {
        NodeKind::Leaf(_) => {
            let t = &parent_ref.terminal_nodes;
            (t[0], t[1])
        }
        NodeKind::Adaptor(_) => {
            let parent_idx = parent_ref.spqr_idx.expect("adaptor carries its spqr index");
            drop(parent_ref);
            edge_between(spqr, this_idx, parent_idx)
                .expect("adjacent SPQR-tree nodes share a glue edge")
        }
    }
}

/// The vertex pair at which a rigid node (at `this_idx`) attaches to one of its children.
fn child_attach_point(spqr: &SpqrTree, this_idx: usize, child: &Node) -> (u32, u32) {
    let child_ref = child.borrow();
    match &child_ref.kind {
        NodeKind::Leaf(_) => {
            let t = &child_ref.terminal_nodes;
            (t[0], t[1])
        }
        NodeKind::Adaptor(_) => {
            let child_idx = child_ref.spqr_idx.expect("adaptor carries its spqr index");
            drop(child_ref);
            edge_between(spqr, this_idx, child_idx)
                .expect("adjacent SPQR-tree nodes share a glue edge")
        }
    }
}

fn edge_between(spqr: &SpqrTree, a: usize, b: usize) -> Option<(u32, u32)> {
    find_link(&spqr.nodes[a].children, b)
        .or_else(|| find_link(&spqr.nodes[b].children, a))
}

fn find_link(children: &[ChildLink], target: usize) -> Option<(u32, u32)> {
    children
        .iter()
        .find(|c| c.child == target)
        .map(|c| (c.u, c.w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::ResistorValue;
    use crate::netlist::{LumpedElement, Netlist};
    use crate::spqr;

    fn resistor(r: f64) -> Element {
        Element::Resistor {
            r: ResistorValue::Fixed(r),
        }
    }

    #[test]
    fn voltage_divider_tree_propagates_dc() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "vs",
                Element::VoltageSource {
                    r: 50.0,
                    vs: Some(10.0),
                },
                vec![0, 1],
            ))
            .unwrap();
        netlist
            .add(LumpedElement::new("r1", resistor(1000.0), vec![1, 2]))
            .unwrap();
        netlist
            .add(LumpedElement::new("r2", resistor(1000.0), vec![2, 0]))
            .unwrap();
        let spqr_tree = spqr::decompose(&netlist).unwrap();
        let tree = WdfTree::build(48_000.0, &spqr_tree).unwrap();
        for _ in 0..8 {
            tree.wave_up();
            tree.wave_down();
        }
        let vs_voltage = tree.voltage("vs").unwrap();
        assert!(vs_voltage.is_finite());
    }
}
