//! Netlist storage and macro-element expansion.
use crate::element::Element;
use crate::error::WdfError;

/// One element bound to an ordered tuple of circuit nodes, keyed uniquely within its owning
/// [`Netlist`].
#[derive(Debug, Clone, PartialEq)]
pub struct LumpedElement {
    /// Unique key within the owning netlist.
    pub key: String,
    /// The element value.
    pub element: Element,
    /// Ordered terminal node indices (length matches [`Element::arity`]).
    pub nodes: Vec<u32>,
}

impl LumpedElement {
    /// Create a new lumped element binding.
    pub fn new(key: impl Into<String>, element: Element, nodes: Vec<u32>) -> Self {
        Self {
            key: key.into(),
            element,
            nodes,
        }
    }

    /// Number of terminal nodes this binding has.
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// The element's terminal nodes, sorted ascending, used to canonicalize multigraph edges.
    pub fn sorted_nodes(&self) -> Vec<u32> {
        let mut nodes = self.nodes.clone();
        nodes.sort_unstable();
        nodes
    }
}

/// A keyed collection of [`LumpedElement`]s, in insertion order.
///
/// Insertion order is preserved (a plain `Vec` rather than a hash map) because the WDF tree
/// builder's root-selection rule (§4.6) depends on "first encountered in iteration order",
/// mirroring Python's dict-insertion-order guarantee without pulling in an `indexmap`
/// dependency the rest of the corpus never reaches for.
#[derive(Debug, Clone, Default)]
pub struct Netlist {
    elements: Vec<LumpedElement>,
}

impl Netlist {
    /// Create an empty netlist.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the index of an element by key.
    fn index_of(&self, key: &str) -> Option<usize> {
        self.elements.iter().position(|e| e.key == key)
    }

    /// Add an element. Errors if its key already exists.
    pub fn add(&mut self, element: LumpedElement) -> Result<(), WdfError> {
        if self.index_of(&element.key).is_some() {
            return Err(WdfError::DuplicateKey { key: element.key });
        }
        self.elements.push(element);
        Ok(())
    }

    /// Remove an element by key. Errors if the key isn't present.
    pub fn remove(&mut self, key: &str) -> Result<LumpedElement, WdfError> {
        let idx = self.index_of(key).ok_or_else(|| WdfError::MissingKey {
            key: key.to_string(),
        })?;
        Ok(self.elements.remove(idx))
    }

    /// Look up an element by key.
    pub fn get(&self, key: &str) -> Option<&LumpedElement> {
        self.elements.iter().find(|e| e.key == key)
    }

    /// All element keys, in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.elements.iter().map(|e| e.key.as_str())
    }

    /// All elements, in insertion order.
    pub fn values(&self) -> impl Iterator<Item = &LumpedElement> {
        self.elements.iter()
    }

    /// `1 + ` the highest node index referenced by any element, or `0` if the netlist is empty.
    pub fn free_node(&self) -> u32 {
        self.elements
            .iter()
            .flat_map(|e| e.nodes.iter().copied())
            .max()
            .map(|n| n + 1)
            .unwrap_or(0)
    }

    /// Run macro-element expansion to a fixed point: repeatedly replace any
    /// [`Replaceable`](crate::element::Replaceable) element with its `replacement`, re-evaluating
    /// `free_node` after every replacement so freshly introduced nodes never collide.
    ///
    /// Terminates because the catalog's only replaceable element (`LinearTransformer`) expands
    /// into non-replaceable primitives.
    pub fn perform_replacements(&mut self) -> Result<(), WdfError> {
        loop {
            let Some(key) = self
                .elements
                .iter()
                .find(|e| e.element.as_replaceable().is_some())
                .map(|e| e.key.clone())
            else {
                return Ok(());
            };
            let element = self.remove(&key)?;
            let free_node = self.free_node();
            let replacement = element
                .element
                .as_replaceable()
                .expect("checked above")
                .replacement(&element, free_node);
            for new_element in replacement {
                self.add(new_element)?;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn free_node_empty_is_zero() {
        assert_eq!(Netlist::new().free_node(), 0);
    }

    #[test]
    fn free_node_tracks_max_plus_one() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "r1",
                Element::Resistor {
                    r: crate::element::ResistorValue::Fixed(100.0),
                },
                vec![0, 3],
            ))
            .unwrap();
        assert_eq!(netlist.free_node(), 4);
    }

    #[test]
    fn duplicate_key_rejected() {
        let mut netlist = Netlist::new();
        let elem = || {
            LumpedElement::new(
                "r1",
                Element::Resistor {
                    r: crate::element::ResistorValue::Fixed(1.0),
                },
                vec![0, 1],
            )
        };
        netlist.add(elem()).unwrap();
        assert!(matches!(
            netlist.add(elem()),
            Err(WdfError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn linear_transformer_expands_to_three_inductors_and_transformer() {
        let mut netlist = Netlist::new();
        netlist
            .add(LumpedElement::new(
                "xfmr",
                Element::LinearTransformer {
                    l_in: 1.0,
                    l_out: 1.0,
                    coupling: 1.0,
                },
                vec![0, 1, 2, 3],
            ))
            .unwrap();
        netlist.perform_replacements().unwrap();
        let inductors = netlist
            .values()
            .filter(|e| matches!(e.element, Element::Inductor { .. }))
            .count();
        let transformers = netlist
            .values()
            .filter(|e| matches!(e.element, Element::IdealTransformer { .. }))
            .count();
        assert_eq!(inductors, 3);
        assert_eq!(transformers, 1);
    }
}
