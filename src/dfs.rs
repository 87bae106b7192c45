//! Depth-first traversal over the fanin cone of a circuit.
//!
//! See [`Traversal`] for details.
//!
//! [`Traversal`]: Traversal

use std::collections::HashSet;

use crate::{CircuitError, GateRef, NodeId, Result};

/// A caller-owned traversal context.
///
/// The visited set lives in the context rather than in the gates, so two
/// traversals can never interfere: starting a fresh pass means creating a
/// fresh context, there is no marker state to forget to reset.
///
/// [`order_from`] walks the transitive fanin cone of the given roots with an
/// explicit stack (no recursion, bounded by the number of gates) and returns
/// the gates in post order: every gate appears strictly after both of its
/// fanins. Roots are processed in the given order and share the visited set,
/// so a gate reachable from several roots is yielded exactly once.
///
/// [`order_from`]: Traversal::order_from
///
/// Example:
///
/// ```rust
/// use rewire::{Circuit, dfs::Traversal};
/// let circuit = Circuit::from_file("assets/circuits/chain.aag").unwrap();
/// let order = Traversal::new().order_from(circuit.outputs()).unwrap();
/// // fanins always come before their consumers here
/// ```
pub struct Traversal {
    done: HashSet<NodeId>,
}

impl Traversal {
    pub fn new() -> Self {
        Traversal {
            done: HashSet::new(),
        }
    }

    /// Post-order walk of the fanin cone of `roots`. Errors if a cycle is
    /// detected (the fanin relation of a well-formed circuit is acyclic).
    pub fn order_from(&mut self, roots: &[GateRef]) -> Result<Vec<GateRef>> {
        let mut order = Vec::new();
        for root in roots {
            self.visit(root.clone(), &mut order)?;
        }
        Ok(order)
    }

    fn visit(&mut self, root: GateRef, order: &mut Vec<GateRef>) -> Result<()> {
        // Gates currently being expanded; meeting one again through a fanin
        // edge means the circuit has a cycle.
        let mut in_progress: HashSet<NodeId> = HashSet::new();
        let mut stack: Vec<(GateRef, bool)> = vec![(root, false)];

        while let Some((gate, expanded)) = stack.pop() {
            let id = gate.borrow().id();

            // Post order: the gate comes off the stack a second time once all
            // of its fanins have been emitted.
            if expanded {
                in_progress.remove(&id);
                if self.done.insert(id) {
                    order.push(gate);
                }
                continue;
            }

            // A gate may have been visited by the time control returns to a
            // duplicate stack entry, when shared by multiple paths.
            if self.done.contains(&id) {
                continue;
            }
            if in_progress.contains(&id) {
                return Err(CircuitError::InvalidState("found a cycle".to_string()));
            }

            in_progress.insert(id);
            stack.push((gate.clone(), true));

            for fanin in gate.borrow().fanins() {
                if !self.done.contains(&fanin.id()) {
                    stack.push((fanin.get_node(), false));
                }
            }
        }

        Ok(())
    }
}

impl Default for Traversal {
    fn default() -> Self {
        Traversal::new()
    }
}
