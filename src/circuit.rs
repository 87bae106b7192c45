//! Module defining the [`Circuit`] struct, as well as [`Gate`], [`GateEdge`] and some other relevant structs.
//!
//! A circuit is built either from a file with [`Circuit::from_file`] or
//! programmatically through [`CircuitBuilder`]. Once built it is immutable:
//! analyses ([`crate::ma`], [`crate::rar`]) only read it.

pub mod builder;
pub mod edge;
pub mod error;
pub mod gate;
pub mod loader;
pub mod writer;

use std::collections::BTreeMap;
use std::fmt::Write;

pub use builder::CircuitBuilder;
pub use edge::{FaninId, GateEdge};
pub use error::{CircuitError, LoaderError, Result};
pub use gate::{Fanout, Gate, GateRef, NodeId};

use crate::dfs::Traversal;

/// A whole combinational circuit.
///
/// The id table owns the gates; fanin edges hold additional strong references
/// (always pointing downward, so no reference cycles can form in an acyclic
/// circuit) and fanout back-references are weak. The circuit is torn down as a
/// unit when dropped.
///
/// The table is ordered by id: every analysis that iterates over gates does so
/// in id order, which keeps the whole pipeline deterministic.
#[derive(Debug, Clone)]
pub struct Circuit {
    gates: BTreeMap<NodeId, GateRef>,
    /// Primary inputs, in declaration order.
    inputs: Vec<GateRef>,
    /// Primary outputs, in declaration order.
    outputs: Vec<GateRef>,
    /// AND gates, in declaration order.
    ands: Vec<GateRef>,
    /// Ids that were referenced as a fanin but never defined.
    floating: Vec<NodeId>,
    /// Declared maximum variable index (the M of the header).
    max_var: NodeId,
}

impl Circuit {
    /// Retrieves a gate from its id.
    pub fn get_gate(&self, id: NodeId) -> Option<GateRef> {
        self.gates.get(&id).cloned()
    }

    /// All gates, in id order (constant gate and placeholders included).
    pub fn gates(&self) -> impl Iterator<Item = (NodeId, &GateRef)> {
        self.gates.iter().map(|(id, gate)| (*id, gate))
    }

    pub fn inputs(&self) -> &[GateRef] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[GateRef] {
        &self.outputs
    }

    pub fn and_gates(&self) -> &[GateRef] {
        &self.ands
    }

    pub fn max_var(&self) -> NodeId {
        self.max_var
    }

    /// Ids referenced as a fanin before (or without) being defined.
    pub fn floating_ids(&self) -> &[NodeId] {
        &self.floating
    }

    /// Ids of gates defined but never referenced as a fanin, in id order.
    /// Outputs and the constant gate are observation points and do not count.
    pub fn unused_ids(&self) -> Vec<NodeId> {
        self.gates
            .iter()
            .filter(|(_, gate)| {
                let g = gate.borrow();
                (g.is_input() || g.is_and()) && g.fanouts().is_empty()
            })
            .map(|(&id, _)| id)
            .collect()
    }

    /// Topological order of the full output cone (fanins before consumers).
    pub fn topological_sort(&self) -> Result<Vec<GateRef>> {
        Traversal::new().order_from(&self.outputs)
    }

    pub(crate) fn set_input_symbol(&mut self, index: usize, name: String) -> Option<()> {
        self.inputs.get(index)?.borrow_mut().set_symbol(name);
        Some(())
    }

    pub(crate) fn set_output_symbol(&mut self, index: usize, name: String) -> Option<()> {
        self.outputs.get(index)?.borrow_mut().set_symbol(name);
        Some(())
    }

    /// Circuit statistics block.
    pub fn summary(&self) -> String {
        let (pi, po, aig) = (self.inputs.len(), self.outputs.len(), self.ands.len());
        let mut s = String::new();
        writeln!(s, "Circuit Statistics").unwrap();
        writeln!(s, "==================").unwrap();
        writeln!(s, "  PI {:>11}", pi).unwrap();
        writeln!(s, "  PO {:>11}", po).unwrap();
        writeln!(s, "  AIG{:>11}", aig).unwrap();
        writeln!(s, "------------------").unwrap();
        write!(s, "  Total{:>9}", pi + po + aig).unwrap();
        s
    }

    pub fn pi_line(&self) -> String {
        let ids: Vec<String> = self
            .inputs
            .iter()
            .map(|g| g.borrow().id().to_string())
            .collect();
        format!("PIs of the circuit: {}", ids.join(" "))
    }

    pub fn po_line(&self) -> String {
        let ids: Vec<String> = self
            .outputs
            .iter()
            .map(|g| g.borrow().id().to_string())
            .collect();
        format!("POs of the circuit: {}", ids.join(" "))
    }

    /// Floating and unused gate listings. Empty when the circuit is clean -
    /// these are diagnostics, not errors.
    pub fn floating_report(&self) -> String {
        let mut lines = Vec::new();
        if !self.floating.is_empty() {
            let ids: Vec<String> = self.floating.iter().map(|id| id.to_string()).collect();
            lines.push(format!("Gates with floating fanin(s): {}", ids.join(" ")));
        }
        let unused = self.unused_ids();
        if !unused.is_empty() {
            let ids: Vec<String> = unused.iter().map(|id| id.to_string()).collect();
            lines.push(format!("Gates defined but not used  : {}", ids.join(" ")));
        }
        lines.join("\n")
    }

    /// Human-readable netlist in canonical topological order, one gate per
    /// line. Placeholders are traversed but not listed; an undefined fanin is
    /// marked with `*`, an inverted one with `!`.
    pub fn netlist(&self) -> Result<Vec<String>> {
        fn edge_token(edge: &GateEdge) -> String {
            let undef = edge.get_node().borrow().is_undef();
            format!(
                "{}{}{}",
                if undef { "*" } else { "" },
                if edge.complement() { "!" } else { "" },
                edge.id()
            )
        }

        let mut lines = Vec::new();
        for gate in self.topological_sort()? {
            let g = gate.borrow();
            let entry = match &*g {
                Gate::Const0 { .. } => "CONST0".to_string(),
                Gate::Input { id, symbol, .. } => match symbol {
                    Some(name) => format!("PI  {} ({})", id, name),
                    None => format!("PI  {}", id),
                },
                Gate::And {
                    id, fanin0, fanin1, ..
                } => format!("AIG {} {} {}", id, edge_token(fanin0), edge_token(fanin1)),
                Gate::Output {
                    id, fanin, symbol, ..
                } => match symbol {
                    Some(name) => format!("PO  {} {} ({})", id, edge_token(fanin), name),
                    None => format!("PO  {} {}", id, edge_token(fanin)),
                },
                Gate::Undef { .. } => continue,
            };
            lines.push(format!("[{}] {}", lines.len(), entry));
        }
        Ok(lines)
    }

    /// Checking if the circuit structure is correct.
    ///
    /// The builder runs this before handing a circuit out; it is public for
    /// debug purposes, as the library is supposed to maintain integrity of the
    /// circuit at any moment.
    pub fn check_integrity(&self) -> Result<()> {
        // Ids in the table must be coherent, and every fanin edge must resolve
        // to a gate of this circuit with exactly one matching back-reference.
        for (&id, gate) in &self.gates {
            if gate.borrow().id() != id {
                return Err(CircuitError::InvalidState("incoherent gate id".to_string()));
            }

            for (slot, fanin) in gate.borrow().fanins().iter().enumerate() {
                let target_id = fanin.id();
                let target = self
                    .get_gate(target_id)
                    .ok_or(CircuitError::NodeDoesNotExist(target_id))?;
                let backrefs = target
                    .borrow()
                    .fanouts()
                    .iter()
                    .filter(|f| f.id == id && f.slot == FaninId::from(slot))
                    .count();
                if backrefs != 1 {
                    return Err(CircuitError::InvalidState(format!(
                        "expected exactly one back-reference for fanin {} of gate {}, found {}",
                        slot, id, backrefs
                    )));
                }
            }

            // And conversely every back-reference must match a real fanin edge.
            for fanout in gate.borrow().fanouts() {
                let consumer = self
                    .get_gate(fanout.id)
                    .ok_or(CircuitError::NodeDoesNotExist(fanout.id))?;
                let matches = consumer
                    .borrow()
                    .fanin(fanout.slot)
                    .is_some_and(|edge| edge.id() == id);
                if !matches {
                    return Err(CircuitError::InvalidState(format!(
                        "stale back-reference on gate {} towards gate {}",
                        id, fanout.id
                    )));
                }
            }
        }

        // The constant gate must be there.
        if self.get_gate(0).map(|g| g.borrow().is_const0()) != Some(true) {
            return Err(CircuitError::NodeDoesNotExist(0));
        }

        // Checks for acyclicity, over the whole circuit (not just the output
        // cone: unused gates must be acyclic too).
        let mut roots = self.outputs.clone();
        roots.extend(self.ands.iter().cloned());
        Traversal::new().order_from(&roots)?;

        Ok(())
    }
}

impl PartialEq for Circuit {
    /// Structural isomorphism: same declared bound, same inputs (ids and
    /// symbols, in order), same output fanins (literal and symbol, in order),
    /// same gates. Output ids are synthesized from the bound and the position,
    /// so comparing fanin literals compares the outputs themselves.
    fn eq(&self, other: &Self) -> bool {
        let output_key = |g: &GateRef| {
            let g = g.borrow();
            let fanin = g.fanins()[0].literal();
            (fanin, g.symbol().map(str::to_string))
        };
        let input_key = |g: &GateRef| {
            let g = g.borrow();
            (g.id(), g.symbol().map(str::to_string))
        };
        self.max_var == other.max_var
            && self.inputs.iter().map(input_key).collect::<Vec<_>>()
                == other.inputs.iter().map(input_key).collect::<Vec<_>>()
            && self.outputs.iter().map(output_key).collect::<Vec<_>>()
                == other.outputs.iter().map(output_key).collect::<Vec<_>>()
            && self
                .gates
                .iter()
                .filter(|(_, g)| !g.borrow().is_output())
                .map(|(id, g)| (*id, g.borrow().clone()))
                .collect::<BTreeMap<NodeId, Gate>>()
                == other
                    .gates
                    .iter()
                    .filter(|(_, g)| !g.borrow().is_output())
                    .map(|(id, g)| (*id, g.borrow().clone()))
                    .collect::<BTreeMap<NodeId, Gate>>()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn diamond() -> Circuit {
        // o9 observes 4 AND 5, with 4 = 1 AND 2 and 5 = 2 AND !3.
        let mut b = CircuitBuilder::new(8);
        b.input(2, 2).unwrap();
        b.input(4, 3).unwrap();
        b.input(6, 4).unwrap();
        b.output(16, 5).unwrap();
        b.and(16, 8, 10, 6).unwrap();
        b.and(8, 2, 4, 7).unwrap();
        b.and(10, 4, 7, 8).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn accessors() {
        let c = diamond();
        assert_eq!(c.inputs().len(), 3);
        assert_eq!(c.outputs().len(), 1);
        assert_eq!(c.and_gates().len(), 3);
        assert_eq!(c.max_var(), 8);
        assert!(c.get_gate(0).unwrap().borrow().is_const0());
        assert!(c.get_gate(8).unwrap().borrow().is_and());
        assert!(c.get_gate(42).is_none());
    }

    #[test]
    fn summary_block() {
        let c = diamond();
        let summary = c.summary();
        let lines: Vec<&str> = summary.lines().collect();
        assert_eq!(
            lines,
            vec![
                "Circuit Statistics",
                "==================",
                "  PI           3",
                "  PO           1",
                "  AIG          3",
                "------------------",
                "  Total        7",
            ]
        );
    }

    #[test]
    fn io_lines() {
        let c = diamond();
        assert_eq!(c.pi_line(), "PIs of the circuit: 1 2 3");
        assert_eq!(c.po_line(), "POs of the circuit: 9");
    }

    #[test]
    fn netlist_is_topological() {
        let c = diamond();
        let lines = c.netlist().unwrap();
        // Fanins are always listed before the gates that use them.
        let position = |needle: &str| {
            lines
                .iter()
                .position(|l| l.contains(needle))
                .unwrap_or_else(|| panic!("missing {}", needle))
        };
        assert!(position("PI  1") < position("AIG 4"));
        assert!(position("PI  2") < position("AIG 4"));
        assert!(position("AIG 4") < position("AIG 8"));
        assert!(position("AIG 5") < position("AIG 8"));
        assert!(position("AIG 8") < position("PO  9"));
        assert!(lines.iter().any(|l| l.contains("AIG 5 2 !3")));
        // Indices are contiguous.
        assert!(lines[0].starts_with("[0] "));
        assert_eq!(lines.len(), 7);
    }

    #[test]
    fn clean_circuit_has_empty_floating_report() {
        let c = diamond();
        assert!(c.floating_report().is_empty());
        assert!(c.floating_ids().is_empty());
        assert!(c.unused_ids().is_empty());
    }

    #[test]
    fn integrity_of_built_circuit() {
        let c = diamond();
        assert!(c.check_integrity().is_ok());
    }

    #[test]
    fn circuit_eq() {
        let a = diamond();
        let b = diamond();
        assert_eq!(a, b);

        let mut b = CircuitBuilder::new(8);
        b.input(2, 2).unwrap();
        b.input(4, 3).unwrap();
        b.input(6, 4).unwrap();
        b.output(16, 5).unwrap();
        b.and(16, 8, 10, 6).unwrap();
        b.and(8, 2, 4, 7).unwrap();
        b.and(10, 4, 6, 8).unwrap(); // 5 = 2 AND 3: different inversion
        let b = b.build().unwrap();
        assert_ne!(a, b);
    }
}
