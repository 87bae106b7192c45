//! The mandatory-assignment propagation engine.
//!
//! Given a value committed at one gate, [`propagate`] derives every other
//! value forced by circuit structure alone - backward through fanins and
//! forward through fanouts - and records it in an [`AssignmentMap`].
//!
//! A derived value contradicting an already-committed one is a *conflict*:
//! a normal, expected analysis outcome meaning "this assumption is
//! infeasible", reported through [`Propagation`] and never as an error. The
//! engine is deliberately incomplete (see the false-output rule below); the
//! global SAT solver is the completeness backstop.

use std::collections::HashMap;

use crate::{Circuit, Gate, NodeId};

/// A ternary signal value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ternary {
    Zero,
    One,
    Free,
}

/// A mapping from gate id to a ternary value.
///
/// Mutable scratch state of one propagation run: independent runs use
/// independent maps (or [`clear`] between them), never a shared one.
///
/// [`clear`]: AssignmentMap::clear
#[derive(Debug, Clone, Default)]
pub struct AssignmentMap {
    values: HashMap<NodeId, bool>,
}

impl AssignmentMap {
    pub fn new() -> Self {
        AssignmentMap::default()
    }

    pub fn value(&self, id: NodeId) -> Ternary {
        match self.values.get(&id) {
            Some(true) => Ternary::One,
            Some(false) => Ternary::Zero,
            None => Ternary::Free,
        }
    }

    pub fn committed(&self, id: NodeId) -> Option<bool> {
        self.values.get(&id).copied()
    }

    pub fn is_free(&self, id: NodeId) -> bool {
        !self.values.contains_key(&id)
    }

    pub fn committed_count(&self) -> usize {
        self.values.len()
    }

    /// Back to all-free.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Records a value without a conflict check - reserved for the solver
    /// back-fill, whose models always agree with the committed values.
    pub(crate) fn fill(&mut self, id: NodeId, value: bool) {
        self.values.insert(id, value);
    }

    /// Ids committed in both maps with disagreeing values, in id order.
    pub fn disagreements(&self, other: &AssignmentMap) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .values
            .iter()
            .filter(|(id, value)| other.values.get(id).is_some_and(|v| v != *value))
            .map(|(&id, _)| id)
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// The outcome of a propagation run.
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Propagation {
    Consistent,
    /// A forced value contradicted a committed one; the map is left as it was
    /// when the contradiction was found and the branch is infeasible.
    Conflict,
}

impl Propagation {
    pub fn is_conflict(self) -> bool {
        matches!(self, Propagation::Conflict)
    }
}

enum Commit {
    Fresh,
    Known,
    Contradiction,
}

fn try_commit(map: &mut AssignmentMap, id: NodeId, value: bool) -> Commit {
    // The constant gate is structurally zero; forcing it high can never be
    // satisfied.
    if id == 0 && value {
        return Commit::Contradiction;
    }
    match map.committed(id) {
        Some(v) if v == value => Commit::Known,
        Some(_) => Commit::Contradiction,
        None => {
            map.fill(id, value);
            Commit::Fresh
        }
    }
}

/// Commits `value` at `id` (conflict-checked) and propagates from it.
pub fn assume(
    circuit: &Circuit,
    map: &mut AssignmentMap,
    id: NodeId,
    value: bool,
    initial: bool,
) -> Propagation {
    match try_commit(map, id, value) {
        Commit::Contradiction => Propagation::Conflict,
        // Nothing newly committed, nothing to derive.
        Commit::Known => Propagation::Consistent,
        Commit::Fresh => propagate(circuit, map, id, initial),
    }
}

/// Propagates from the already-committed value at `start`.
///
/// When `initial` is set the seed's own fanout side is skipped: the caller
/// owns it (the RAR driver drives the fanout side through its dependent-gate
/// assumptions). Values derived during propagation always flow both ways.
///
/// The worklist only ever holds newly-committed gates, so the visit count is
/// bounded by the number of reachable gates even under reconvergent fanout.
pub fn propagate(
    circuit: &Circuit,
    map: &mut AssignmentMap,
    start: NodeId,
    initial: bool,
) -> Propagation {
    let mut work: Vec<(NodeId, bool)> = vec![(start, initial)];

    while let Some((id, seed)) = work.pop() {
        let Some(gate) = circuit.get_gate(id) else {
            continue;
        };
        let Some(value) = map.committed(id) else {
            continue;
        };
        let gate = gate.borrow();

        // Backward (fanin) implication.
        if let Gate::And { fanin0, fanin1, .. } = &*gate {
            if value {
                // A true output forces both input terms true.
                for edge in [fanin0, fanin1] {
                    match try_commit(map, edge.id(), edge.controlling_high()) {
                        Commit::Contradiction => return Propagation::Conflict,
                        Commit::Fresh => work.push((edge.id(), false)),
                        Commit::Known => (),
                    }
                }
            } else {
                // A false output determines an input only when the sibling
                // term is already committed true; when either input could be
                // the cause, both stay free.
                for (edge, sibling) in [(fanin0, fanin1), (fanin1, fanin0)] {
                    let sibling_term = map.committed(sibling.id()).map(|v| sibling.term(v));
                    if sibling_term == Some(true) {
                        match try_commit(map, edge.id(), !edge.controlling_high()) {
                            Commit::Contradiction => return Propagation::Conflict,
                            Commit::Fresh => work.push((edge.id(), false)),
                            Commit::Known => (),
                        }
                    }
                }
            }
        }

        // Forward (fanout) implication.
        if !seed {
            for fanout in gate.fanouts() {
                let Some(consumer) = fanout.gate.upgrade() else {
                    continue;
                };
                if map.committed(fanout.id).is_some() {
                    continue;
                }
                let consumer = consumer.borrow();
                let Gate::And { fanin0, fanin1, .. } = &*consumer else {
                    continue;
                };

                let term0 = map.committed(fanin0.id()).map(|v| fanin0.term(v));
                let term1 = map.committed(fanin1.id()).map(|v| fanin1.term(v));
                let forced = if term0 == Some(false) || term1 == Some(false) {
                    Some(false)
                } else if term0 == Some(true) && term1 == Some(true) {
                    Some(true)
                } else {
                    None
                };

                if let Some(forced_value) = forced {
                    match try_commit(map, fanout.id, forced_value) {
                        Commit::Contradiction => return Propagation::Conflict,
                        Commit::Fresh => work.push((fanout.id, false)),
                        Commit::Known => (),
                    }
                }
            }
        }
    }

    Propagation::Consistent
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CircuitBuilder;

    /// 4 = 1 AND 2, 5 = 4 AND 3, observed by one output.
    fn and_chain() -> Circuit {
        let mut b = CircuitBuilder::new(5);
        b.input(2, 2).unwrap();
        b.input(4, 3).unwrap();
        b.input(6, 4).unwrap();
        b.output(10, 5).unwrap();
        b.and(8, 2, 4, 6).unwrap();
        b.and(10, 8, 6, 7).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn true_output_forces_the_leaves() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        let outcome = assume(&circuit, &mut map, 5, true, true);
        assert_eq!(outcome, Propagation::Consistent);
        assert_eq!(map.committed(4), Some(true));
        assert_eq!(map.committed(1), Some(true));
        assert_eq!(map.committed(2), Some(true));
        assert_eq!(map.committed(3), Some(true));
    }

    #[test]
    fn contradictory_assumptions_conflict() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        assert_eq!(
            assume(&circuit, &mut map, 4, true, true),
            Propagation::Consistent
        );
        assert!(assume(&circuit, &mut map, 2, false, false).is_conflict());
    }

    #[test]
    fn false_output_with_ambiguous_cause_stays_free() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        let outcome = assume(&circuit, &mut map, 4, false, true);
        assert_eq!(outcome, Propagation::Consistent);
        assert!(map.is_free(1));
        assert!(map.is_free(2));
    }

    #[test]
    fn false_output_with_known_sibling_forces_the_other_input() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        assert_eq!(
            assume(&circuit, &mut map, 2, true, false),
            Propagation::Consistent
        );
        let outcome = assume(&circuit, &mut map, 4, false, true);
        assert_eq!(outcome, Propagation::Consistent);
        assert_eq!(map.committed(1), Some(false));
    }

    #[test]
    fn forward_propagation_through_consumers() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        // A false input zeroes the whole chain.
        let outcome = assume(&circuit, &mut map, 1, false, false);
        assert_eq!(outcome, Propagation::Consistent);
        assert_eq!(map.committed(4), Some(false));
        assert_eq!(map.committed(5), Some(false));
    }

    #[test]
    fn forward_needs_both_terms_for_a_true_output() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        assert_eq!(
            assume(&circuit, &mut map, 1, true, false),
            Propagation::Consistent
        );
        assert!(map.is_free(4));
        assert_eq!(
            assume(&circuit, &mut map, 2, true, false),
            Propagation::Consistent
        );
        assert_eq!(map.committed(4), Some(true));
        // 5 still needs input 3.
        assert!(map.is_free(5));
    }

    #[test]
    fn initial_seed_keeps_its_fanout_side_free() {
        let circuit = and_chain();
        let mut map = AssignmentMap::new();

        assert_eq!(
            assume(&circuit, &mut map, 3, true, false),
            Propagation::Consistent
        );
        // The seed's consumers are the caller's business...
        assert_eq!(
            assume(&circuit, &mut map, 4, true, true),
            Propagation::Consistent
        );
        assert!(map.is_free(5));

        // ... but the same commit without the flag reaches them.
        let mut map = AssignmentMap::new();
        assert_eq!(
            assume(&circuit, &mut map, 3, true, false),
            Propagation::Consistent
        );
        assert_eq!(
            assume(&circuit, &mut map, 4, true, false),
            Propagation::Consistent
        );
        assert_eq!(map.committed(5), Some(true));
    }

    #[test]
    fn forcing_the_constant_gate_high_conflicts() {
        // 2 = 1 AND true(constant complemented).
        let mut b = CircuitBuilder::new(2);
        b.input(2, 2).unwrap();
        b.output(4, 3).unwrap();
        b.and(4, 2, 0, 4).unwrap(); // fanin1 is the constant, plain
        let circuit = b.build().unwrap();

        // 2 = 1 AND 0 true would need the constant high.
        let mut map = AssignmentMap::new();
        assert!(assume(&circuit, &mut map, 2, true, true).is_conflict());
    }

    #[test]
    fn self_conflicting_cone_is_detected_immediately() {
        // out = (1 AND 2) AND (1 AND !2): assuming it true forces input 2 both
        // ways.
        let mut b = CircuitBuilder::new(7);
        b.input(2, 2).unwrap();
        b.input(4, 3).unwrap();
        b.output(14, 4).unwrap();
        b.and(6, 2, 4, 5).unwrap(); // 3 = 1 AND 2
        b.and(8, 2, 5, 6).unwrap(); // 4 = 1 AND !2
        b.and(14, 6, 8, 7).unwrap(); // 7 = 3 AND 4
        let circuit = b.build().unwrap();

        let mut map = AssignmentMap::new();
        assert!(assume(&circuit, &mut map, 7, true, true).is_conflict());
    }

    #[test]
    fn disagreements_between_maps() {
        let mut a = AssignmentMap::new();
        let mut b = AssignmentMap::new();
        a.fill(1, true);
        a.fill(2, false);
        a.fill(3, true);
        b.fill(1, false);
        b.fill(2, false);
        b.fill(4, true);

        assert_eq!(a.disagreements(&b), vec![1]);
        assert_eq!(b.disagreements(&a), vec![1]);
        assert!(a.disagreements(&a).is_empty());
    }
}
