//! The redundancy addition and removal search.
//!
//! For every AND gate `wt` (the target wire), [`find_alternatives`] looks for
//! connections that can substitute for `wt`'s output signal:
//!
//! 1. compute the dependent-gate set of `wt` ([`gd_set`]): the fanout chains
//!    whose justification is unconditionally tied to `wt`,
//! 2. excite the target (`wt` high, every chain side input non-controlling)
//!    through the mandatory-assignment engine, then confirm feasibility with
//!    one SAT query,
//! 3. per dependent gate, look for another gate whose mandatory value under
//!    the excitation suffices on its own to force the same justification: a
//!    combined query that comes back unsatisfiable names an alternative wire,
//!    a satisfiable one with a disagreeing third gate names an alternative
//!    gate pair.
//!
//! The search is first-match: a target stops as soon as one alternative is
//! found. An infeasible excitation means the target can never be justified in
//! the first place - its output wires are redundant as-is and the target is
//! reported untestable.

use std::collections::HashSet;
use std::fmt;

use log::debug;

use crate::cnf::{SatEngine, VarMap, encode_circuit};
use crate::ma::{self, AssignmentMap, Propagation};
use crate::{Circuit, FaninId, Fanout, NodeId, Result};

/// A dependent gate: the consumer and which of its inputs the chain feeds.
pub type GdEntry = (NodeId, FaninId);

/// An alternative connection that can substitute for a target wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Alternative {
    /// `source`'s mandatory value alone forces the justification at `dest`
    /// that the target provided.
    Wire { source: NodeId, dest: NodeId },
    /// A two-point substitution achieving the same effect.
    GatePair {
        first: NodeId,
        second: NodeId,
        dest: NodeId,
    },
}

/// The outcome of the search for one target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The excitation assumption is infeasible: the target can never be
    /// justified and its output wires are redundant as-is.
    Untestable,
    Alternative(Alternative),
    /// No alternative found.
    Exhausted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetReport {
    pub target: NodeId,
    pub outcome: Outcome,
}

/// The report of a whole [`find_alternatives`] run, one entry per AND gate in
/// id order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RarReport {
    pub targets: Vec<TargetReport>,
}

impl RarReport {
    pub fn target_count(&self) -> usize {
        self.targets.len()
    }

    pub fn alternative_count(&self) -> usize {
        self.targets
            .iter()
            .filter(|t| matches!(t.outcome, Outcome::Alternative(_)))
            .count()
    }
}

impl fmt::Display for RarReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for report in &self.targets {
            match &report.outcome {
                Outcome::Untestable => {
                    writeln!(f, "untestable target: {}", report.target)?;
                }
                Outcome::Alternative(Alternative::Wire { source, dest }) => {
                    writeln!(
                        f,
                        "alternative wire: {} -> {} (target {})",
                        source, dest, report.target
                    )?;
                }
                Outcome::Alternative(Alternative::GatePair {
                    first,
                    second,
                    dest,
                }) => {
                    writeln!(
                        f,
                        "alternative gate: {} & {} -> {} (target {})",
                        first, second, dest, report.target
                    )?;
                }
                Outcome::Exhausted => (),
            }
        }
        write!(
            f,
            "#targets: {} #alternatives: {}",
            self.target_count(),
            self.alternative_count()
        )
    }
}

/// The fanout closure of one fanout edge, through AND consumers only,
/// recording for each gate which input its chain parent feeds.
fn fanout_chain(seed: &Fanout) -> Vec<GdEntry> {
    let mut chain = Vec::new();
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut stack: Vec<Fanout> = vec![seed.clone()];

    while let Some(fanout) = stack.pop() {
        let Some(consumer) = fanout.gate.upgrade() else {
            continue;
        };
        if !consumer.borrow().is_and() || !visited.insert(fanout.id) {
            continue;
        }
        chain.push((fanout.id, fanout.slot));
        for next in consumer.borrow().fanouts() {
            stack.push(next.clone());
        }
    }

    chain
}

/// The dependent-gate set of a gate: only gates common to the chains of *all*
/// of its fanout edges are kept (their forced value does not depend on which
/// consumer carries it), with the order and slots of the first chain. One
/// chain-less fanout edge empties the whole set.
pub fn gd_set(circuit: &Circuit, id: NodeId) -> Vec<GdEntry> {
    let Some(gate) = circuit.get_gate(id) else {
        return Vec::new();
    };
    let fanouts = gate.borrow().fanouts().to_vec();

    let mut chains = fanouts.iter().map(fanout_chain);
    let Some(mut gds) = chains.next() else {
        return Vec::new();
    };
    for chain in chains {
        let ids: HashSet<NodeId> = chain.into_iter().map(|(gd, _)| gd).collect();
        gds.retain(|(gd, _)| ids.contains(gd));
    }
    gds
}

/// Per chain entry, the assumption forcing the consumer's *other* input term
/// non-controlling (true).
fn side_assumptions(circuit: &Circuit, gds: &[GdEntry]) -> Vec<(NodeId, bool)> {
    let mut assumptions = Vec::new();
    for &(gd, slot) in gds {
        let Some(gate) = circuit.get_gate(gd) else {
            continue;
        };
        let side = gate.borrow().fanin(slot.sibling());
        if let Some(side) = side {
            assumptions.push((side.id(), side.controlling_high()));
        }
    }
    assumptions
}

/// Commits an assumption list through the mandatory-assignment engine. Only
/// the first assumption is the seed of its propagation context.
fn apply_assumptions(
    circuit: &Circuit,
    map: &mut AssignmentMap,
    assumptions: &[(NodeId, bool)],
    first_is_seed: bool,
) -> Propagation {
    for (index, &(id, value)) in assumptions.iter().enumerate() {
        let initial = first_is_seed && index == 0;
        if ma::assume(circuit, map, id, value, initial).is_conflict() {
            return Propagation::Conflict;
        }
    }
    Propagation::Consistent
}

fn assumption_lits(vars: &VarMap, assumptions: &[(NodeId, bool)]) -> Vec<varisat::Lit> {
    assumptions
        .iter()
        .filter_map(|&(id, value)| vars.lit(id, value))
        .collect()
}

fn chain_ids(gds: &[GdEntry]) -> Vec<NodeId> {
    gds.iter().map(|&(gd, _)| gd).collect()
}

fn is_direct_fanin(circuit: &Circuit, consumer: NodeId, id: NodeId) -> bool {
    circuit
        .get_gate(consumer)
        .is_some_and(|gate| gate.borrow().fanins().iter().any(|edge| edge.id() == id))
}

fn search_target(
    circuit: &Circuit,
    engine: &mut SatEngine,
    vars: &VarMap,
    candidates: &[NodeId],
    wt: NodeId,
) -> Result<Outcome> {
    let gds = gd_set(circuit, wt);

    // Excitation: the target justified high, every dependent gate's side
    // input non-controlling.
    let mut ma_wt = AssignmentMap::new();
    let mut excitation = vec![(wt, true)];
    excitation.extend(side_assumptions(circuit, &gds));

    let feasible = if apply_assumptions(circuit, &mut ma_wt, &excitation, true).is_conflict() {
        false
    } else {
        engine.assume(&assumption_lits(vars, &excitation));
        let satisfiable =
            engine.solve_with_justification(vars, &mut ma_wt, &chain_ids(&gds))?;
        engine.release();
        satisfiable
    };
    if !feasible {
        debug!("target {}: excitation infeasible", wt);
        return Ok(Outcome::Untestable);
    }

    for &(gd, _) in &gds {
        // The dependent gate's own mandatory assignment, independent of wt.
        let mut ma_gd = AssignmentMap::new();
        if ma::assume(circuit, &mut ma_gd, gd, true, true).is_conflict() {
            continue;
        }

        // Every gate committed under the excitation but free under the
        // dependent gate is a substitution candidate.
        for &w3 in candidates {
            let Some(value) = ma_wt.committed(w3) else {
                continue;
            };
            if ma_gd.committed(w3).is_some() {
                continue;
            }

            let gds3 = gd_set(circuit, w3);
            let mut combined = ma_gd.clone();
            let mut assumptions = vec![(gd, true), (w3, value)];
            assumptions.extend(side_assumptions(circuit, &gds3));

            // (gd, true) is already committed in the clone; applying the rest
            // layers the candidate and its own chain on top.
            let satisfiable =
                if apply_assumptions(circuit, &mut combined, &assumptions[1..], false)
                    .is_conflict()
                {
                    false
                } else {
                    engine.assume(&assumption_lits(vars, &assumptions));
                    let satisfiable =
                        engine.solve_with_justification(vars, &mut combined, &chain_ids(&gds3))?;
                    engine.release();
                    satisfiable
                };

            if !satisfiable {
                // The target itself through the same input is not a genuine
                // alternative.
                if w3 != wt || !is_direct_fanin(circuit, gd, w3) {
                    debug!("target {}: alternative wire {} -> {}", wt, w3, gd);
                    return Ok(Outcome::Alternative(Alternative::Wire {
                        source: w3,
                        dest: gd,
                    }));
                }
            } else {
                for w4 in combined.disagreements(&ma_wt) {
                    if w3 != wt && w4 != wt {
                        debug!(
                            "target {}: alternative gate pair {} & {} -> {}",
                            wt, w3, w4, gd
                        );
                        return Ok(Outcome::Alternative(Alternative::GatePair {
                            first: w3,
                            second: w4,
                            dest: gd,
                        }));
                    }
                }
            }
        }
    }

    Ok(Outcome::Exhausted)
}

/// Enumerates alternative connections for every AND gate of the circuit.
///
/// The circuit is encoded into the SAT engine once; every query afterwards is
/// incremental, bracketed by assume/release.
pub fn find_alternatives(circuit: &Circuit) -> Result<RarReport> {
    let mut engine = SatEngine::new();
    let vars = encode_circuit(circuit, &mut engine);

    // Substitution candidates, in id order. The constant gate is not a signal
    // to reroute; outputs never carry a mandatory value.
    let candidates: Vec<NodeId> = circuit
        .gates()
        .filter(|(id, gate)| *id != 0 && !gate.borrow().is_output())
        .map(|(id, _)| id)
        .collect();

    let mut report = RarReport::default();
    for (id, gate) in circuit.gates() {
        if !gate.borrow().is_and() {
            continue;
        }
        debug!("searching alternatives for target {}", id);
        let outcome = search_target(circuit, &mut engine, &vars, &candidates, id)?;
        report.targets.push(TargetReport {
            target: id,
            outcome,
        });
    }

    debug!(
        "rar search done: {} targets, {} alternatives",
        report.target_count(),
        report.alternative_count()
    );
    Ok(report)
}
