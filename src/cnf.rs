//! The bridge between a circuit and the SAT engine.
//!
//! [`encode_circuit`] allocates one solver variable per gate (outputs are pure
//! observation points and get none) and registers the fixed three-clause
//! Tseitin encoding of every AND gate. This runs once per analysis; all later
//! queries are incremental, made of assumptions only.
//!
//! [`SatEngine`] is the only point of contact with the underlying solver
//! ([varisat], which supports incrementality via assume/solve). Every query
//! must be bracketed: assume, solve, [`release`] - otherwise the next query
//! observes stale assumptions.
//!
//! [`release`]: SatEngine::release

use std::collections::{BTreeMap, HashSet};

use varisat::{ExtendFormula, Lit, Solver};

use crate::ma::AssignmentMap;
use crate::{Circuit, CircuitError, Gate, NodeId, Result};

/// The gate to solver-variable mapping of one encoded circuit.
#[derive(Debug, Clone)]
pub struct VarMap {
    vars: BTreeMap<NodeId, Lit>,
}

impl VarMap {
    /// The (positive) literal of the gate, if the gate was encoded.
    /// Primary outputs are not part of the Boolean formula and have none.
    pub fn var(&self, id: NodeId) -> Option<Lit> {
        self.vars.get(&id).copied()
    }

    /// The literal asserting that the gate has the given value.
    pub fn lit(&self, id: NodeId, value: bool) -> Option<Lit> {
        self.var(id).map(|lit| if value { lit } else { !lit })
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }
}

/// A thin facade over the incremental SAT solver.
///
/// Clause memory is reused across queries; the assumption stack is a single
/// shared resource released between queries.
pub struct SatEngine<'a> {
    solver: Solver<'a>,
}

impl SatEngine<'_> {
    pub fn new() -> Self {
        SatEngine {
            solver: Solver::new(),
        }
    }

    pub fn new_var(&mut self) -> Lit {
        self.solver.new_lit()
    }

    /// Registers the clauses encoding `out = in0' AND in1'`, where each input
    /// literal is XORed with its inversion flag:
    /// (a | !out), (b | !out), (!a | !b | out).
    pub fn encode_and(&mut self, out: Lit, in0: Lit, inv0: bool, in1: Lit, inv1: bool) {
        let a = if inv0 { !in0 } else { in0 };
        let b = if inv1 { !in1 } else { in1 };
        self.solver.add_clause(&[a, !out]);
        self.solver.add_clause(&[b, !out]);
        self.solver.add_clause(&[!a, !b, out]);
    }

    pub fn add_unit(&mut self, lit: Lit) {
        self.solver.add_clause(&[lit]);
    }

    /// Sets the assumptions for the next [`solve`] calls.
    ///
    /// [`solve`]: SatEngine::solve
    pub fn assume(&mut self, assumptions: &[Lit]) {
        self.solver.assume(assumptions);
    }

    /// Releases the assumptions (and with them the cached assignment), so the
    /// next query starts clean.
    pub fn release(&mut self) {
        self.solver.assume(&[]);
    }

    pub fn solve(&mut self) -> Result<bool> {
        self.solver
            .solve()
            .map_err(|e| CircuitError::Sat(e.to_string()))
    }

    /// Solves under the current assumptions and, when satisfiable, back-fills
    /// the free entries of the assignment map with the values the solver
    /// derived for the listed gates.
    pub fn solve_with_justification(
        &mut self,
        vars: &VarMap,
        map: &mut AssignmentMap,
        interesting: &[NodeId],
    ) -> Result<bool> {
        let satisfiable = self.solve()?;
        if satisfiable {
            if let Some(model) = self.solver.model() {
                let model: HashSet<Lit> = model.into_iter().collect();
                for &id in interesting {
                    if map.committed(id).is_none() {
                        if let Some(lit) = vars.var(id) {
                            map.fill(id, model.contains(&lit));
                        }
                    }
                }
            }
        }
        Ok(satisfiable)
    }
}

impl Default for SatEngine<'_> {
    fn default() -> Self {
        SatEngine::new()
    }
}

/// Encodes the whole circuit into the engine: a fresh variable per gate in id
/// order (outputs excluded), a unit clause pinning the constant gate low, and
/// the AND clauses. Placeholder gates get a variable and no clauses - their
/// value is genuinely unconstrained.
pub fn encode_circuit(circuit: &Circuit, engine: &mut SatEngine) -> VarMap {
    let mut vars = BTreeMap::new();
    for (id, gate) in circuit.gates() {
        if gate.borrow().is_output() {
            continue;
        }
        vars.insert(id, engine.new_var());
    }

    engine.add_unit(!vars[&0]);

    for (id, gate) in circuit.gates() {
        if let Gate::And {
            fanin0, fanin1, ..
        } = &*gate.borrow()
        {
            engine.encode_and(
                vars[&id],
                vars[&fanin0.id()],
                fanin0.complement(),
                vars[&fanin1.id()],
                fanin1.complement(),
            );
        }
    }

    VarMap { vars }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::CircuitBuilder;

    fn conjunction() -> Circuit {
        // 3 = 1 AND 2, observed by one output.
        let mut b = CircuitBuilder::new(3);
        b.input(2, 2).unwrap();
        b.input(4, 3).unwrap();
        b.output(6, 4).unwrap();
        b.and(6, 2, 4, 5).unwrap();
        b.build().unwrap()
    }

    #[test]
    fn outputs_get_no_variable() {
        let circuit = conjunction();
        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);
        assert!(vars.var(1).is_some());
        assert!(vars.var(3).is_some());
        assert!(vars.var(4).is_none()); // the output gate
        assert_eq!(vars.len(), 4); // constant, two inputs, one and gate
    }

    #[test]
    fn constant_gate_is_pinned_low() {
        let circuit = conjunction();
        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);

        engine.assume(&[vars.lit(0, true).unwrap()]);
        assert!(!engine.solve().unwrap());
        engine.release();
        assert!(engine.solve().unwrap());
    }

    #[test]
    fn contradiction_is_unsat() {
        // 2 = 1 AND !1 can never be true.
        let mut b = CircuitBuilder::new(2);
        b.input(2, 2).unwrap();
        b.output(4, 3).unwrap();
        b.and(4, 2, 3, 4).unwrap();
        let circuit = b.build().unwrap();

        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);

        engine.assume(&[vars.lit(2, true).unwrap()]);
        assert!(!engine.solve().unwrap());
        engine.release();

        engine.assume(&[vars.lit(2, false).unwrap()]);
        assert!(engine.solve().unwrap());
        engine.release();
    }

    #[test]
    fn and_semantics() {
        let circuit = conjunction();
        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);

        // Both inputs true with the gate false: impossible.
        engine.assume(&[
            vars.lit(1, true).unwrap(),
            vars.lit(2, true).unwrap(),
            vars.lit(3, false).unwrap(),
        ]);
        assert!(!engine.solve().unwrap());
        engine.release();

        // One input false with the gate true: impossible.
        engine.assume(&[vars.lit(1, false).unwrap(), vars.lit(3, true).unwrap()]);
        assert!(!engine.solve().unwrap());
        engine.release();
    }

    #[test]
    fn justification_fills_free_entries() {
        let circuit = conjunction();
        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);

        let mut map = AssignmentMap::new();
        engine.assume(&[vars.lit(1, true).unwrap(), vars.lit(2, true).unwrap()]);
        let satisfiable = engine
            .solve_with_justification(&vars, &mut map, &[3])
            .unwrap();
        engine.release();

        assert!(satisfiable);
        // Both inputs true force the and gate true in every model.
        assert_eq!(map.committed(3), Some(true));
    }

    #[test]
    fn repeated_queries_are_idempotent() {
        let circuit = conjunction();
        let mut engine = SatEngine::new();
        let vars = encode_circuit(&circuit, &mut engine);

        let mut results = Vec::new();
        let mut fills = Vec::new();
        for _ in 0..2 {
            let mut map = AssignmentMap::new();
            engine.assume(&[vars.lit(1, true).unwrap(), vars.lit(3, false).unwrap()]);
            results.push(
                engine
                    .solve_with_justification(&vars, &mut map, &[2])
                    .unwrap(),
            );
            fills.push(map.committed(2));
            engine.release();
        }
        assert_eq!(results[0], results[1]);
        assert_eq!(fills[0], fills[1]);
    }
}
