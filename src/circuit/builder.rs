use std::{cell::RefCell, collections::BTreeMap, rc::Rc};

use super::{
    Circuit, CircuitError, FaninId, Gate, GateEdge, GateRef, LoaderError, NodeId, Result,
};

/// Builds a [`Circuit`] from declared counts and literal lists.
///
/// Gates are declared first ([`input`], [`output`], [`and`]) and connected in a
/// single resolution pass when [`build`] is called. Fanins may therefore
/// reference gates in any order; gates are created with dummy edges to the
/// constant gate and rewired once every definition is known. A reference to an
/// id that is never defined synthesizes a shared placeholder and records the id
/// in the floating set.
///
/// [`input`]: CircuitBuilder::input
/// [`output`]: CircuitBuilder::output
/// [`and`]: CircuitBuilder::and
/// [`build`]: CircuitBuilder::build
///
/// ```rust
/// use rewire::CircuitBuilder;
/// let mut builder = CircuitBuilder::new(3);
/// builder.input(2, 2).unwrap();
/// builder.input(4, 3).unwrap();
/// builder.output(6, 4).unwrap();
/// builder.and(6, 2, 4, 5).unwrap(); // 3 = 1 AND 2
/// let circuit = builder.build().unwrap();
/// assert!(circuit.floating_ids().is_empty());
/// ```
pub struct CircuitBuilder {
    max_var: NodeId,
    gates: BTreeMap<NodeId, GateRef>,
    inputs: Vec<GateRef>,
    outputs: Vec<GateRef>,
    ands: Vec<GateRef>,
    /// Raw fanin references waiting for the connection pass.
    pending: Vec<(NodeId, FaninId, u64)>,
    constant: GateRef,
}

impl CircuitBuilder {
    /// A new builder for a circuit with the given maximum variable index
    /// (the constant gate is created right away).
    pub fn new(max_var: NodeId) -> Self {
        let constant: GateRef = Rc::new(RefCell::new(Gate::constant()));
        let gates = BTreeMap::from([(0, constant.clone())]);
        CircuitBuilder {
            max_var,
            gates,
            inputs: Vec::new(),
            outputs: Vec::new(),
            ands: Vec::new(),
            pending: Vec::new(),
            constant,
        }
    }

    fn register(&mut self, id: NodeId, gate: impl FnOnce() -> Gate) -> Result<GateRef> {
        if id == 0 {
            return Err(CircuitError::IdZeroReserved);
        }
        if self.gates.contains_key(&id) {
            return Err(CircuitError::DuplicateId(id));
        }
        let gate = Rc::new(RefCell::new(gate()));
        self.gates.insert(id, gate.clone());
        Ok(gate)
    }

    /// Declares a primary input from its literal. Inputs cannot be inverted,
    /// so odd literals are rejected.
    pub fn input(&mut self, literal: u64, line: u32) -> Result<()> {
        if literal & 1 == 1 {
            return Err(LoaderError::InvertedInput {
                line: line as usize,
                literal,
            }
            .into());
        }
        let id = literal >> 1;
        let gate = self.register(id, || Gate::input(id, line))?;
        self.inputs.push(gate);
        Ok(())
    }

    /// Declares a primary output from its fanin literal. The output gate
    /// itself gets a synthesized id above the maximum variable index.
    pub fn output(&mut self, literal: u64, line: u32) -> Result<()> {
        let id = self.max_var + 1 + self.outputs.len() as NodeId;
        let dummy = GateEdge::new(self.constant.clone(), false);
        let gate = self.register(id, || Gate::output(id, line, dummy))?;
        self.outputs.push(gate);
        self.pending.push((id, FaninId::Fanin0, literal));
        Ok(())
    }

    /// Declares an AND gate from its literal triple.
    pub fn and(&mut self, literal: u64, rhs0: u64, rhs1: u64, line: u32) -> Result<()> {
        if literal & 1 == 1 {
            return Err(LoaderError::InvalidToken {
                line: line as usize,
                msg: format!("and gate literal {} must be even", literal),
            }
            .into());
        }
        let id = literal >> 1;
        let dummy = GateEdge::new(self.constant.clone(), false);
        let gate = self.register(id, || Gate::and(id, line, dummy.clone(), dummy))?;
        self.ands.push(gate);
        self.pending.push((id, FaninId::Fanin0, rhs0));
        self.pending.push((id, FaninId::Fanin1, rhs1));
        Ok(())
    }

    /// Connection resolution: rewires every recorded fanin reference to its
    /// gate, synthesizing placeholders for undefined ids, then checks the
    /// integrity of the result.
    pub fn build(mut self) -> Result<Circuit> {
        let mut floating = Vec::new();

        for (consumer_id, slot, literal) in std::mem::take(&mut self.pending) {
            let target_id = literal >> 1;
            let complement = literal & 1 == 1;

            // Placeholders are memoized: repeated references to the same
            // undefined id share one gate, recorded once as floating.
            let target = match self.gates.get(&target_id) {
                Some(gate) => gate.clone(),
                None => {
                    let gate: GateRef = Rc::new(RefCell::new(Gate::undef(target_id)));
                    self.gates.insert(target_id, gate.clone());
                    floating.push(target_id);
                    gate
                }
            };

            let consumer = self
                .gates
                .get(&consumer_id)
                .cloned()
                .ok_or(CircuitError::NodeDoesNotExist(consumer_id))?;
            consumer
                .borrow_mut()
                .set_fanin(GateEdge::new(target.clone(), complement), slot);
            target
                .borrow_mut()
                .add_fanout(consumer_id, slot, Rc::downgrade(&consumer));
        }

        floating.sort_unstable();

        let circuit = Circuit {
            gates: self.gates,
            inputs: self.inputs,
            outputs: self.outputs,
            ands: self.ands,
            floating,
            max_var: self.max_var,
        };
        circuit.check_integrity()?;
        Ok(circuit)
    }
}
