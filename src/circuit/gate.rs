use std::{
    cell::RefCell,
    rc::{Rc, Weak},
};

use super::{FaninId, GateEdge};

/// A gate id.
///
/// The constant gate [`Gate::Const0`] has id 0 by convention (literal / 2 of the
/// exchange format). Ids must be unique across a circuit.
pub type NodeId = u64;

/// A wrapper for gates to allow multiple references to them.
pub type GateRef = Rc<RefCell<Gate>>;

/// A non-counting reference to a gate - used for fanout back-references.
pub(crate) type GateWeak = Weak<RefCell<Gate>>;

/// A fanout back-reference: the consuming gate and which of its inputs we feed.
///
/// Back-references are weak on purpose: ownership of gates stays with the
/// circuit's id table, fanouts are only used for upward traversal.
#[derive(Debug, Clone)]
pub struct Fanout {
    pub id: NodeId,
    pub slot: FaninId,
    pub(crate) gate: GateWeak,
}

/// A circuit gate.
///
/// Each gate has an id. By convention, id 0 is reserved for [`Gate::Const0`].
/// Gates that can be referenced as a fanin (everything but outputs) carry their
/// fanout back-references with them - the builder keeps these in sync with the
/// fanin edges.
#[derive(Debug, Clone)]
pub enum Gate {
    /// The constant low signal.
    Const0 { fanouts: Vec<Fanout> },
    /// A primary input.
    Input {
        id: NodeId,
        line: u32,
        symbol: Option<String>,
        fanouts: Vec<Fanout>,
    },
    /// A primary output: a pure observation point with a single fanin.
    Output {
        id: NodeId,
        line: u32,
        symbol: Option<String>,
        fanin: GateEdge,
    },
    /// A two-input AND gate.
    And {
        id: NodeId,
        line: u32,
        fanin0: GateEdge,
        fanin1: GateEdge,
        fanouts: Vec<Fanout>,
    },
    /// A placeholder for a gate that was referenced but never defined.
    Undef { id: NodeId, fanouts: Vec<Fanout> },
}

impl PartialEq for Gate {
    /// Structural equality: ids, fanin edges and symbols. Fanout back-references
    /// are redundant with the fanin edges and are ignored.
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Gate::Const0 { .. }, Gate::Const0 { .. }) => true,
            (
                Gate::Input {
                    id: id1,
                    symbol: s1,
                    ..
                },
                Gate::Input {
                    id: id2,
                    symbol: s2,
                    ..
                },
            ) => id1 == id2 && s1 == s2,
            (
                Gate::Output {
                    id: id1,
                    fanin: f1,
                    symbol: s1,
                    ..
                },
                Gate::Output {
                    id: id2,
                    fanin: f2,
                    symbol: s2,
                    ..
                },
            ) => id1 == id2 && f1 == f2 && s1 == s2,
            (
                Gate::And {
                    id: id1,
                    fanin0: a0,
                    fanin1: a1,
                    ..
                },
                Gate::And {
                    id: id2,
                    fanin0: b0,
                    fanin1: b1,
                    ..
                },
            ) => id1 == id2 && a0 == b0 && a1 == b1,
            (Gate::Undef { id: id1, .. }, Gate::Undef { id: id2, .. }) => id1 == id2,
            (_, _) => false,
        }
    }
}

impl Eq for Gate {}

impl Gate {
    /// Returns a new constant gate (initialize empty fanouts).
    pub fn constant() -> Self {
        Gate::Const0 {
            fanouts: Vec::new(),
        }
    }

    /// Returns a new primary input.
    pub fn input(id: NodeId, line: u32) -> Self {
        if id == 0 {
            panic!("id=0 is reserved for the constant gate Gate::Const0");
        }
        Gate::Input {
            id,
            line,
            symbol: None,
            fanouts: Vec::new(),
        }
    }

    /// Returns a new primary output.
    pub fn output(id: NodeId, line: u32, fanin: GateEdge) -> Self {
        if id == 0 {
            panic!("id=0 is reserved for the constant gate Gate::Const0");
        }
        Gate::Output {
            id,
            line,
            symbol: None,
            fanin,
        }
    }

    /// Returns a new AND gate (initialize empty fanouts).
    pub fn and(id: NodeId, line: u32, fanin0: GateEdge, fanin1: GateEdge) -> Self {
        if id == 0 {
            panic!("id=0 is reserved for the constant gate Gate::Const0");
        }
        Gate::And {
            id,
            line,
            fanin0,
            fanin1,
            fanouts: Vec::new(),
        }
    }

    /// Returns a new undefined placeholder.
    pub fn undef(id: NodeId) -> Self {
        Gate::Undef {
            id,
            fanouts: Vec::new(),
        }
    }

    pub fn is_const0(&self) -> bool {
        matches!(self, Gate::Const0 { .. })
    }

    pub fn is_input(&self) -> bool {
        matches!(self, Gate::Input { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Gate::Output { .. })
    }

    pub fn is_and(&self) -> bool {
        matches!(self, Gate::And { .. })
    }

    pub fn is_undef(&self) -> bool {
        matches!(self, Gate::Undef { .. })
    }

    pub fn id(&self) -> NodeId {
        match self {
            Gate::Const0 { .. } => 0,
            Gate::Input { id, .. } => *id,
            Gate::Output { id, .. } => *id,
            Gate::And { id, .. } => *id,
            Gate::Undef { id, .. } => *id,
        }
    }

    /// Declaration line of the gate in the source file, 0 for synthesized gates.
    pub fn line(&self) -> u32 {
        match self {
            Gate::Input { line, .. } | Gate::Output { line, .. } | Gate::And { line, .. } => *line,
            _ => 0,
        }
    }

    pub fn symbol(&self) -> Option<&str> {
        match self {
            Gate::Input { symbol, .. } | Gate::Output { symbol, .. } => symbol.as_deref(),
            _ => None,
        }
    }

    pub(super) fn set_symbol(&mut self, name: String) {
        if let Gate::Input { symbol, .. } | Gate::Output { symbol, .. } = self {
            *symbol = Some(name);
        }
    }

    pub fn fanins(&self) -> Vec<GateEdge> {
        match self {
            Gate::Output { fanin, .. } => vec![fanin.clone()],
            Gate::And { fanin0, fanin1, .. } => vec![fanin0.clone(), fanin1.clone()],
            _ => vec![],
        }
    }

    /// The selected fanin edge, if the gate has one at this slot.
    pub fn fanin(&self, slot: FaninId) -> Option<GateEdge> {
        match (self, slot) {
            (Gate::Output { fanin, .. }, FaninId::Fanin0) => Some(fanin.clone()),
            (Gate::And { fanin0, .. }, FaninId::Fanin0) => Some(fanin0.clone()),
            (Gate::And { fanin1, .. }, FaninId::Fanin1) => Some(fanin1.clone()),
            _ => None,
        }
    }

    pub fn fanouts(&self) -> &[Fanout] {
        match self {
            Gate::Const0 { fanouts }
            | Gate::Input { fanouts, .. }
            | Gate::And { fanouts, .. }
            | Gate::Undef { fanouts, .. } => fanouts,
            Gate::Output { .. } => &[],
        }
    }

    /// Registers a consumer of this gate. Outputs are never referenced, so
    /// pushing a fanout onto one is an invariant breach handled by the
    /// builder's integrity check rather than here.
    pub(super) fn add_fanout(&mut self, id: NodeId, slot: FaninId, gate: GateWeak) {
        match self {
            Gate::Const0 { fanouts }
            | Gate::Input { fanouts, .. }
            | Gate::And { fanouts, .. }
            | Gate::Undef { fanouts, .. } => fanouts.push(Fanout { id, slot, gate }),
            Gate::Output { .. } => (),
        }
    }

    /// Replaces the fanin edge at the given slot. Fanout bookkeeping is the
    /// caller's (the builder's) responsibility: the connection pass installs
    /// edges over the dummy constant edges exactly once.
    pub(super) fn set_fanin(&mut self, edge: GateEdge, slot: FaninId) {
        match (self, slot) {
            (Gate::Output { fanin, .. }, FaninId::Fanin0) => *fanin = edge,
            (Gate::And { fanin0, .. }, FaninId::Fanin0) => *fanin0 = edge,
            (Gate::And { fanin1, .. }, FaninId::Fanin1) => *fanin1 = edge,
            _ => (),
        }
    }
}

#[cfg(test)]
mod test {
    use std::{cell::RefCell, rc::Rc};

    use super::*;

    #[test]
    #[should_panic]
    fn invalid_input_id0() {
        let _ = Gate::input(0, 1);
    }

    #[test]
    #[should_panic]
    fn invalid_and_id0() {
        let nf = Rc::new(RefCell::new(Gate::constant()));
        let _ = Gate::and(
            0,
            1,
            GateEdge::new(nf.clone(), false),
            GateEdge::new(nf, false),
        );
    }

    #[test]
    fn fanin_slots() {
        let nf = Rc::new(RefCell::new(Gate::constant()));
        let i1 = Rc::new(RefCell::new(Gate::input(1, 2)));
        let g = Gate::and(
            2,
            3,
            GateEdge::new(i1.clone(), false),
            GateEdge::new(nf.clone(), true),
        );

        assert_eq!(g.fanin(FaninId::Fanin0).unwrap().id(), 1);
        assert_eq!(g.fanin(FaninId::Fanin1).unwrap().id(), 0);
        assert!(g.fanin(FaninId::Fanin1).unwrap().complement());
        assert_eq!(g.fanins().len(), 2);

        assert!(Gate::input(1, 2).fanin(FaninId::Fanin0).is_none());
    }

    #[test]
    fn gate_eq_ignores_fanouts() {
        let i1 = Rc::new(RefCell::new(Gate::input(1, 2)));
        let mut a = Gate::and(
            2,
            3,
            GateEdge::new(i1.clone(), false),
            GateEdge::new(i1.clone(), true),
        );
        let b = a.clone();
        a.add_fanout(5, FaninId::Fanin0, Rc::downgrade(&i1));
        assert_eq!(a, b);
    }
}
