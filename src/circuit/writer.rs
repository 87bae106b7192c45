use std::fmt::Write;

use super::{Circuit, Gate, Result};

impl Circuit {
    /// Serializes the circuit in ASCII AAG form.
    ///
    /// The body lists inputs, then output fanins, then AND gate triples in the
    /// canonical topological order of the output cone. AND gates that are not
    /// reachable from any output are dropped, and the declared AND count is
    /// reduced accordingly; the maximum variable index is kept as declared.
    /// Retained symbolic names are reproduced, followed by the `c` terminator
    /// and a comment line.
    pub fn to_aag(&self) -> Result<String> {
        let reachable_ands: Vec<_> = self
            .topological_sort()?
            .into_iter()
            .filter(|g| g.borrow().is_and())
            .collect();

        let mut out = String::new();
        writeln!(
            out,
            "aag {} {} 0 {} {}",
            self.max_var(),
            self.inputs().len(),
            self.outputs().len(),
            reachable_ands.len()
        )
        .unwrap();

        for input in self.inputs() {
            writeln!(out, "{}", input.borrow().id() * 2).unwrap();
        }
        for output in self.outputs() {
            writeln!(out, "{}", output.borrow().fanins()[0].literal()).unwrap();
        }
        for gate in &reachable_ands {
            if let Gate::And {
                id, fanin0, fanin1, ..
            } = &*gate.borrow()
            {
                writeln!(out, "{} {} {}", id * 2, fanin0.literal(), fanin1.literal()).unwrap();
            }
        }

        for (index, input) in self.inputs().iter().enumerate() {
            if let Some(name) = input.borrow().symbol() {
                writeln!(out, "i{} {}", index, name).unwrap();
            }
        }
        for (index, output) in self.outputs().iter().enumerate() {
            if let Some(name) = output.borrow().symbol() {
                writeln!(out, "o{} {}", index, name).unwrap();
            }
        }

        writeln!(out, "c").unwrap();
        writeln!(out, "aag written by rewire").unwrap();
        Ok(out)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trip_is_isomorphic() {
        let source = "aag 5 2 0 1 2\n2\n4\n10\n6 2 4\n10 6 5\ni0 a\no0 y\nc\n";
        let circuit = Circuit::from_reader(source.as_bytes()).unwrap();
        let written = circuit.to_aag().unwrap();
        let reparsed = Circuit::from_reader(written.as_bytes()).unwrap();
        assert_eq!(circuit, reparsed);
    }

    #[test]
    fn unused_and_gates_are_dropped() {
        // Gate 4 = 1 AND 3 feeds nothing.
        let source = "aag 4 2 0 1 2\n2\n4\n6\n6 2 4\n8 2 6\nc\n";
        let circuit = Circuit::from_reader(source.as_bytes()).unwrap();
        assert_eq!(circuit.unused_ids(), vec![4]);

        let written = circuit.to_aag().unwrap();
        assert!(written.starts_with("aag 4 2 0 1 1\n"));
        assert!(!written.contains("8 2 6"));

        // The trimmed form still parses, without the unused gate.
        let reparsed = Circuit::from_reader(written.as_bytes()).unwrap();
        assert_eq!(reparsed.and_gates().len(), 1);
        assert!(reparsed.unused_ids().is_empty());
    }

    #[test]
    fn body_is_in_topological_order() {
        // Declared in reverse topological order on purpose.
        let source = "aag 6 2 0 1 3\n2\n4\n12\n12 10 8\n10 2 4\n8 2 5\nc\n";
        let circuit = Circuit::from_reader(source.as_bytes()).unwrap();
        let written = circuit.to_aag().unwrap();

        let and_lines: Vec<&str> = written
            .lines()
            .skip(4)
            .take(3)
            .collect();
        // Both fanins of 6 come before it.
        let position = |prefix: &str| {
            and_lines
                .iter()
                .position(|l| l.starts_with(prefix))
                .unwrap()
        };
        assert!(position("10 ") < position("12 "));
        assert!(position("8 ") < position("12 "));

        let reparsed = Circuit::from_reader(written.as_bytes()).unwrap();
        assert_eq!(circuit, reparsed);
    }

    #[test]
    fn symbols_survive_the_round_trip() {
        let source = "aag 3 2 0 1 1\n2\n4\n6\n6 2 4\ni0 lhs\ni1 rhs\no0 conj\nc\n";
        let circuit = Circuit::from_reader(source.as_bytes()).unwrap();
        let written = circuit.to_aag().unwrap();
        assert!(written.contains("i0 lhs\n"));
        assert!(written.contains("i1 rhs\n"));
        assert!(written.contains("o0 conj\n"));
        let reparsed = Circuit::from_reader(written.as_bytes()).unwrap();
        assert_eq!(circuit, reparsed);
    }
}
