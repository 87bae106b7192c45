use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
};

use log::info;

use super::{Circuit, CircuitBuilder, LoaderError, Result};

fn read_u64(s: &str, line: usize) -> std::result::Result<u64, LoaderError> {
    s.parse::<u64>().map_err(|_| LoaderError::InvalidToken {
        line,
        msg: format!("{} expected u64", s),
    })
}

fn check_range(literal: u64, max_var: u64, line: usize) -> std::result::Result<(), LoaderError> {
    if literal >> 1 > max_var {
        return Err(LoaderError::LiteralOutOfRange {
            line,
            literal,
            max_var,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Header {
    max_var: u64,
    inputs: u64,
    latches: u64,
    outputs: u64,
    ands: u64,
}

impl Header {
    fn parse(line: &str, lineno: usize) -> std::result::Result<Self, LoaderError> {
        let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();

        if tokens.len() != 6 {
            return Err(LoaderError::InvalidToken {
                line: lineno,
                msg: "header must be `aag M I L O A`".to_string(),
            });
        }

        if tokens[0] != "aag" {
            return Err(LoaderError::InvalidToken {
                line: lineno,
                msg: format!("expected aag format tag, got {}", tokens[0]),
            });
        }

        let header = Header {
            max_var: read_u64(tokens[1], lineno)?,
            inputs: read_u64(tokens[2], lineno)?,
            latches: read_u64(tokens[3], lineno)?,
            outputs: read_u64(tokens[4], lineno)?,
            ands: read_u64(tokens[5], lineno)?,
        };

        if header.latches != 0 {
            return Err(LoaderError::Sequential(header.latches));
        }

        Ok(header)
    }
}

/// A line holding a single literal (input and output declarations).
fn read_literal(line: &str, lineno: usize) -> std::result::Result<u64, LoaderError> {
    let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();
    match tokens.as_slice() {
        [token] => read_u64(token, lineno),
        [] => Err(LoaderError::InvalidToken {
            line: lineno,
            msg: "expected literal, got nothing".to_string(),
        }),
        [_, extra, ..] => Err(LoaderError::InvalidToken {
            line: lineno,
            msg: format!("expected nothing after literal, got {}", extra),
        }),
    }
}

/// A line holding an AND gate triple `lhs rhs0 rhs1`.
fn read_and(line: &str, lineno: usize) -> std::result::Result<(u64, u64, u64), LoaderError> {
    let tokens = line.trim().split_whitespace().collect::<Vec<&str>>();
    if tokens.len() < 3 {
        return Err(LoaderError::InvalidToken {
            line: lineno,
            msg: "not enough and gate tokens".to_string(),
        });
    }
    if tokens.len() > 3 {
        return Err(LoaderError::InvalidToken {
            line: lineno,
            msg: format!("expected nothing after and gate tokens, got {}", tokens[3]),
        });
    }
    Ok((
        read_u64(tokens[0], lineno)?,
        read_u64(tokens[1], lineno)?,
        read_u64(tokens[2], lineno)?,
    ))
}

/// A trailing symbol line `i<index> <name>` or `o<index> <name>`.
fn read_symbol(line: &str, lineno: usize) -> std::result::Result<(char, usize, String), LoaderError> {
    let invalid = |msg: String| LoaderError::InvalidToken { line: lineno, msg };

    let (position, name) = line
        .trim_end()
        .split_once(' ')
        .ok_or_else(|| invalid("expected `i<index> <name>` or `o<index> <name>`".to_string()))?;

    let kind = position
        .chars()
        .next()
        .ok_or_else(|| invalid("empty symbol position".to_string()))?;
    if kind != 'i' && kind != 'o' {
        return Err(invalid(format!("expected symbol type i or o, got {}", kind)));
    }

    let index = position[1..]
        .parse::<usize>()
        .map_err(|_| invalid(format!("invalid symbol index {}", &position[1..])))?;

    if name.is_empty() {
        return Err(invalid("empty symbolic name".to_string()));
    }

    Ok((kind, index, name.to_string()))
}

struct Lines<R> {
    reader: BufReader<R>,
    buf: String,
    lineno: usize,
}

impl<R: Read> Lines<R> {
    fn new(reader: BufReader<R>) -> Self {
        Lines {
            reader,
            buf: String::new(),
            lineno: 0,
        }
    }

    fn next(&mut self) -> std::result::Result<Option<(&str, usize)>, LoaderError> {
        self.buf.clear();
        let n = self
            .reader
            .read_line(&mut self.buf)
            .map_err(|e| LoaderError::IoError(e.to_string()))?;
        self.lineno += 1;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some((self.buf.trim_end_matches('\n'), self.lineno)))
    }

    fn expect(&mut self) -> std::result::Result<(&str, usize), LoaderError> {
        let lineno = self.lineno;
        self.next()?.ok_or(LoaderError::InvalidToken {
            line: lineno + 1,
            msg: "unexpected end of file".to_string(),
        })
    }
}

impl Circuit {
    /// Creates a circuit from an open reader over the ASCII AAG format.
    pub fn from_reader(reader: impl Read) -> Result<Self> {
        let mut lines = Lines::new(BufReader::new(reader));

        let (line, lineno) = lines.expect()?;
        let header = Header::parse(line, lineno)?;
        let mut builder = CircuitBuilder::new(header.max_var);

        for _ in 0..header.inputs {
            let (line, lineno) = lines.expect()?;
            let literal = read_literal(line, lineno)?;
            check_range(literal, header.max_var, lineno)?;
            builder.input(literal, lineno as u32)?;
        }

        for _ in 0..header.outputs {
            let (line, lineno) = lines.expect()?;
            let literal = read_literal(line, lineno)?;
            check_range(literal, header.max_var, lineno)?;
            builder.output(literal, lineno as u32)?;
        }

        for _ in 0..header.ands {
            let (line, lineno) = lines.expect()?;
            let (lhs, rhs0, rhs1) = read_and(line, lineno)?;
            check_range(lhs, header.max_var, lineno)?;
            check_range(rhs0, header.max_var, lineno)?;
            check_range(rhs1, header.max_var, lineno)?;
            builder.and(lhs, rhs0, rhs1, lineno as u32)?;
        }

        let mut circuit = builder.build()?;

        // Trailing symbol lines, terminated by `c` (or the end of the file).
        // Everything after `c` is a comment.
        while let Some((line, lineno)) = lines.next()? {
            if line == "c" {
                break;
            }
            let (kind, index, name) = read_symbol(line, lineno)?;
            let applied = match kind {
                'i' => circuit.set_input_symbol(index, name),
                _ => circuit.set_output_symbol(index, name),
            };
            if applied.is_none() {
                return Err(LoaderError::SymbolOutOfRange {
                    line: lineno,
                    index,
                }
                .into());
            }
        }

        info!(
            "loaded circuit: {} inputs, {} outputs, {} and gates",
            circuit.inputs().len(),
            circuit.outputs().len(),
            circuit.and_gates().len()
        );

        Ok(circuit)
    }

    /// Creates a circuit from an .aag file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let f = File::open(path.as_ref()).map_err(|e| LoaderError::IoError(e.to_string()))?;
        Circuit::from_reader(f)
    }
}
