//! Human-readable graph dumps for diagnostics and test failure output.

use std::fmt::{self, Write as _};

use crate::graph::Graph;
use crate::ids::{BlockId, NodeId};
use crate::ops::OpKind;
use crate::types::Constant;

impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_block(f, self, self.top(), 0)
    }
}

/// Render one node on a single line, e.g. `%3 = add(%1, %2)`.
pub fn describe_node(g: &Graph, n: NodeId) -> String {
    let mut s = String::new();
    let outs: Vec<String> = g
        .outputs(n)
        .iter()
        .map(|v| format!("%{}", v.raw()))
        .collect();
    if !outs.is_empty() {
        let _ = write!(s, "{} = ", outs.join(", "));
    }
    let _ = write!(s, "{}", g.kind(n).mnemonic());
    if let OpKind::Constant(c) = g.kind(n) {
        match c {
            Constant::Int(i) => {
                let _ = write!(s, "[{i}]");
            }
            Constant::Float(bits) => {
                let _ = write!(s, "[{}]", f64::from_bits(*bits));
            }
            Constant::Bool(b) => {
                let _ = write!(s, "[{b}]");
            }
        }
    }
    let ins: Vec<String> = g
        .inputs(n)
        .iter()
        .map(|v| format!("%{}", v.raw()))
        .collect();
    let _ = write!(s, "({})", ins.join(", "));
    s
}

fn write_block(f: &mut fmt::Formatter<'_>, g: &Graph, b: BlockId, depth: usize) -> fmt::Result {
    let indent = "  ".repeat(depth);
    let params: Vec<String> = g
        .block_params(b)
        .iter()
        .map(|v| format!("%{}", v.raw()))
        .collect();
    writeln!(f, "{indent}block({}) {{", params.join(", "))?;
    for &n in g.body(b) {
        writeln!(f, "{indent}  {}", describe_node(g, n))?;
        for &nested in g.node_blocks(n) {
            write_block(f, g, nested, depth + 2)?;
        }
    }
    let outs: Vec<String> = g
        .block_outputs(b)
        .iter()
        .map(|v| format!("%{}", v.raw()))
        .collect();
    writeln!(f, "{indent}  return({})", outs.join(", "))?;
    writeln!(f, "{indent}}}")
}
