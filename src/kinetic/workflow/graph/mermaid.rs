// SPDX-License-Identifier: MIT

//! Mermaid flowchart rendering of compiled graphs

use std::fmt::Write;

use super::executor::CompiledGraph;
use super::types::{Edge, END, START};

impl CompiledGraph {
    /// Render the graph as a Mermaid `flowchart TD`
    ///
    /// Conditional edges are dashed and labelled with their route key.
    pub fn to_mermaid(&self) -> String {
        let mut out = String::from("flowchart TD\n");
        let _ = writeln!(out, "    {}([start])", node_id(START));
        for name in self.step_names() {
            let _ = writeln!(out, "    {}[{}]", node_id(name), name);
        }
        let _ = writeln!(out, "    {}([end])", node_id(END));

        let mut sources: Vec<&str> = vec![START];
        sources.extend(self.step_names());
        for from in sources {
            match self.edges().get(from) {
                Some(Edge::Fixed(to)) => {
                    let _ = writeln!(out, "    {} --> {}", node_id(from), node_id(to));
                }
                Some(Edge::Conditional { routes, .. }) => {
                    let mut routes: Vec<_> = routes.iter().collect();
                    routes.sort();
                    for (key, to) in routes {
                        let _ = writeln!(out, "    {} -.->|{}| {}", node_id(from), key, node_id(to));
                    }
                }
                None => {}
            }
        }
        out
    }
}

fn node_id(name: &str) -> String {
    match name {
        START => "START".to_string(),
        END => "END".to_string(),
        other => other.replace(|c: char| !c.is_ascii_alphanumeric() && c != '_', "_"),
    }
}
