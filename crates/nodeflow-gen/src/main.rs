// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>

//! nodeflow-gen binary: reads a flow document (JSON) on stdin and writes
//! the generated standalone Rust module to stdout.

use std::io::Read;

use anyhow::{Context, Result};

use nodeflow_core::FlowDoc;

fn main() -> Result<()> {
    let mut input = String::new();
    std::io::stdin()
        .read_to_string(&mut input)
        .context("reading flow document from stdin")?;
    let doc: FlowDoc = serde_json::from_str(&input).context("parsing flow document")?;
    let code = nodeflow_gen::generate(&doc).context("loading flow graph")?;
    print!("{code}");
    Ok(())
}
