use std::io::{Read, Write};

use serde::Serialize;
use tracing::warn;

pub mod bid;
pub mod config;
pub mod relay;
pub mod select;

/// One line of output: either the command's response or its error object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum Reply<T, E> {
    Ok(T),
    Err(E),
}

/// Whole of stdin. A read failure yields an empty request, which the
/// commands then answer with an error object.
pub fn read_stdin() -> String {
    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        warn!(error = %err, "failed to read request from stdin");
        input.clear();
    }
    input
}

pub fn emit<T: Serialize>(reply: &T) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout().lock();
    serde_json::to_writer(&mut stdout, reply)?;
    writeln!(stdout)?;
    stdout.flush()?;
    Ok(())
}
