//! Yes/no confirmation for destructive-adjacent operations.

use std::io::{BufRead, Write};

/// Only an explicit yes proceeds.
pub fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Write `question` to `output` and read one answer line from `input`.
///
/// End of input counts as "no".
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    question: &str,
) -> std::io::Result<bool> {
    write!(output, "{question} [y/N] ")?;
    output.flush()?;
    let mut answer = String::new();
    if input.read_line(&mut answer)? == 0 {
        writeln!(output)?;
        return Ok(false);
    }
    Ok(is_affirmative(&answer))
}
