//! Incremental transcript printer
//!
//! Streaming only ever appends to the last turn or adds turns, so the
//! printer remembers how much it has written and emits just the tail.

use std::io::{self, Write};

use crate::conversation::Turn;

use super::{render_turn, role_prefix};

#[derive(Debug, Default)]
pub struct Transcript {
    printed_turns: usize,
    /// Bytes of the last printed turn already written
    printed_len: usize,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write whatever changed since the previous call
    pub fn sync<W: Write>(&mut self, turns: &[Turn], out: &mut W) -> io::Result<()> {
        if turns.len() < self.printed_turns {
            return self.redraw(turns, out);
        }

        if let Some(idx) = self.printed_turns.checked_sub(1) {
            let content = &turns[idx].content;
            if content.len() < self.printed_len || !content.is_char_boundary(self.printed_len) {
                return self.redraw(turns, out);
            }
            out.write_all(content[self.printed_len..].as_bytes())?;
            self.printed_len = content.len();
        }

        for turn in &turns[self.printed_turns..] {
            if self.printed_turns > 0 {
                writeln!(out)?;
            }
            write!(out, "{} {}", role_prefix(turn.role), turn.content)?;
            self.printed_turns += 1;
            self.printed_len = turn.content.len();
        }

        out.flush()
    }

    /// Print the whole list with styled code blocks
    pub fn redraw<W: Write>(&mut self, turns: &[Turn], out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        for (idx, turn) in turns.iter().enumerate() {
            if idx > 0 {
                writeln!(out)?;
            }
            write!(out, "{}", render_turn(turn))?;
        }
        self.printed_turns = turns.len();
        self.printed_len = turns.last().map(|t| t.content.len()).unwrap_or(0);
        out.flush()
    }

    /// Print a line outside the transcript, such as command output
    pub fn note<W: Write>(&mut self, line: &str, out: &mut W) -> io::Result<()> {
        writeln!(out)?;
        write!(out, "{}", line)?;
        out.flush()
    }
}
