//! Message reducer for streamed assistant output
//!
//! Fragments arrive in order over the chat socket and are appended to the
//! most recent assistant turn. A fragment carrying a code fence marker while
//! no fence is open gets a synthesized fence header, because the runtime
//! does not transmit a language for code blocks.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::conversation::{Role, Turn};

pub const FENCE: &str = "```";

/// How the reducer decides whether a turn is already inside a code fence
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FenceDetection {
    /// Any fence marker in the existing content counts as an open fence.
    ///
    /// A turn that already opened and closed a block is still treated as
    /// open, so a later block does not get a header.
    #[default]
    Presence,
    /// An odd number of fence markers means a fence is open
    Parity,
}

impl FenceDetection {
    fn is_open(self, content: &str) -> bool {
        match self {
            FenceDetection::Presence => content.contains(FENCE),
            FenceDetection::Parity => content.matches(FENCE).count() % 2 == 1,
        }
    }
}

impl FromStr for FenceDetection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "presence" => Ok(FenceDetection::Presence),
            "parity" => Ok(FenceDetection::Parity),
            other => Err(format!("unknown fence detection mode: {}", other)),
        }
    }
}

impl fmt::Display for FenceDetection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FenceDetection::Presence => f.write_str("presence"),
            FenceDetection::Parity => f.write_str("parity"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reducer {
    code_language: String,
    detection: FenceDetection,
}

impl Default for Reducer {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_CODE_LANGUAGE, FenceDetection::default())
    }
}

impl Reducer {
    pub fn new(code_language: impl Into<String>, detection: FenceDetection) -> Self {
        Self {
            code_language: code_language.into(),
            detection,
        }
    }

    /// Header written in front of a fragment that opens a fence
    pub fn fence_header(&self) -> String {
        format!("{}{}\n", FENCE, self.code_language)
    }

    /// Apply one streamed fragment to the turn list.
    ///
    /// Only the last turn can change, and only if it is an assistant turn;
    /// otherwise a new assistant turn holding the raw fragment is appended.
    pub fn reduce(&self, mut turns: Vec<Turn>, fragment: &str) -> Vec<Turn> {
        let target = match turns.last_mut() {
            Some(turn) if turn.role == Role::Assistant => turn,
            _ => {
                turns.push(Turn::assistant(fragment));
                return turns;
            }
        };

        if fragment.contains(FENCE) && !self.detection.is_open(&target.content) {
            target.content.push_str(&self.fence_header());
            target.content.push_str(&fragment.replacen(FENCE, "", 1));
        } else {
            target.content.push_str(fragment);
        }

        turns
    }
}
