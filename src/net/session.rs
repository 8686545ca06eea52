use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::game::constants::net::{JOIN_CODE_ALPHABET, JOIN_CODE_LEN};
use crate::game::state::{PeerId, PlayerId};

/// Six-character join code shared out of band by the host
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionCode(String);

/// Join code parse failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodeError {
    #[error("join code must be {expected} characters, got {actual}")]
    WrongLength { expected: usize, actual: usize },
    #[error("join code contains invalid character '{0}'")]
    InvalidChar(char),
}

impl SessionCode {
    /// Generate a random code using the given RNG
    pub fn generate<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let code = (0..JOIN_CODE_LEN)
            .map(|_| JOIN_CODE_ALPHABET[rng.gen_range(0..JOIN_CODE_ALPHABET.len())] as char)
            .collect();
        Self(code)
    }

    /// Generate a code for which `taken` returns false
    pub fn generate_unique<R, F>(rng: &mut R, taken: F) -> Self
    where
        R: Rng + ?Sized,
        F: Fn(&SessionCode) -> bool,
    {
        loop {
            let code = Self::generate(rng);
            if !taken(&code) {
                return code;
            }
        }
    }

    /// Parse user input: trims, uppercases, then validates length and alphabet
    pub fn parse(input: &str) -> Result<Self, CodeError> {
        let normalized = input.trim().to_ascii_uppercase();
        let actual = normalized.chars().count();
        if actual != JOIN_CODE_LEN {
            return Err(CodeError::WrongLength {
                expected: JOIN_CODE_LEN,
                actual,
            });
        }
        if let Some(bad) = normalized
            .chars()
            .find(|c| !c.is_ascii() || !JOIN_CODE_ALPHABET.contains(&(*c as u8)))
        {
            return Err(CodeError::InvalidChar(bad));
        }
        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for SessionCode {
    type Err = CodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// How the starting peer participates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionMode {
    /// Host plays with an avatar of its own
    Host,
    /// Dedicated authority, no avatar
    Server,
}

/// Handle returned to a peer that started or joined a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTicket {
    pub code: SessionCode,
    /// This peer's identity inside the session
    pub peer_id: PeerId,
    /// Avatar spawned for the peer, if any
    pub player_id: Option<PlayerId>,
    pub is_host: bool,
}
