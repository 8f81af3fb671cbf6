//! Commands sent back to the game.

use std::fmt;
use std::io::Write;

use serde::{Deserialize, Serialize};

use crate::engine::Move;

#[derive(thiserror::Error, Debug)]
pub enum InputError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// A slide, or a request to take the last move back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Up,
    Down,
    Left,
    Right,
    Undo,
}

impl Command {
    /// The slide this command performs, `None` for [`Command::Undo`].
    pub fn as_move(self) -> Option<Move> {
        match self {
            Command::Up => Some(Move::Up),
            Command::Down => Some(Move::Down),
            Command::Left => Some(Move::Left),
            Command::Right => Some(Move::Right),
            Command::Undo => None,
        }
    }
}

impl From<Move> for Command {
    fn from(m: Move) -> Self {
        match m {
            Move::Up => Command::Up,
            Move::Down => Command::Down,
            Move::Left => Command::Left,
            Move::Right => Command::Right,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_move() {
            Some(m) => write!(f, "{m}"),
            None => f.write_str("undo"),
        }
    }
}

/// Key name emitted for each command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct KeyMap {
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
    pub undo: String,
}

impl Default for KeyMap {
    fn default() -> Self {
        Self { up: "up".into(), down: "down".into(), left: "left".into(), right: "right".into(), undo: "u".into() }
    }
}

impl KeyMap {
    pub fn key(&self, cmd: Command) -> &str {
        match cmd {
            Command::Up => &self.up,
            Command::Down => &self.down,
            Command::Left => &self.left,
            Command::Right => &self.right,
            Command::Undo => &self.undo,
        }
    }
}

/// Receives commands from the decision loop.
pub trait InputSink {
    fn send(&mut self, cmd: Command) -> Result<(), InputError>;
}

/// Records commands in memory.
impl InputSink for Vec<Command> {
    fn send(&mut self, cmd: Command) -> Result<(), InputError> {
        self.push(cmd);
        Ok(())
    }
}

/// Writes one key name per line, flushing after each so a downstream key
/// injector sees it immediately.
pub struct KeyEcho<W: Write> {
    out: W,
    keys: KeyMap,
}

impl<W: Write> KeyEcho<W> {
    pub fn new(out: W, keys: KeyMap) -> Self { Self { out, keys } }

    pub fn into_inner(self) -> W { self.out }
}

impl<W: Write> InputSink for KeyEcho<W> {
    fn send(&mut self, cmd: Command) -> Result<(), InputError> {
        writeln!(self.out, "{}", self.keys.key(cmd))?;
        self.out.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moves_convert_both_ways() {
        for m in Move::ALL {
            assert_eq!(Command::from(m).as_move(), Some(m));
        }
        assert_eq!(Command::Undo.as_move(), None);
        assert_eq!(Command::Undo.to_string(), "undo");
        assert_eq!(Command::Left.to_string(), "left");
    }

    #[test]
    fn echo_uses_the_key_map() {
        let keys = KeyMap { up: "w".into(), ..KeyMap::default() };
        let mut echo = KeyEcho::new(Vec::new(), keys);
        echo.send(Command::Up).unwrap();
        echo.send(Command::Undo).unwrap();
        echo.send(Command::Down).unwrap();
        assert_eq!(String::from_utf8(echo.into_inner()).unwrap(), "w\nu\ndown\n");
    }

    #[test]
    fn key_map_fills_missing_fields() {
        let keys: KeyMap = serde_json::from_str(r#"{"undo": "ctrl+z"}"#).unwrap();
        assert_eq!(keys.undo, "ctrl+z");
        assert_eq!(keys.left, "left");
        assert!(serde_json::from_str::<KeyMap>(r#"{"jump": "space"}"#).is_err());
    }
}
