pub mod echo;
pub mod executable;
pub mod get;
pub mod ping;
pub mod set;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::commands::executable::Executable;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

use echo::Echo;
use get::Get;
use ping::Ping;
use set::Set;

#[derive(Debug, PartialEq)]
pub enum Command {
    Echo(Echo),
    Get(Get),
    Ping(Ping),
    Set(Set),
}

impl Executable for Command {
    fn exec(self, store: Store) -> Result<Frame, Error> {
        match self {
            Command::Echo(cmd) => cmd.exec(store),
            Command::Get(cmd) => cmd.exec(store),
            Command::Ping(cmd) => cmd.exec(store),
            Command::Set(cmd) => cmd.exec(store),
        }
    }
}

impl TryFrom<Frame> for Command {
    type Error = CommandParserError;

    fn try_from(frame: Frame) -> Result<Self, Self::Error> {
        // Clients send commands to the server as RESP arrays.
        let frames = match frame {
            Frame::Array(array) => array,
            frame => {
                return Err(CommandParserError::InvalidFrame {
                    expected: "array".to_string(),
                    actual: frame,
                })
            }
        };

        let mut parts = frames.into_iter();
        let (command, command_name) = parse_command_name(&mut parts)?;

        let parser = &mut CommandParser {
            command: command_name.clone(),
            parts,
        };

        match &command_name[..] {
            "echo" => Echo::try_from(parser).map(Command::Echo),
            "get" => Get::try_from(parser).map(Command::Get),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "set" => Set::try_from(parser).map(Command::Set),
            _ => Err(CommandParserError::UnknownCommand { command }),
        }
    }
}

/// Returns the command name as sent by the client along with its lowercase form, which is used
/// for the case-insensitive lookup.
fn parse_command_name(
    parts: &mut vec::IntoIter<Frame>,
) -> Result<(String, String), CommandParserError> {
    let name = match parts.next() {
        Some(Frame::Simple(s)) => s,
        Some(Frame::Bulk(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
        Some(frame) => {
            return Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            })
        }
        None => return Err(CommandParserError::EmptyCommand),
    };

    let lowercase = name.to_lowercase();
    Ok((name, lowercase))
}

pub struct CommandParser {
    /// Lowercase name of the command being parsed, used in error replies.
    command: String,
    parts: vec::IntoIter<Frame>,
}

impl CommandParser {
    fn next_frame(&mut self) -> Result<Frame, CommandParserError> {
        self.parts
            .next()
            .ok_or_else(|| CommandParserError::WrongArity {
                command: self.command.clone(),
            })
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let bytes = self.next_bytes()?;

        str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(CommandParserError::InvalidUTF8String)
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        match self.next_frame()? {
            Frame::Integer(i) => Ok(i),
            Frame::Simple(string) => string
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            Frame::Bulk(bytes) => str::from_utf8(&bytes[..])
                .map_err(|_| CommandParserError::NotAnInteger)?
                .parse::<i64>()
                .map_err(|_| CommandParserError::NotAnInteger),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "integer".to_string(),
                actual: frame,
            }),
        }
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        match self.next_frame()? {
            // Both `Simple` and `Bulk` representation may be strings. While errors are stored as
            // strings, they are considered separate types.
            Frame::Simple(s) => Ok(Bytes::from(s)),
            Frame::Bulk(bytes) => Ok(bytes),
            frame => Err(CommandParserError::InvalidFrame {
                expected: "simple or bulk string".to_string(),
                actual: frame,
            }),
        }
    }

    fn remaining(&self) -> usize {
        self.parts.len()
    }

    /// Fails if the client sent more arguments than the command accepts.
    fn finish(&mut self) -> Result<(), CommandParserError> {
        if self.remaining() > 0 {
            return Err(CommandParserError::WrongArity {
                command: self.command.clone(),
            });
        }
        Ok(())
    }
}

/// Errors raised while turning a request frame into a [`Command`]. Their `Display` output is the
/// message sent back to the client.
#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("protocol error; invalid frame, expected {expected}, got {actual}")]
    InvalidFrame { expected: String, actual: Frame },
    #[error("ERR empty command")]
    EmptyCommand,
    #[error("ERR unknown command '{command}'")]
    UnknownCommand { command: String },
    #[error("ERR wrong number of arguments for '{command}' command")]
    WrongArity { command: String },
    #[error("ERR syntax error")]
    Syntax,
    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,
    #[error("ERR invalid expire time in '{command}' command")]
    InvalidExpireTime { command: String },
    #[error("ERR invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
}

impl CommandParserError {
    /// Whether the request violates the framing expected from a client, as opposed to a
    /// well-formed request with bad arguments. Fatal errors end the connection without a reply.
    pub fn is_fatal(&self) -> bool {
        matches!(self, CommandParserError::InvalidFrame { .. })
    }
}

impl From<CommandParserError> for Frame {
    fn from(err: CommandParserError) -> Self {
        // Messages may quote client input, and a simple error cannot span lines.
        let message = err.to_string().replace(['\r', '\n'], " ");
        Frame::Error(message)
    }
}
