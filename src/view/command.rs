use std::str::FromStr;

use thiserror::Error;

/// A command typed at the interactive prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    /// Fetch a new pair and bump the roll counter.
    Roll,
    ToggleGrayscale,
    ToggleBlur,
    /// Persist the displayed pair with the active filters baked in.
    Save,
    /// Replace the displayed pair with the most recently saved one.
    LoadLast,
    Help,
    Quit,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Unknown command '{0}'. Type `help` for the list of commands.")]
pub struct UnknownCommand(pub String);

impl FromStr for UserCommand {
    type Err = UnknownCommand;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "roll" | "r" | "reload" => Ok(Self::Roll),
            "gray" | "grey" | "grayscale" | "g" => Ok(Self::ToggleGrayscale),
            "blur" | "b" => Ok(Self::ToggleBlur),
            "save" | "s" => Ok(Self::Save),
            "last" | "l" => Ok(Self::LoadLast),
            "help" | "h" | "?" => Ok(Self::Help),
            "quit" | "q" | "exit" => Ok(Self::Quit),
            other => Err(UnknownCommand(other.to_string())),
        }
    }
}

pub const HELP: &str = "\
Commands:
  roll   fetch a new photo pair
  gray   toggle grayscale on the Picsum photo
  blur   toggle blur on the Picsum photo
  save   save the displayed pair
  last   show the last saved pair
  quit   exit";
