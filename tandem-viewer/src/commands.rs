//! Console commands read from stdin.

use crate::error::ViewerError;
use std::path::PathBuf;
use std::str::FromStr;

pub const HELP: &str = "\
Commands:
  play              start playback everywhere
  pause             pause playback everywhere
  seek <seconds>    jump to a position in the current track
  pick <index>      switch to a playlist entry
  next              switch to the following entry
  delete <index>    remove a playlist entry and its file
  upload <path>     upload an audio file and append it
  list              show the playlist
  status            show the local transport state
  help              show this message";

#[derive(Debug, Clone, PartialEq)]
pub enum ViewerCommand {
    Play,
    Pause,
    Seek(f64),
    Pick(i64),
    Next,
    Delete(i64),
    Upload(PathBuf),
    List,
    Status,
    Help,
}

impl ViewerCommand {
    /// Whether running the command needs a hub connection
    #[must_use]
    pub const fn is_remote(&self) -> bool {
        !matches!(self, Self::List | Self::Status | Self::Help)
    }
}

impl FromStr for ViewerCommand {
    type Err = ViewerError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        let (name, arg) = match line.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (line, ""),
        };

        let command = match name.to_ascii_lowercase().as_str() {
            "play" => Self::Play,
            "pause" => Self::Pause,
            "seek" => Self::Seek(parse_arg(name, arg)?),
            "pick" => Self::Pick(parse_arg(name, arg)?),
            "next" => Self::Next,
            "delete" => Self::Delete(parse_arg(name, arg)?),
            "upload" if !arg.is_empty() => Self::Upload(PathBuf::from(arg)),
            "upload" => {
                return Err(ViewerError::InvalidCommand(
                    "upload needs a file path".to_string(),
                ));
            }
            "list" => Self::List,
            "status" => Self::Status,
            "help" | "?" => Self::Help,
            other => {
                return Err(ViewerError::InvalidCommand(format!(
                    "unknown command {other:?}, try help"
                )));
            }
        };
        Ok(command)
    }
}

fn parse_arg<T: FromStr>(name: &str, arg: &str) -> Result<T, ViewerError> {
    arg.parse()
        .map_err(|_| ViewerError::InvalidCommand(format!("{name} needs a number, got {arg:?}")))
}
