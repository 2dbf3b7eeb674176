use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::dispatch::FrameRole;
use crate::gesture::sampler::Point;

#[derive(Parser)]
#[command(name = "touchpathd", about = "Touch gesture path engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Frame {
    Top,
    Nested,
}

impl From<Frame> for FrameRole {
    fn from(frame: Frame) -> Self {
        match frame {
            Frame::Top => FrameRole::Top,
            Frame::Nested => FrameRole::Nested,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Replay a recorded contact trace and print the executed actions
    Replay {
        /// JSON-lines trace file
        trace: PathBuf,

        /// Settings file (defaults to the resolved config path)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Frame the trace was recorded in
        #[arg(long, value_enum, default_value = "top")]
        frame: Frame,

        /// Nested frame mount offset in top-frame pixels, as `x,y`
        #[arg(long, value_parser = parse_offset, default_value = "0,0")]
        offset: Point,

        /// Perform host actions instead of logging them
        #[arg(long)]
        live: bool,
    },

    /// Run the engine on JSON-lines contact input from stdin
    Listen {
        /// Settings file (defaults to the resolved config path)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Viewport width in pixels
        #[arg(long, default_value_t = 400.0)]
        width: f64,

        /// Viewport height in pixels
        #[arg(long, default_value_t = 800.0)]
        height: f64,

        /// Perform host actions instead of logging them
        #[arg(long)]
        live: bool,
    },

    /// Print the built-in settings entries
    Defaults {
        /// Write them to the settings file instead
        #[arg(long)]
        write: bool,

        /// Settings file (defaults to the resolved config path)
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Check a settings file and list skipped entries
    Validate {
        /// Settings file (defaults to the resolved config path)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn parse_offset(s: &str) -> Result<Point, String> {
    let (x, y) = s
        .split_once(',')
        .ok_or_else(|| format!("expected `x,y`, got {s:?}"))?;
    let x: f64 = x.trim().parse().map_err(|e| format!("bad x: {e}"))?;
    let y: f64 = y.trim().parse().map_err(|e| format!("bad y: {e}"))?;
    Ok(Point::new(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offset_parses_pair() {
        assert_eq!(parse_offset("12, -4.5"), Ok(Point::new(12.0, -4.5)));
        assert!(parse_offset("12").is_err());
        assert!(parse_offset("a,1").is_err());
    }

    #[test]
    fn replay_defaults_to_top_frame() {
        let cli = Cli::try_parse_from(["touchpathd", "replay", "trace.jsonl"]).unwrap();
        match cli.command {
            Command::Replay {
                frame,
                offset,
                live,
                ..
            } => {
                assert!(matches!(frame, Frame::Top));
                assert_eq!(offset, Point::default());
                assert!(!live);
            }
            _ => panic!("expected replay"),
        }
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
