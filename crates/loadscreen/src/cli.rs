use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use loadconfig::CheckpointPolicy;

#[derive(Parser, Debug)]
#[command(
    name = "loadscreen",
    author,
    version,
    about = "Animate a loading screen while the main thread blocks",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Configuration file; defaults to `loadscreen.toml` in the config directory.
    #[arg(long, value_name = "FILE", env = "LOADSCREEN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Surface size (e.g. `1280x720`); overrides `[layout]`.
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(u32, u32)>,

    /// Frame cap for the loading animation (0=uncapped).
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// How clearing a checkpoint affects loading: `counted` or `unconditional`.
    #[arg(long, value_name = "POLICY", value_parser = parse_policy)]
    pub policy: Option<CheckpointPolicy>,

    /// Background image drawn behind the spinner.
    #[arg(long, value_name = "PATH")]
    pub background: Option<PathBuf>,

    /// Overlay text drawn next to the spinner.
    #[arg(long, value_name = "TEXT")]
    pub label: Option<String>,

    /// Simulated blocking task (`LABEL=DURATION`, e.g. `assets=2s`); repeatable.
    #[arg(long = "task", value_name = "LABEL=DURATION", value_parser = parse_task)]
    pub tasks: Vec<TaskArg>,

    /// How many times to run the task list.
    #[arg(long, value_name = "N", default_value_t = 1)]
    pub cycles: u32,

    /// Write the final surface contents to this PNG path.
    #[arg(long, value_name = "PATH")]
    pub export: Option<PathBuf>,

    /// Print a JSON run summary to stdout when done.
    #[arg(long)]
    pub summary: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Validate a configuration file and exit.
    Check {
        #[arg(value_name = "FILE")]
        path: Option<PathBuf>,
    },
    /// Print the resolved configuration directory and file.
    Where,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskArg {
    pub label: String,
    pub duration: Duration,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(u32, u32), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 1280x720".to_string())?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size specification".to_string())?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size specification".to_string())?;
    if width == 0 || height == 0 {
        return Err("surface dimensions must be greater than zero".into());
    }
    Ok((width, height))
}

pub fn parse_policy(value: &str) -> Result<CheckpointPolicy, String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err("checkpoint policy must not be empty".to_string());
    }
    match trimmed.to_ascii_lowercase().as_str() {
        "counted" | "count" | "refcount" => Ok(CheckpointPolicy::Counted),
        "unconditional" | "last" | "legacy" => Ok(CheckpointPolicy::Unconditional),
        other => Err(format!(
            "unknown checkpoint policy '{other}'; expected counted or unconditional"
        )),
    }
}

pub fn parse_task(value: &str) -> Result<TaskArg, String> {
    let (label, duration) = value
        .split_once('=')
        .ok_or_else(|| "expected LABEL=DURATION, e.g. assets=2s".to_string())?;
    let label = label.trim();
    if label.is_empty() {
        return Err("task label must not be empty".into());
    }
    let duration = humantime::parse_duration(duration.trim())
        .map_err(|err| format!("invalid duration for task '{label}': {err}"))?;
    if duration.is_zero() {
        return Err(format!("task '{label}' duration must be greater than zero"));
    }
    Ok(TaskArg {
        label: label.to_string(),
        duration,
    })
}
