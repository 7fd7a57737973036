use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::process::Command;

use crate::error::SourceError;
use crate::Reading;

// ---

/// Where the sensor node gets its readings from.
#[async_trait]
pub trait ReadingSource: Send {
    async fn read(&mut self) -> Result<Reading, SourceError>;
}

/// Runs an external sampler once per tick.
///
/// The sampler prints `voltage,current,temperature` (commas or whitespace)
/// on the first non-empty line of its stdout.
#[derive(Debug, Clone)]
pub struct CommandSource {
    // ---
    program: String,
    args: Vec<String>,
}

impl CommandSource {
    // ---
    /// Split a command line on whitespace into program and arguments.
    pub fn from_command_line(command_line: &str) -> Option<Self> {
        // ---
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

#[async_trait]
impl ReadingSource for CommandSource {
    async fn read(&mut self) -> Result<Reading, SourceError> {
        // ---
        let output = Command::new(&self.program)
            .args(&self.args)
            .kill_on_drop(true)
            .output()
            .await?;
        if !output.status.success() {
            return Err(SourceError::Exit(output.status));
        }
        parse_sample(&String::from_utf8_lossy(&output.stdout), Utc::now())
    }
}

pub fn parse_sample(stdout: &str, timestamp: DateTime<Utc>) -> Result<Reading, SourceError> {
    // ---
    let line = stdout
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .ok_or_else(|| SourceError::Parse(stdout.to_string()))?;

    let values = line
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(str::parse::<f64>)
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| SourceError::Parse(line.to_string()))?;

    match values.as_slice() {
        [voltage, current, temperature] if values.iter().all(|v| v.is_finite()) => {
            Ok(Reading::new(timestamp, *voltage, *current, *temperature))
        }
        _ => Err(SourceError::Parse(line.to_string())),
    }
}
