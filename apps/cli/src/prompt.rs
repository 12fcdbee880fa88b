//! Line-based terminal input.

use std::io::Write;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

pub type Input = Lines<BufReader<Stdin>>;

pub fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

/// Asks a yes/no question; anything but an explicit yes is a no.
pub async fn confirm<R>(input: &mut Lines<R>, question: &str) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    print!("{question} [y/N] ");
    std::io::stdout().flush()?;
    let answer = input.next_line().await?.unwrap_or_default();
    Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Keys accepted while an upload runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Pause,
    Resume,
    Cancel,
    Status,
}

impl Control {
    pub fn parse(line: &str) -> Option<Self> {
        match line.trim().to_ascii_lowercase().as_str() {
            "p" | "pause" => Some(Control::Pause),
            "r" | "resume" => Some(Control::Resume),
            "c" | "cancel" => Some(Control::Cancel),
            "s" | "status" => Some(Control::Status),
            _ => None,
        }
    }
}
