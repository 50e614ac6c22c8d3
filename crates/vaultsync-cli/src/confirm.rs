//! Interactive push confirmation
//!
//! Lists the pending operations and asks on stdin which of them to apply:
//! `y` applies everything, `n` cancels the push, `s` asks once per entry.
//! Entries answered with `n` in select mode are discarded, which reverts
//! the local copy to the remote version.

use std::io::{BufRead, BufReader, Stdin, Write};

use anyhow::{Context, Result};

use vaultsync_core::{domain::Operation, ports::IPushConfirmer};

/// Answer to the top-level push prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    All,
    Cancel,
    Select,
}

impl Choice {
    pub fn parse(answer: &str) -> Option<Self> {
        match answer.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(Choice::All),
            "" | "n" | "no" => Some(Choice::Cancel),
            "s" | "select" => Some(Choice::Select),
            _ => None,
        }
    }
}

/// Parses a per-entry answer; anything but yes keeps the entry out
pub fn parse_entry_answer(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

/// Confirmer reading answers from any line source
pub struct PromptConfirmer<R> {
    input: std::sync::Mutex<R>,
}

impl PromptConfirmer<BufReader<Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(std::io::stdin()))
    }
}

impl<R: BufRead + Send> PromptConfirmer<R> {
    pub fn new(input: R) -> Self {
        Self {
            input: std::sync::Mutex::new(input),
        }
    }

    fn ask(&self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        std::io::stdout().flush()?;
        let mut line = String::new();
        let mut input = self
            .input
            .lock()
            .map_err(|_| anyhow::anyhow!("prompt input poisoned"))?;
        input.read_line(&mut line).context("Failed to read answer")?;
        Ok(line)
    }

    fn decide(&self, operations: &[Operation]) -> Result<Option<Vec<Operation>>> {
        println!("Pending changes:");
        for op in operations {
            println!("  {op}");
        }

        let choice = loop {
            let answer = self.ask(&format!(
                "Push {} change(s)? [y]es / [n]o / [s]elect: ",
                operations.len()
            ))?;
            if let Some(choice) = Choice::parse(&answer) {
                break choice;
            }
        };

        match choice {
            Choice::All => Ok(Some(operations.to_vec())),
            Choice::Cancel => Ok(None),
            Choice::Select => {
                let mut accepted = Vec::new();
                for op in operations {
                    if parse_entry_answer(&self.ask(&format!("  push {op}? [y/N]: "))?) {
                        accepted.push(op.clone());
                    }
                }
                Ok(Some(accepted))
            }
        }
    }
}

#[async_trait::async_trait]
impl<R: BufRead + Send + 'static> IPushConfirmer for PromptConfirmer<R> {
    async fn confirm(&self, operations: &[Operation]) -> Result<Option<Vec<Operation>>> {
        tokio::task::block_in_place(|| self.decide(operations))
    }
}
