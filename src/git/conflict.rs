use super::gateway::{GitGateway, GitResult};
use crate::config::ConflictPolicy;
use crate::errors::{Result, StratoError};
use std::io::{BufRead, BufReader, Write};
use tracing::debug;

/// Terminal outcome of one conflict-resolution invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The enclosing operation may proceed as if the rebase succeeded
    Resolved,
    /// The user or policy gave up; the caller must roll back
    Aborted,
}

/// State machine entered when the gateway reports a conflict during a rebase
/// or a rebase-based pull. Applies the configured policy, or drives an
/// interactive prompt loop over the given input source.
pub struct ConflictResolver {
    policy: ConflictPolicy,
    input: Box<dyn BufRead + Send>,
}

impl ConflictResolver {
    /// Resolver reading interactive answers from stdin.
    pub fn new(policy: ConflictPolicy) -> Self {
        Self::with_input(policy, Box::new(BufReader::new(std::io::stdin())))
    }

    /// Resolver with an injected input source (tests, scripted runs).
    pub fn with_input(policy: ConflictPolicy, input: Box<dyn BufRead + Send>) -> Self {
        Self { policy, input }
    }

    pub fn resolve(&mut self, gateway: &GitGateway) -> Result<Resolution> {
        match self.policy {
            ConflictPolicy::Ours => self.auto_resolve(gateway, "--ours"),
            ConflictPolicy::Theirs => self.auto_resolve(gateway, "--theirs"),
            ConflictPolicy::Manual => self.resolve_manually(gateway),
        }
    }

    /// Stage every conflicted file from the chosen side and continue the
    /// rebase. Exactly one attempt: if a later step conflicts again, the next
    /// gateway call reports it fresh.
    fn auto_resolve(&self, gateway: &GitGateway, side: &str) -> Result<Resolution> {
        debug!("Auto-resolving conflict with {side}");
        gateway.run_quietly(&["checkout", side, "."]);
        gateway.run_quietly(&["add", "."]);
        gateway.run_quietly(&["rebase", "--continue"]);
        Ok(Resolution::Resolved)
    }

    /// Prompt loop: `continue` attempts to continue the in-progress rebase
    /// (a fresh conflict repeats the prompt), `abort` cancels it, anything
    /// else re-prompts. End-of-input counts as abort.
    fn resolve_manually(&mut self, gateway: &GitGateway) -> Result<Resolution> {
        println!("Rebase conflict detected. Please resolve conflicts in your editor.");
        loop {
            print!("Type 'continue' when conflicts are resolved, or 'abort' to cancel rebase: ");
            std::io::stdout().flush()?;

            let mut line = String::new();
            if self.input.read_line(&mut line)? == 0 {
                gateway.run_quietly(&["rebase", "--abort"]);
                return Ok(Resolution::Aborted);
            }

            match line.trim() {
                "continue" => match gateway.run(&["rebase", "--continue"])? {
                    GitResult::Success(_) => return Ok(Resolution::Resolved),
                    GitResult::Conflict(_) => {
                        println!("Still conflicts remain. Please resolve and type 'continue' again.");
                    }
                    GitResult::Failure(out) => {
                        return Err(StratoError::vcs(format!(
                            "rebase --continue failed:\n{}",
                            out.trim()
                        )));
                    }
                },
                "abort" => {
                    gateway.run_quietly(&["rebase", "--abort"]);
                    return Ok(Resolution::Aborted);
                }
                _ => println!("Unknown input. Type 'continue' or 'abort'."),
            }
        }
    }
}
