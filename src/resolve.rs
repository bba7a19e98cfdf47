//! Interactive resolution of duplicate groups.
//!
//! For each group the members are listed from 1; the operator types the
//! number of the copy to keep, or 0 to leave the group untouched. Anything
//! else is rejected and the question is asked again. The kept copy stays in
//! place; the others are moved with [`crate::actions::relocate_group`].
//!
//! The resolver is generic over its input and output so it can be driven
//! from stdin/stdout or from in-memory buffers.

use std::io::{self, BufRead, Write};
use std::path::Path;

use yansi::Paint;

use crate::actions::{relocate_group, BatchRelocateResult};
use crate::duplicates::DuplicateGroup;

/// Answer to a group prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Choice {
    /// Keep the member at this zero-based index.
    Keep(usize),
    /// Leave the group as it is.
    Skip,
    /// Input ended before a valid answer.
    EndOfInput,
}

/// Totals of an interactive session.
#[derive(Debug, Default)]
pub struct ResolveReport {
    /// Groups where a copy was kept and the rest relocated
    pub resolved: usize,
    /// Groups skipped with 0 or left when input ended
    pub skipped: usize,
    /// Every move attempted
    pub relocation: BatchRelocateResult,
}

/// Prompt-driven resolver.
pub struct Resolver<R, W> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Resolver<R, W> {
    /// Create a resolver reading answers from `input`.
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one trimmed line. `None` at end of input.
    ///
    /// # Errors
    ///
    /// Propagates read and write failures.
    pub fn prompt_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Show a group and ask which copy to keep.
    ///
    /// # Errors
    ///
    /// Propagates read and write failures.
    pub fn choose(&mut self, group: &DuplicateGroup) -> io::Result<Choice> {
        writeln!(
            self.output,
            "\n{} ({} files, {})",
            "Duplicate group".bold(),
            group.len(),
            group.fingerprint.to_string().dim()
        )?;
        for (i, path) in group.paths.iter().enumerate() {
            writeln!(self.output, "  {}: {}", (i + 1).cyan(), path.display())?;
        }
        writeln!(self.output, "  {}: skip this group", 0.cyan())?;

        let prompt = format!("Keep which file? (1-{}, 0 to skip): ", group.len());
        loop {
            let Some(answer) = self.prompt_line(&prompt)? else {
                return Ok(Choice::EndOfInput);
            };

            match parse_choice(&answer, group.len()) {
                Some(choice) => return Ok(choice),
                None => writeln!(
                    self.output,
                    "{} Enter a number between 0 and {}.",
                    "Invalid choice.".red(),
                    group.len()
                )?,
            }
        }
    }

    /// Walk every group, relocating the copies not kept into `destination`.
    ///
    /// Input ending early skips the remaining groups.
    ///
    /// # Errors
    ///
    /// Propagates read and write failures. Failed moves are reported, not
    /// returned as errors.
    pub fn resolve_all(
        &mut self,
        groups: &[DuplicateGroup],
        destination: &Path,
    ) -> io::Result<ResolveReport> {
        let mut report = ResolveReport::default();

        for (n, group) in groups.iter().enumerate() {
            match self.choose(group)? {
                Choice::Keep(index) => {
                    self.keep(group, index, destination, &mut report)?;
                }
                Choice::Skip => {
                    log::debug!("Skipped group {}", group.fingerprint);
                    report.skipped += 1;
                }
                Choice::EndOfInput => {
                    log::info!("Input closed, leaving {} groups untouched", groups.len() - n);
                    report.skipped += groups.len() - n;
                    break;
                }
            }
        }

        Ok(report)
    }

    /// Keep member `index` of `group`, move the rest and record the outcome.
    fn keep(
        &mut self,
        group: &DuplicateGroup,
        index: usize,
        destination: &Path,
        report: &mut ResolveReport,
    ) -> io::Result<()> {
        let batch = match relocate_group(group, index, destination) {
            Ok(batch) => batch,
            Err(e) => {
                log::error!("Could not relocate group {}: {}", group.fingerprint, e);
                writeln!(self.output, "{} {}", "Could not resolve group:".red(), e)?;
                report.skipped += 1;
                return Ok(());
            }
        };

        for moved in &batch.moved {
            writeln!(
                self.output,
                "{} {} -> {}",
                "Moved".green(),
                moved.from.display(),
                moved.to.display()
            )?;
        }
        for (path, reason) in &batch.failures {
            writeln!(
                self.output,
                "{} {}: {}",
                "Could not move".red(),
                path.display(),
                reason
            )?;
        }
        report.resolved += 1;
        report.relocation.extend(batch);
        Ok(())
    }
}

/// Parse a 1-based answer. `0` skips; out of range or non-numeric is `None`.
fn parse_choice(answer: &str, len: usize) -> Option<Choice> {
    match answer.parse::<usize>().ok()? {
        0 => Some(Choice::Skip),
        n if n <= len => Some(Choice::Keep(n - 1)),
        _ => None,
    }
}
