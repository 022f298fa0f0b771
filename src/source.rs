//! Recorded change feed source.
//!
//! Reads a change feed that was captured as JSON lines (one `_changes` line
//! per line of text) and yields it as a stream for the feed driver.

use anyhow::{Context, Result};
use futures::Stream;
use relay_core::{ChangeLine, Sequence};
use std::fs::File;
use std::io::{BufRead, BufReader, Lines};
use std::path::Path;

/// Iterator over the change lines of a reader, optionally resuming after a
/// given sequence.
///
/// When resuming, every line up to and including the one carrying the
/// resume sequence is skipped. If the input ends before that line is found
/// the iterator yields an error instead of silently replaying from the
/// start.
pub struct ChangeLines<R> {
    lines: Lines<R>,
    line_number: usize,
    resume_after: Option<Sequence>,
    done: bool,
}

impl<R: BufRead> ChangeLines<R> {
    pub fn new(reader: R, resume_after: Option<Sequence>) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            resume_after,
            done: false,
        }
    }

    fn next_line(&mut self) -> Option<Result<ChangeLine>> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;

            if text.trim().is_empty() {
                continue;
            }

            return Some(
                ChangeLine::parse(&text)
                    .with_context(|| format!("Invalid change line at line {}", self.line_number)),
            );
        }
    }
}

impl<R: BufRead> Iterator for ChangeLines<R> {
    type Item = Result<ChangeLine>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        while let Some(since) = self.resume_after.clone() {
            match self.next_line() {
                Some(Ok(line)) => {
                    if line.seq.as_ref() == Some(&since) {
                        tracing::info!(
                            "Resuming after seq {} (line {})",
                            since,
                            self.line_number
                        );
                        self.resume_after = None;
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    return Some(Err(anyhow::anyhow!(
                        "Checkpoint seq {since} not found in change feed"
                    )));
                }
            }
        }

        let next = self.next_line();
        if matches!(next, Some(Err(_)) | None) {
            self.done = true;
        }
        next
    }
}

/// Open a recorded change feed as a stream.
pub fn open_change_feed(
    path: &Path,
    resume_after: Option<Sequence>,
) -> Result<impl Stream<Item = Result<ChangeLine>>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open change feed {}", path.display()))?;
    tracing::info!("Reading change feed from {}", path.display());
    Ok(futures::stream::iter(ChangeLines::new(
        BufReader::new(file),
        resume_after,
    )))
}
