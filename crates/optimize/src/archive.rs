//! Persistence of evaluated designs.
//!
//! A [`DataHandler`] receives every (design, evaluation, objectives) triple a
//! [`DesignProblem`](crate::DesignProblem) produces. Archive failures are
//! logged by the problem and never abort an optimization run.

use std::{
    fs::{File, OpenOptions},
    io::{self, BufWriter, Write},
    path::Path,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
};

use jiff::Timestamp;
use serde::Serialize;
use thiserror::Error;

use spindle_core::Design;
use spindle_pipeline::Evaluation;

use crate::{Error, error::report};

/// Errors that can occur while archiving.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("failed to write archive")]
    Io(#[from] io::Error),

    #[error("failed to serialize archive entry")]
    Serialize(#[from] serde_json::Error),

    #[error("archive lock poisoned by a panicking writer")]
    Poisoned,
}

/// Persists evaluated designs.
pub trait DataHandler {
    /// Saves one evaluated design and its objectives.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the entry cannot be stored.
    fn save(
        &self,
        design: &Design,
        evaluation: &Evaluation,
        objectives: &[f64],
    ) -> Result<(), ArchiveError>;

    /// Saves a failed evaluation.
    ///
    /// Only called when the problem is configured to archive failures. The
    /// default implementation discards it.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the entry cannot be stored.
    fn save_failure(&self, _x: &[f64], _error: &Error) -> Result<(), ArchiveError> {
        Ok(())
    }
}

impl<H: DataHandler + ?Sized> DataHandler for Arc<H> {
    fn save(
        &self,
        design: &Design,
        evaluation: &Evaluation,
        objectives: &[f64],
    ) -> Result<(), ArchiveError> {
        (**self).save(design, evaluation, objectives)
    }

    fn save_failure(&self, x: &[f64], error: &Error) -> Result<(), ArchiveError> {
        (**self).save_failure(x, error)
    }
}

/// A data handler that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullArchive;

impl DataHandler for NullArchive {
    fn save(&self, _: &Design, _: &Evaluation, _: &[f64]) -> Result<(), ArchiveError> {
        Ok(())
    }
}

/// One archived evaluation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Entry {
    pub sequence: u64,
    pub design: Design,
    pub evaluation: Evaluation,
    pub objectives: Vec<f64>,
}

/// One archived failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub sequence: u64,
    pub x: Vec<f64>,
    pub error: String,
}

/// An in-memory archive, safe to share between workers.
#[derive(Debug, Default)]
pub struct MemoryArchive {
    sequence: AtomicU64,
    entries: Mutex<Vec<Entry>>,
    failures: Mutex<Vec<Failure>>,
}

impl MemoryArchive {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every archived entry, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Poisoned`] if a writer panicked.
    pub fn entries(&self) -> Result<Vec<Entry>, ArchiveError> {
        Ok(self
            .entries
            .lock()
            .map_err(|_| ArchiveError::Poisoned)?
            .clone())
    }

    /// Returns a copy of every archived failure, in arrival order.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Poisoned`] if a writer panicked.
    pub fn failures(&self) -> Result<Vec<Failure>, ArchiveError> {
        Ok(self
            .failures
            .lock()
            .map_err(|_| ArchiveError::Poisoned)?
            .clone())
    }

    /// Returns the entries no other entry dominates.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Poisoned`] if a writer panicked.
    pub fn pareto_front(&self) -> Result<Vec<Entry>, ArchiveError> {
        let entries = self.entries.lock().map_err(|_| ArchiveError::Poisoned)?;
        Ok(entries
            .iter()
            .filter(|candidate| {
                !entries
                    .iter()
                    .any(|other| dominates(&other.objectives, &candidate.objectives))
            })
            .cloned()
            .collect())
    }
}

impl DataHandler for MemoryArchive {
    fn save(
        &self,
        design: &Design,
        evaluation: &Evaluation,
        objectives: &[f64],
    ) -> Result<(), ArchiveError> {
        let entry = Entry {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            design: design.clone(),
            evaluation: evaluation.clone(),
            objectives: objectives.to_vec(),
        };
        self.entries
            .lock()
            .map_err(|_| ArchiveError::Poisoned)?
            .push(entry);
        Ok(())
    }

    fn save_failure(&self, x: &[f64], error: &Error) -> Result<(), ArchiveError> {
        let failure = Failure {
            sequence: self.sequence.fetch_add(1, Ordering::Relaxed),
            x: x.to_vec(),
            error: report(error),
        };
        self.failures
            .lock()
            .map_err(|_| ArchiveError::Poisoned)?
            .push(failure);
        Ok(())
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Line<'a> {
    Evaluated {
        sequence: u64,
        timestamp: Timestamp,
        design: &'a Design,
        evaluation: &'a Evaluation,
        objectives: &'a [f64],
    },
    Failed {
        sequence: u64,
        timestamp: Timestamp,
        x: &'a [f64],
        error: String,
    },
}

/// An archive that writes one JSON object per line.
///
/// Each line carries a `kind` (`evaluated` or `failed`), a sequence number,
/// and a UTC timestamp. Lines are flushed as they are written, so an
/// interrupted run leaves a readable archive behind.
#[derive(Debug)]
pub struct JsonLinesArchive<W: Write = BufWriter<File>> {
    sequence: AtomicU64,
    writer: Mutex<W>,
}

impl JsonLinesArchive {
    /// Creates (or truncates) an archive file.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        Ok(Self::from_writer(BufWriter::new(File::create(path)?)))
    }

    /// Opens an archive file for appending, creating it if needed.
    ///
    /// # Errors
    ///
    /// Returns an [`ArchiveError`] if the file cannot be opened.
    pub fn append(path: impl AsRef<Path>) -> Result<Self, ArchiveError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(BufWriter::new(file)))
    }
}

impl<W: Write> JsonLinesArchive<W> {
    /// Writes the archive to any writer.
    pub fn from_writer(writer: W) -> Self {
        Self {
            sequence: AtomicU64::new(0),
            writer: Mutex::new(writer),
        }
    }

    /// Returns the underlying writer.
    ///
    /// # Errors
    ///
    /// Returns [`ArchiveError::Poisoned`] if a writer panicked.
    pub fn into_inner(self) -> Result<W, ArchiveError> {
        self.writer.into_inner().map_err(|_| ArchiveError::Poisoned)
    }

    fn write_line(&self, line: &Line<'_>) -> Result<(), ArchiveError> {
        let mut encoded = serde_json::to_vec(line)?;
        encoded.push(b'\n');

        let mut writer = self.writer.lock().map_err(|_| ArchiveError::Poisoned)?;
        writer.write_all(&encoded)?;
        writer.flush()?;
        Ok(())
    }

    fn next_sequence(&self) -> u64 {
        self.sequence.fetch_add(1, Ordering::Relaxed)
    }
}

impl<W: Write> DataHandler for JsonLinesArchive<W> {
    fn save(
        &self,
        design: &Design,
        evaluation: &Evaluation,
        objectives: &[f64],
    ) -> Result<(), ArchiveError> {
        self.write_line(&Line::Evaluated {
            sequence: self.next_sequence(),
            timestamp: Timestamp::now(),
            design,
            evaluation,
            objectives,
        })
    }

    fn save_failure(&self, x: &[f64], error: &Error) -> Result<(), ArchiveError> {
        self.write_line(&Line::Failed {
            sequence: self.next_sequence(),
            timestamp: Timestamp::now(),
            x,
            error: report(error),
        })
    }
}

/// Returns `true` if `a` Pareto-dominates `b` under minimization.
///
/// `a` dominates `b` when it is no worse in every objective and strictly
/// better in at least one. Slices of different lengths never dominate.
#[must_use]
pub fn dominates(a: &[f64], b: &[f64]) -> bool {
    a.len() == b.len()
        && a.iter().zip(b).all(|(x, y)| x <= y)
        && a.iter().zip(b).any(|(x, y)| x < y)
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;

    use spindle_core::{DesignSchema, Settings, State, Value};
    use spindle_pipeline::{Outcome, Record};

    fn design() -> Design {
        Design::new(
            Arc::new(DesignSchema::new("empty")),
            std::iter::empty::<(String, Value)>(),
        )
        .unwrap()
        .labeled("empty-0")
    }

    fn evaluation() -> Evaluation {
        let state = State::new(design(), Settings::default()).with_condition("mass", 2.0);
        Evaluation::new(
            vec![Record::new("mass", Value::Number(2.0), state)],
            Outcome::Completed,
            1,
        )
    }

    #[test]
    fn domination_rules() {
        assert!(dominates(&[1.0, 2.0], &[1.0, 3.0]));
        assert!(!dominates(&[1.0, 3.0], &[1.0, 3.0]));
        assert!(!dominates(&[0.0, 4.0], &[1.0, 3.0]));
        assert!(!dominates(&[0.0], &[1.0, 3.0]));
    }

    #[test]
    fn memory_archive_keeps_order_and_front() {
        let archive = MemoryArchive::new();
        for objectives in [[3.0, 3.0], [1.0, 4.0], [2.0, 2.0], [4.0, 1.0]] {
            archive.save(&design(), &evaluation(), &objectives).unwrap();
        }

        let entries = archive.entries().unwrap();
        assert_eq!(entries.len(), 4);
        assert_eq!(entries[1].sequence, 1);

        let front: Vec<_> = archive
            .pareto_front()
            .unwrap()
            .into_iter()
            .map(|entry| entry.objectives)
            .collect();
        assert_eq!(front, [vec![1.0, 4.0], vec![2.0, 2.0], vec![4.0, 1.0]]);
    }

    #[test]
    fn json_lines_are_tagged_and_sequenced() {
        let archive = JsonLinesArchive::from_writer(Vec::new());
        archive.save(&design(), &evaluation(), &[2.0]).unwrap();
        archive
            .save_failure(&[-1.0], &Error::Unexpected("boom".into()))
            .unwrap();

        let bytes = archive.into_inner().unwrap();
        let text = String::from_utf8(bytes).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["kind"], "evaluated");
        assert_eq!(lines[0]["sequence"], 0);
        assert_eq!(lines[0]["design"]["label"], "empty-0");
        assert_eq!(lines[0]["evaluation"]["outcome"]["outcome"], "completed");
        assert_eq!(lines[0]["objectives"][0], 2.0);
        assert_eq!(lines[1]["kind"], "failed");
        assert_eq!(lines[1]["error"], "unexpected failure: boom");
        assert!(lines[1]["timestamp"].is_string());
    }
}
