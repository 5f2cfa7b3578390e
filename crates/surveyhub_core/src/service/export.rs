//! Spreadsheet export use-case.
//!
//! # Responsibility
//! - Pull a consistent snapshot of one survey's responses and hand it to a
//!   sink as a whole-sheet overwrite.
//!
//! # Invariants
//! - The snapshot's column set is deterministic (survey schema order).
//! - The sink contract is destructive overwrite, never append or merge.
//! - Export never leaves partial sheet state: the overwrite is the last
//!   and only sink call.

use crate::model::survey::SurveyId;
use crate::repo::export_repo::{Snapshot, SnapshotSource};
use crate::repo::RepoError;
use log::{error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

/// Where a snapshot lands: a spreadsheet and a worksheet within it.
///
/// Live implementations name the worksheet after the survey and reach the
/// spreadsheet service with service-account credentials held outside core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SheetDestination {
    pub spreadsheet: String,
    pub worksheet: String,
}

/// Failure reported by a sink implementation.
#[derive(Debug)]
pub enum SinkError {
    /// The external service cannot be reached or authenticated against.
    Unavailable(String),
    /// The destination sheet cannot be created or opened.
    Rejected(String),
}

impl Display for SinkError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(detail) => write!(f, "export sink unavailable: {detail}"),
            Self::Rejected(detail) => write!(f, "export destination rejected: {detail}"),
        }
    }
}

impl Error for SinkError {}

/// Narrow sink interface the export adapter writes through.
///
/// `write_snapshot` replaces the destination worksheet's entire contents
/// with the header row plus one row per response.
pub trait SheetSink {
    fn write_snapshot(
        &mut self,
        destination: &SheetDestination,
        snapshot: &Snapshot,
    ) -> Result<(), SinkError>;
}

impl<S: SheetSink + ?Sized> SheetSink for &mut S {
    fn write_snapshot(
        &mut self,
        destination: &SheetDestination,
        snapshot: &Snapshot,
    ) -> Result<(), SinkError> {
        (**self).write_snapshot(destination, snapshot)
    }
}

/// Service error for export use-cases.
#[derive(Debug)]
pub enum ExportError {
    SurveyNotFound(SurveyId),
    /// Nothing to export; the destination is left untouched.
    NoResponses(SurveyId),
    Sink(SinkError),
    Repo(RepoError),
}

impl Display for ExportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SurveyNotFound(survey_id) => write!(f, "survey not found: {survey_id}"),
            Self::NoResponses(survey_id) => {
                write!(f, "survey {survey_id} has no responses to export")
            }
            Self::Sink(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for ExportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sink(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for ExportError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<SinkError> for ExportError {
    fn from(value: SinkError) -> Self {
        Self::Sink(value)
    }
}

/// Export facade over a snapshot source and a sheet sink.
pub struct ExportService<R: SnapshotSource, S: SheetSink> {
    source: R,
    sink: S,
}

impl<R: SnapshotSource, S: SheetSink> ExportService<R, S> {
    /// Creates a service from a snapshot source and sink implementation.
    pub fn new(source: R, sink: S) -> Self {
        Self { source, sink }
    }

    /// Exports one survey into `spreadsheet`, overwriting the worksheet
    /// named after the survey. Returns the number of exported rows.
    ///
    /// # Side effects
    /// - Emits `export` logging events with duration and status.
    pub fn export_survey(
        &mut self,
        survey_id: SurveyId,
        spreadsheet: &str,
    ) -> Result<usize, ExportError> {
        let started_at = Instant::now();
        info!("event=export module=export status=start survey_id={survey_id}");

        let result = self.run_export(survey_id, spreadsheet);
        match &result {
            Ok(rows) => info!(
                "event=export module=export status=ok survey_id={survey_id} rows={rows} duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=export module=export status=error survey_id={survey_id} duration_ms={} error={err}",
                started_at.elapsed().as_millis()
            ),
        }
        result
    }

    fn run_export(
        &mut self,
        survey_id: SurveyId,
        spreadsheet: &str,
    ) -> Result<usize, ExportError> {
        let snapshot = self
            .source
            .survey_snapshot(survey_id)?
            .ok_or(ExportError::SurveyNotFound(survey_id))?;
        if snapshot.rows.is_empty() {
            return Err(ExportError::NoResponses(survey_id));
        }

        let destination = SheetDestination {
            spreadsheet: spreadsheet.to_string(),
            worksheet: snapshot.survey_name.clone(),
        };
        self.sink.write_snapshot(&destination, &snapshot)?;
        Ok(snapshot.rows.len())
    }
}
