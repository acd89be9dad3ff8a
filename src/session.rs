//! Detail view session: one record, a live parameter assignment, and the
//! preview host showing it.
//!
//! Every accepted parameter change recomposes the document and hands it to
//! the host; the host decides whether a remount is needed.

use tracing::debug;

use crate::compose;
use crate::host::{AssignOutcome, IsolationBackend, PreviewHost};
use crate::params::{ParamValue, ParameterAssignment};
use crate::record::AnimationRecord;
use crate::{ComposeError, ComposeOptions, ComposedDocument};

pub struct DetailSession<B: IsolationBackend> {
    record: AnimationRecord,
    assignment: ParameterAssignment,
    options: ComposeOptions,
    document: ComposedDocument,
    host: PreviewHost<B>,
}

impl<B: IsolationBackend> DetailSession<B> {
    /// Open `record` at its default values and mount the first document.
    pub fn new(record: AnimationRecord, host: PreviewHost<B>) -> Result<Self, ComposeError> {
        Self::with_options(record, host, ComposeOptions::default())
    }

    pub fn with_options(
        record: AnimationRecord,
        mut host: PreviewHost<B>,
        options: ComposeOptions,
    ) -> Result<Self, ComposeError> {
        record.validate()?;
        let assignment = ParameterAssignment::from_defaults(&record);
        let document = compose::compose_document(&record, &assignment, &options);
        host.assign(document.clone())?;
        Ok(Self {
            record,
            assignment,
            options,
            document,
            host,
        })
    }

    /// Set one parameter. Invalid values are rejected and leave the
    /// session untouched.
    pub fn set_param(&mut self, id: &str, value: ParamValue) -> Result<AssignOutcome, ComposeError> {
        let mut next = self.assignment.clone();
        next.set(&self.record, id, value)?;
        self.apply(next)
    }

    /// Set one parameter from the textual value a control reports.
    pub fn set_param_raw(&mut self, id: &str, raw: &str) -> Result<AssignOutcome, ComposeError> {
        let mut next = self.assignment.clone();
        next.set_raw(&self.record, id, raw)?;
        self.apply(next)
    }

    /// Back to every default.
    pub fn reset(&mut self) -> Result<AssignOutcome, ComposeError> {
        self.apply(ParameterAssignment::from_defaults(&self.record))
    }

    fn apply(&mut self, assignment: ParameterAssignment) -> Result<AssignOutcome, ComposeError> {
        let document = compose::compose_document(&self.record, &assignment, &self.options);
        let outcome = self.host.assign(document.clone())?;
        debug!(record = %self.record.id, ?outcome, "applied assignment");
        self.assignment = assignment;
        self.document = document;
        Ok(outcome)
    }

    /// Export text for the current assignment.
    pub fn export(&self) -> String {
        compose::compose_export(&self.record, &self.assignment, &self.options)
    }

    pub fn document(&self) -> &ComposedDocument {
        &self.document
    }

    pub fn record(&self) -> &AnimationRecord {
        &self.record
    }

    pub fn assignment(&self) -> &ParameterAssignment {
        &self.assignment
    }

    pub fn host(&self) -> &PreviewHost<B> {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut PreviewHost<B> {
        &mut self.host
    }

    /// Dispose the host and hand back the final assignment.
    pub fn close(mut self) -> ParameterAssignment {
        self.host.dispose();
        std::mem::take(&mut self.assignment)
    }
}
