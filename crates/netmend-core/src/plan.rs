//! The plan partition.
//!
//! A plan is split into three parts that together form the full ordered
//! sequence of steps for a session:
//!
//! ```text
//!   history ++ [current?] ++ remaining
//! ```
//!
//! - `history` is append-only. A step enters it exactly once, after its
//!   analysis report has been attached.
//! - `current` is set only while a step is in flight (dequeued but not yet
//!   committed).
//! - `remaining` is replaced atomically when the analyzer replans.
//!
//! The counters make the partition checkable: every step that was ever
//! introduced is either in one of the three parts, was discarded by a
//! replacement, or was dropped as a duplicate of the step just executed.

use crate::analysis::ActionAnalysisReport;
use crate::step::{StepValidationError, TroubleshootingStep};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionPlan {
    history: Vec<TroubleshootingStep>,
    current: Option<TroubleshootingStep>,
    remaining: VecDeque<TroubleshootingStep>,

    /// Steps ever added, by the initial plan or by replacements.
    introduced: usize,
    /// Pending steps thrown away by replacements.
    discarded: usize,
    /// Leading duplicates removed from replacements.
    dropped: usize,
    /// Number of dequeues so far. This is the step budget counter.
    dequeued: usize,
}

/// Result of [`ActionPlan::replace_remaining`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplaceOutcome {
    /// Steps now in `remaining`.
    pub installed: usize,
    /// Pending steps that were thrown away.
    pub discarded: usize,
    /// Whether a leading copy of the just-executed step was removed.
    pub dropped_duplicate: bool,
}

impl ActionPlan {
    pub fn new(steps: Vec<TroubleshootingStep>) -> Self {
        Self {
            introduced: steps.len(),
            remaining: steps.into(),
            ..Default::default()
        }
    }

    pub fn history(&self) -> &[TroubleshootingStep] {
        &self.history
    }

    pub fn current(&self) -> Option<&TroubleshootingStep> {
        self.current.as_ref()
    }

    pub fn remaining(&self) -> &VecDeque<TroubleshootingStep> {
        &self.remaining
    }

    pub fn head(&self) -> Option<&TroubleshootingStep> {
        self.remaining.front()
    }

    pub fn dequeued(&self) -> usize {
        self.dequeued
    }

    pub fn introduced(&self) -> usize {
        self.introduced
    }

    /// No step in flight and nothing left to run.
    pub fn is_complete(&self) -> bool {
        self.current.is_none() && self.remaining.is_empty()
    }

    /// The in-flight step if there is one, else the last committed step.
    pub fn last_executed(&self) -> Option<&TroubleshootingStep> {
        self.current.as_ref().or(self.history.last())
    }

    /// Whether the current step already carries its report.
    pub fn current_is_analyzed(&self) -> bool {
        self.current
            .as_ref()
            .is_some_and(|s| s.analysis_report.is_some())
    }

    /// Pop the head of `remaining` into `current`.
    pub fn dequeue(&mut self) -> Result<&TroubleshootingStep, PlanError> {
        if self.current.is_some() {
            return Err(PlanError::StepInFlight);
        }
        let step = self.remaining.pop_front().ok_or(PlanError::Empty)?;
        self.dequeued += 1;
        Ok(self.current.insert(step))
    }

    /// Attach the analysis report to the in-flight step.
    pub fn annotate_current(&mut self, report: ActionAnalysisReport) -> Result<(), PlanError> {
        let current = self.current.as_mut().ok_or(PlanError::NoStepInFlight)?;
        current.attach_report(report)?;
        Ok(())
    }

    /// Move the analyzed in-flight step into history.
    pub fn commit_current(&mut self) -> Result<&TroubleshootingStep, PlanError> {
        if !self.current_is_analyzed() {
            return Err(match self.current {
                Some(_) => PlanError::MissingReport,
                None => PlanError::NoStepInFlight,
            });
        }
        let step = self.current.take().ok_or(PlanError::NoStepInFlight)?;
        self.history.push(step);
        self.history.last().ok_or(PlanError::NoStepInFlight)
    }

    /// Atomically replace `remaining`.
    ///
    /// A leading replacement step matching the just-executed step is removed.
    pub fn replace_remaining(&mut self, mut steps: Vec<TroubleshootingStep>) -> ReplaceOutcome {
        let dropped_duplicate = match (self.last_executed(), steps.first()) {
            (Some(last), Some(first)) => last.same_action(first),
            _ => false,
        };

        self.introduced += steps.len();
        if dropped_duplicate {
            steps.remove(0);
            self.dropped += 1;
        }

        let discarded = self.remaining.len();
        self.discarded += discarded;
        self.remaining = steps.into();

        ReplaceOutcome {
            installed: self.remaining.len(),
            discarded,
            dropped_duplicate,
        }
    }

    /// Whether `steps` equals `remaining` with template variables filled in,
    /// ignoring a leading copy of the last executed step.
    pub fn is_template_fill(&self, steps: &[TroubleshootingStep]) -> bool {
        let steps = match (self.last_executed(), steps.first()) {
            (Some(last), Some(first)) if last.same_action(first) => &steps[1..],
            _ => steps,
        };
        steps.len() == self.remaining.len()
            && steps
                .iter()
                .zip(&self.remaining)
                .all(|(new, old)| new.is_template_fill_of(old))
    }

    /// Check the partition invariant.
    pub fn is_consistent(&self) -> bool {
        let held = self.history.len() + self.remaining.len() + usize::from(self.current.is_some());
        held + self.discarded + self.dropped == self.introduced
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlanError {
    #[error("a step is already in flight")]
    StepInFlight,

    #[error("no steps remain")]
    Empty,

    #[error("no step is in flight")]
    NoStepInFlight,

    #[error("the in-flight step has no analysis report")]
    MissingReport,

    #[error(transparent)]
    Step(#[from] StepValidationError),
}
