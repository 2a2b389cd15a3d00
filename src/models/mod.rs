//! Data models shared by the pipeline
//!
//! Parser envelopes, execution lifecycle signals and the step definition catalog.

#![allow(dead_code)]

pub(crate) mod envelope;
mod lifecycle;
mod location;
mod step_definition;

pub use envelope::{
    Envelope, Feature, GherkinDocument, Pickle, PickleStep, PickleStepArgument, ScenarioDefinition,
    Source, Tag,
};
pub use lifecycle::{
    AttemptRef, CaseFinished, LifecycleEvent, RunFinished, Status, StepAttachment, StepFinished,
    StepResult, TestCase, TestCaseResult, TestStep,
};
pub use location::{relative_uri, Location};
pub use step_definition::{PatternType, StepDefinition};
