//! Data models for suite execution
//!
//! Discovery descriptors consumed by the engine and the outcome tree it produces.

mod descriptor;
mod outcome;

pub use descriptor::{
    method_body, DataSet, HookDescriptor, Invocation, MethodBody, SuiteDescriptor,
    SuiteMethodType, TestDescriptor,
};
pub use outcome::{
    Failure, FailureKind, RunOutcome, Status, SuiteMethodOutcome, SuiteOutcome, TestOutcome,
};
