//! Admission webhook policies

pub mod deletion;

pub use deletion::{
    BYPASS_ANNOTATION_KEY, BYPASS_ANNOTATION_VALUE, DecisionEngine, Denial, Evaluation, KindCount,
    KindError, KindQuery, ResourceTally, WorkloadKind,
};
