//! Assessment forms, scoring, threshold evaluation, and group assignment.
//!
//! Staff author forms and rules through [`AssessmentService`]; patient answers are scored by the
//! [`ScoringEngine`], matched against the form's bands, and stored through the
//! [`AssessmentRepository`] seam. Group membership is recalculated from each patient's latest
//! score per form by the [`RuleEvaluator`].

pub mod domain;
pub mod grouping;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;
pub mod validation;

#[cfg(test)]
mod tests;

pub use domain::{
    Actor, AnswerValue, Answers, Choice, EvaluationThreshold, Form, FormDraft, FormId,
    GroupAssignmentRule, GroupId, GroupMembership, MembershipSource, MultipleChoiceOptions,
    NumberOptions, PatientId, Question, QuestionId, QuestionOptions, RatingLabels, RatingOptions,
    RecurrenceSchedule, RuleDraft, RuleForm, RuleId, RuleOperator, SubmissionId,
    SubmissionRequest, SubmissionStatus, TextOptions, TrueFalseOptions,
};
pub use grouping::{evaluate_rule, RuleEvaluation, RuleEvaluator, RuleOutcome};
pub use repository::{
    AssessmentRepository, FormRecord, GroupRepository, RepositoryError, SubmissionRecord,
    SubmissionView,
};
pub use router::assessment_router;
pub use scoring::{
    compute_total_score, find_overlaps, match_threshold, score_answers, EvaluationOutcome,
    MissingScorePolicy, ScoreComponent, ScoringConfig, ScoringEngine, ThresholdMatch,
    ThresholdOverlap,
};
pub use service::{
    AssessmentService, AssessmentServiceError, PatientRecalculation, RecalculationFailure,
    RecalculationSummary,
};
pub use validation::{AuthoringGuard, AuthoringViolation, AuthoringWarning};
