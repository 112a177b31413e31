use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identifier wrapper for assessment forms.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FormId(pub String);

/// Identifier wrapper for service users (patients).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PatientId(pub String);

/// Identifier wrapper for patient groups (cohorts).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RuleId(pub String);

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubmissionId(pub String);

/// Question identifier, unique within a single form.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct QuestionId(pub u32);

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Staff identity passed explicitly into authoring operations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub staff_id: String,
}

impl Actor {
    pub fn new(staff_id: impl Into<String>) -> Self {
        Self {
            staff_id: staff_id.into(),
        }
    }

    pub fn system() -> Self {
        Self::new("system")
    }
}

/// A single answer choice for a multiple choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub text: String,
    #[serde(default)]
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipleChoiceOptions {
    #[serde(default)]
    pub choices: Vec<Choice>,
    #[serde(default)]
    pub allow_other: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub multiline: bool,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RatingLabels {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingOptions {
    #[serde(default = "default_rating_min")]
    pub min: i64,
    #[serde(default = "default_rating_max")]
    pub max: i64,
    #[serde(default = "default_step")]
    pub step: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_multiplier: Option<f64>,
    #[serde(default)]
    pub labels: RatingLabels,
}

impl Default for RatingOptions {
    fn default() -> Self {
        Self {
            min: default_rating_min(),
            max: default_rating_max(),
            step: default_step(),
            score_multiplier: None,
            labels: RatingLabels::default(),
        }
    }
}

fn default_rating_min() -> i64 {
    1
}

fn default_rating_max() -> i64 {
    5
}

fn default_step() -> i64 {
    1
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrueFalseOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub true_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub false_score: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NumberOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score_multiplier: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placeholder: Option<String>,
}

/// Type-specific question options, dispatched by `question_type`.
#[derive(Debug, Clone, PartialEq)]
pub enum QuestionOptions {
    MultipleChoice(MultipleChoiceOptions),
    Text(TextOptions),
    Rating(RatingOptions),
    TrueFalse(TrueFalseOptions),
    Number(NumberOptions),
    /// A `question_type` this build does not know; never contributes to a score.
    Unsupported { question_type: String, options: Value },
}

impl QuestionOptions {
    pub fn question_type(&self) -> &str {
        match self {
            QuestionOptions::MultipleChoice(_) => "multiple_choice",
            QuestionOptions::Text(_) => "text",
            QuestionOptions::Rating(_) => "rating",
            QuestionOptions::TrueFalse(_) => "true_false",
            QuestionOptions::Number(_) => "number",
            QuestionOptions::Unsupported { question_type, .. } => question_type,
        }
    }
}

/// A question as authored in the form builder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "QuestionPayload", into = "QuestionPayload")]
pub struct Question {
    pub question_id: QuestionId,
    pub question_text: String,
    pub options: QuestionOptions,
    pub is_required: bool,
}

/// Wire shape of a question: `question_type` plus a loosely typed `options` object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionPayload {
    question_id: QuestionId,
    #[serde(default)]
    question_text: String,
    question_type: String,
    #[serde(default)]
    options: Value,
    #[serde(default)]
    is_required: bool,
}

impl TryFrom<QuestionPayload> for Question {
    type Error = serde_json::Error;

    fn try_from(payload: QuestionPayload) -> Result<Self, Self::Error> {
        let QuestionPayload {
            question_id,
            question_text,
            question_type,
            options,
            is_required,
        } = payload;

        let options = match question_type.as_str() {
            "multiple_choice" => QuestionOptions::MultipleChoice(match options {
                Value::Array(_) => MultipleChoiceOptions {
                    choices: serde_json::from_value(options)?,
                    allow_other: false,
                },
                Value::Null => MultipleChoiceOptions::default(),
                other => serde_json::from_value(other)?,
            }),
            "text" => QuestionOptions::Text(options_or_default(options)?),
            "rating" => QuestionOptions::Rating(options_or_default(options)?),
            "true_false" => QuestionOptions::TrueFalse(options_or_default(options)?),
            "number" => QuestionOptions::Number(options_or_default(options)?),
            _ => QuestionOptions::Unsupported {
                question_type,
                options,
            },
        };

        Ok(Question {
            question_id,
            question_text,
            options,
            is_required,
        })
    }
}

fn options_or_default<T>(options: Value) -> Result<T, serde_json::Error>
where
    T: Default + serde::de::DeserializeOwned,
{
    match options {
        Value::Null => Ok(T::default()),
        other => serde_json::from_value(other),
    }
}

impl From<Question> for QuestionPayload {
    fn from(question: Question) -> Self {
        let question_type = question.options.question_type().to_string();
        let options = match question.options {
            QuestionOptions::MultipleChoice(options) => serde_json::to_value(options),
            QuestionOptions::Text(options) => serde_json::to_value(options),
            QuestionOptions::Rating(options) => serde_json::to_value(options),
            QuestionOptions::TrueFalse(options) => serde_json::to_value(options),
            QuestionOptions::Number(options) => serde_json::to_value(options),
            QuestionOptions::Unsupported { options, .. } => Ok(options),
        }
        .unwrap_or(Value::Null);

        QuestionPayload {
            question_id: question.question_id,
            question_text: question.question_text,
            question_type,
            options,
            is_required: question.is_required,
        }
    }
}

/// Raw answer value. Numbers and booleans sent over the wire are kept in string form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "AnswerInput")]
pub struct AnswerValue(pub String);

impl AnswerValue {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank or `null` on the wire.
    pub fn is_unanswered(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for AnswerValue {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
pub enum AnswerInput {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Flag(bool),
    Null,
}

impl From<AnswerInput> for AnswerValue {
    fn from(input: AnswerInput) -> Self {
        match input {
            AnswerInput::Text(text) => AnswerValue(text),
            AnswerInput::Integer(value) => AnswerValue(value.to_string()),
            AnswerInput::Decimal(value) => AnswerValue(value.to_string()),
            AnswerInput::Flag(flag) => AnswerValue(flag.to_string()),
            AnswerInput::Null => AnswerValue(String::new()),
        }
    }
}

/// Answers keyed by question id, merged into one object per submission.
pub type Answers = BTreeMap<QuestionId, AnswerValue>;

/// Score band mapping an inclusive `[min_score, max_score]` range to a result label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationThreshold {
    pub min_score: f64,
    pub max_score: f64,
    pub result: String,
    #[serde(default)]
    pub description: String,
}

impl EvaluationThreshold {
    pub fn contains(&self, score: f64) -> bool {
        score >= self.min_score && score <= self.max_score
    }
}

/// Optional re-assessment cadence for a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceSchedule {
    pub every_days: u32,
}

impl RecurrenceSchedule {
    pub fn next_due(&self, last_submitted_at: DateTime<Utc>) -> DateTime<Utc> {
        last_submitted_at + Duration::days(i64::from(self.every_days))
    }
}

/// Form definition as submitted by the form builder, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    #[serde(default)]
    pub form_id: Option<FormId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub questions: Vec<Question>,
    #[serde(default)]
    pub thresholds: Vec<EvaluationThreshold>,
    #[serde(default)]
    pub recurrence: Option<RecurrenceSchedule>,
}

/// A validated, named and ordered set of questions with evaluation thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Form {
    pub form_id: FormId,
    pub title: String,
    pub description: String,
    pub questions: Vec<Question>,
    pub thresholds: Vec<EvaluationThreshold>,
    pub recurrence: Option<RecurrenceSchedule>,
}

impl Form {
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions
            .iter()
            .find(|question| question.question_id == id)
    }

    /// Whether the form should be presented again given the last submission time.
    pub fn is_due(&self, last_submitted_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match (last_submitted_at, self.recurrence) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(last), Some(schedule)) => schedule.next_due(last) <= now,
        }
    }
}

/// Comparison applied to a rule's weighted aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RuleOperator {
    Gte,
    Lte,
    Eq,
    Between,
    Unsupported(String),
}

impl RuleOperator {
    pub fn label(&self) -> &str {
        match self {
            RuleOperator::Gte => "gte",
            RuleOperator::Lte => "lte",
            RuleOperator::Eq => "eq",
            RuleOperator::Between => "between",
            RuleOperator::Unsupported(raw) => raw,
        }
    }
}

impl From<String> for RuleOperator {
    fn from(raw: String) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "gte" => RuleOperator::Gte,
            "lte" => RuleOperator::Lte,
            "eq" => RuleOperator::Eq,
            "between" => RuleOperator::Between,
            _ => RuleOperator::Unsupported(raw),
        }
    }
}

impl From<RuleOperator> for String {
    fn from(operator: RuleOperator) -> Self {
        operator.label().to_string()
    }
}

/// Weighted reference from a rule to one form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleForm {
    pub form_id: FormId,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

fn default_weight() -> f64 {
    1.0
}

/// Rule definition as authored, before validation assigns an id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub group_id: GroupId,
    pub forms: Vec<RuleForm>,
    pub operator: RuleOperator,
    #[serde(default)]
    pub min_score: Option<f64>,
    #[serde(default)]
    pub max_score: Option<f64>,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Weighted-score condition over one or more forms implying membership of one group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupAssignmentRule {
    pub rule_id: RuleId,
    pub name: String,
    pub group_id: GroupId,
    pub forms: Vec<RuleForm>,
    pub operator: RuleOperator,
    pub min_score: Option<f64>,
    pub max_score: Option<f64>,
    pub is_active: bool,
    #[serde(default)]
    pub created_by: Option<String>,
}

/// How a patient came to be a member of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MembershipSource {
    Rule { rule_id: RuleId },
    Manual { staff_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembership {
    pub patient_id: PatientId,
    pub group_id: GroupId,
    pub source: MembershipSource,
    pub assigned_at: DateTime<Utc>,
}

/// Lifecycle marker stored with every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    /// Stored without a matching evaluation band.
    Completed,
    /// Stored with a result from a matching band.
    Evaluated,
}

impl SubmissionStatus {
    pub const fn label(self) -> &'static str {
        match self {
            SubmissionStatus::Completed => "completed",
            SubmissionStatus::Evaluated => "evaluated",
        }
    }
}

/// Inbound request to record one patient's completed answer set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmissionRequest {
    pub patient_id: PatientId,
    pub answers: Answers,
}
