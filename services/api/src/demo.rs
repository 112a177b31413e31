use crate::infra::{InMemoryAssessmentRepository, InMemoryGroupRepository};
use care_assess::assessments::{
    Actor, AnswerValue, Answers, AssessmentService, Choice, EvaluationOutcome,
    EvaluationThreshold, FormDraft, FormId, GroupId, MissingScorePolicy, MultipleChoiceOptions,
    NumberOptions, PatientId, Question, QuestionId, QuestionOptions, RatingOptions,
    RecurrenceSchedule, RuleDraft, RuleForm, RuleOperator, ScoringConfig, SubmissionRequest,
    TextOptions, TrueFalseOptions,
};
use care_assess::config::AppConfig;
use care_assess::error::AppError;
use clap::Args;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

type DemoService = AssessmentService<InMemoryAssessmentRepository, InMemoryGroupRepository>;

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Form definition (JSON) with questions and thresholds
    #[arg(long)]
    pub(crate) form: PathBuf,
    /// Answers (JSON object keyed by question id)
    #[arg(long)]
    pub(crate) answers: PathBuf,
    /// Print the full evaluation as JSON instead of a text summary
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Fail a group rule when any of its forms has no score for the patient
    #[arg(long)]
    pub(crate) strict_missing_scores: bool,
    /// Skip the group assignment portion of the demo
    #[arg(long)]
    pub(crate) skip_groups: bool,
}

fn in_memory_service(config: ScoringConfig) -> DemoService {
    AssessmentService::new(
        Arc::new(InMemoryAssessmentRepository::default()),
        Arc::new(InMemoryGroupRepository::default()),
        config,
    )
}

pub(crate) fn run_score(args: ScoreArgs) -> Result<(), AppError> {
    let ScoreArgs {
        form,
        answers,
        json,
    } = args;

    let config = AppConfig::load()?;
    let draft: FormDraft = serde_json::from_str(&fs::read_to_string(form)?)?;
    let answers: Answers = serde_json::from_str(&fs::read_to_string(answers)?)?;

    let outcome = score_draft(config.scoring, draft, &answers)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        render_outcome(&outcome);
    }
    Ok(())
}

pub(crate) fn score_draft(
    config: ScoringConfig,
    draft: FormDraft,
    answers: &Answers,
) -> Result<EvaluationOutcome, AppError> {
    let service = in_memory_service(config);
    let record = service.create_form(&Actor::system(), draft)?;
    for warning in &record.warnings {
        eprintln!("warning: {}", warning.message());
    }
    Ok(service.preview(&record.form.form_id, answers)?)
}

fn render_outcome(outcome: &EvaluationOutcome) {
    println!("Total score: {}", outcome.total_score);
    println!("Evaluation: {}", outcome.summary());
    if let Some(description) = &outcome.evaluation_description {
        println!("  {description}");
    }
    println!("Components:");
    for component in &outcome.components {
        println!(
            "  - Q{} [{}]: {} ({})",
            component.question_id, component.question_type, component.score, component.notes
        );
    }
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        strict_missing_scores,
        skip_groups,
    } = args;

    let mut config = AppConfig::load()?.scoring;
    if strict_missing_scores {
        config.missing_score_policy = MissingScorePolicy::FailRule;
    }
    let service = in_memory_service(config);
    let author = Actor::new("demo-coordinator");

    println!("Care assessment demo");
    let adl = service.create_form(&author, daily_living_form())?;
    let falls = service.create_form(&author, falls_risk_form())?;
    for record in [&adl, &falls] {
        println!(
            "- Form {} \"{}\": {} questions, {} bands",
            record.form.form_id.0,
            record.form.title,
            record.form.questions.len(),
            record.form.thresholds.len()
        );
        for warning in &record.warnings {
            println!("  warning: {}", warning.message());
        }
    }

    println!("\nSubmissions");
    for (patient, form_id, answers) in sample_submissions() {
        let record = match service.submit(
            &FormId(form_id.to_string()),
            SubmissionRequest {
                patient_id: PatientId(patient.to_string()),
                answers,
            },
        ) {
            Ok(record) => record,
            Err(err) => {
                println!("- {patient} / {form_id}: rejected ({err})");
                continue;
            }
        };
        println!(
            "- {} / {}: score {} -> {}",
            record.patient_id.0,
            record.form_id.0,
            record.total_evaluation_score,
            record.evaluation_summary()
        );
    }

    if skip_groups {
        return Ok(());
    }

    println!(
        "\nGroup assignment (missing scores: {:?})",
        service.config().missing_score_policy
    );
    for draft in sample_rules() {
        let rule = service.create_rule(&author, draft)?;
        println!(
            "- Rule {} \"{}\" -> group {} ({} {:?}..{:?})",
            rule.rule_id.0,
            rule.name,
            rule.group_id.0,
            rule.operator.label(),
            rule.min_score,
            rule.max_score
        );
    }

    let summary = service.recalculate_all()?;
    println!(
        "\nRecalculated {} patients, {} memberships added, {} failures",
        summary.patients_processed,
        summary.memberships_added,
        summary.failures.len()
    );
    for failure in &summary.failures {
        println!("  - {}: {}", failure.patient_id.0, failure.error);
    }

    for patient in ["patient-001", "patient-002", "patient-003"] {
        let patient_id = PatientId(patient.to_string());
        let groups = service.patient_groups(&patient_id)?;
        if groups.is_empty() {
            println!("- {patient}: no groups");
        } else {
            let names: Vec<&str> = groups.iter().map(|m| m.group_id.0.as_str()).collect();
            println!("- {patient}: {}", names.join(", "));
        }
    }

    Ok(())
}

fn band(min: f64, max: f64, result: &str, description: &str) -> EvaluationThreshold {
    EvaluationThreshold {
        min_score: min,
        max_score: max,
        result: result.to_string(),
        description: description.to_string(),
    }
}

fn choices(question_id: u32, text: &str, options: &[(&str, f64)]) -> Question {
    Question {
        question_id: QuestionId(question_id),
        question_text: text.to_string(),
        options: QuestionOptions::MultipleChoice(MultipleChoiceOptions {
            choices: options
                .iter()
                .map(|(label, score)| Choice {
                    text: label.to_string(),
                    score: *score,
                })
                .collect(),
            allow_other: false,
        }),
        is_required: true,
    }
}

pub(crate) fn daily_living_form() -> FormDraft {
    FormDraft {
        form_id: Some(FormId("adl-weekly".to_string())),
        title: "Activities of daily living".to_string(),
        description: "Weekly functional review".to_string(),
        questions: vec![
            choices(
                1,
                "Bathing",
                &[("Independent", 0.0), ("Needs help", 5.0), ("Dependent", 10.0)],
            ),
            Question {
                question_id: QuestionId(2),
                question_text: "Mobility (1 = walks freely, 5 = bed bound)".to_string(),
                options: QuestionOptions::Rating(RatingOptions {
                    score_multiplier: Some(2.0),
                    ..RatingOptions::default()
                }),
                is_required: true,
            },
            Question {
                question_id: QuestionId(3),
                question_text: "Carer notes".to_string(),
                options: QuestionOptions::Text(TextOptions {
                    multiline: true,
                    ..TextOptions::default()
                }),
                is_required: false,
            },
        ],
        thresholds: vec![
            band(0.0, 9.0, "independent", "No additional support"),
            band(10.0, 14.0, "partial", "Daily support visits"),
            band(15.0, 20.0, "dependent", "Full time care plan"),
        ],
        recurrence: Some(RecurrenceSchedule { every_days: 7 }),
    }
}

pub(crate) fn falls_risk_form() -> FormDraft {
    FormDraft {
        form_id: Some(FormId("falls-risk".to_string())),
        title: "Falls risk".to_string(),
        description: "Monthly falls screening".to_string(),
        questions: vec![
            Question {
                question_id: QuestionId(1),
                question_text: "Falls in the past month".to_string(),
                options: QuestionOptions::Number(NumberOptions {
                    min: Some(0.0),
                    max: Some(10.0),
                    unit: Some("falls".to_string()),
                    score_multiplier: Some(3.0),
                    ..NumberOptions::default()
                }),
                is_required: true,
            },
            Question {
                question_id: QuestionId(2),
                question_text: "Uses a walking aid".to_string(),
                options: QuestionOptions::TrueFalse(TrueFalseOptions {
                    true_score: Some(2.0),
                    false_score: Some(0.0),
                    ..TrueFalseOptions::default()
                }),
                is_required: true,
            },
        ],
        thresholds: vec![
            band(0.0, 2.0, "low", "Routine review"),
            band(3.0, 8.0, "moderate", "Physio referral"),
            band(9.0, 32.0, "high", "Falls prevention plan"),
        ],
        recurrence: Some(RecurrenceSchedule { every_days: 30 }),
    }
}

fn answers(pairs: &[(u32, &str)]) -> Answers {
    pairs
        .iter()
        .map(|(id, value)| (QuestionId(*id), AnswerValue::from(*value)))
        .collect()
}

fn sample_submissions() -> Vec<(&'static str, &'static str, Answers)> {
    vec![
        (
            "patient-001",
            "adl-weekly",
            answers(&[(1, "Dependent"), (2, "4"), (3, "Needs hoist")]),
        ),
        ("patient-001", "falls-risk", answers(&[(1, "2"), (2, "true")])),
        (
            "patient-002",
            "adl-weekly",
            answers(&[(1, "Needs help"), (2, "2")]),
        ),
        (
            "patient-003",
            "adl-weekly",
            answers(&[(1, "Independent"), (2, "1")]),
        ),
        ("patient-003", "falls-risk", answers(&[(1, "0"), (2, "false")])),
    ]
}

fn sample_rules() -> Vec<RuleDraft> {
    vec![
        RuleDraft {
            name: "High dependency".to_string(),
            group_id: GroupId("high-dependency".to_string()),
            forms: vec![RuleForm {
                form_id: FormId("adl-weekly".to_string()),
                weight: 1.0,
            }],
            operator: RuleOperator::Between,
            min_score: Some(15.0),
            max_score: Some(20.0),
            is_active: true,
        },
        RuleDraft {
            name: "Falls prevention".to_string(),
            group_id: GroupId("falls-prevention".to_string()),
            forms: vec![
                RuleForm {
                    form_id: FormId("adl-weekly".to_string()),
                    weight: 0.5,
                },
                RuleForm {
                    form_id: FormId("falls-risk".to_string()),
                    weight: 1.0,
                },
            ],
            operator: RuleOperator::Gte,
            min_score: Some(12.0),
            max_score: None,
            is_active: true,
        },
    ]
}
