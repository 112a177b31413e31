use tracing::warn;

use super::super::domain::{Answers, Question, QuestionId, QuestionOptions};
use super::ScoreComponent;

/// Sum of every answered question's contribution. Pure; no rounding applied.
pub fn compute_total_score(answers: &Answers, questions: &[Question]) -> f64 {
    score_answers(answers, questions)
        .iter()
        .map(|component| component.score)
        .sum()
}

/// Per-question breakdown in answer order. Unanswered and unknown questions are skipped.
pub fn score_answers(answers: &Answers, questions: &[Question]) -> Vec<ScoreComponent> {
    let mut components = Vec::with_capacity(answers.len());

    for (question_id, raw) in answers {
        if raw.is_unanswered() {
            continue;
        }
        let Some(question) = find_question(questions, *question_id) else {
            continue;
        };

        let (score, notes) = score_answer(question, raw.as_str());
        components.push(ScoreComponent {
            question_id: *question_id,
            question_type: question.options.question_type().to_string(),
            score,
            notes,
        });
    }

    components
}

fn find_question(questions: &[Question], id: QuestionId) -> Option<&Question> {
    questions.iter().find(|question| question.question_id == id)
}

fn score_answer(question: &Question, raw: &str) -> (f64, String) {
    match &question.options {
        QuestionOptions::MultipleChoice(options) => {
            match options.choices.iter().find(|choice| choice.text == raw) {
                Some(choice) => (choice.score, format!("selected '{}'", choice.text)),
                None => (0.0, format!("'{raw}' matches no choice")),
            }
        }
        QuestionOptions::TrueFalse(options) => match raw {
            "true" => (options.true_score.unwrap_or(0.0), "answered true".to_string()),
            "false" => (
                options.false_score.unwrap_or(0.0),
                "answered false".to_string(),
            ),
            other => (0.0, format!("'{other}' is not a boolean answer")),
        },
        QuestionOptions::Rating(options) => {
            scaled_value(raw, options.score_multiplier.unwrap_or(1.0))
        }
        QuestionOptions::Number(options) => {
            scaled_value(raw, options.score_multiplier.unwrap_or(1.0))
        }
        QuestionOptions::Text(_) => (0.0, "free text is not scored".to_string()),
        QuestionOptions::Unsupported { question_type, .. } => {
            warn!(
                question_id = %question.question_id,
                question_type = %question_type,
                "unsupported question type scored as zero"
            );
            (0.0, format!("unsupported question type '{question_type}'"))
        }
    }
}

fn scaled_value(raw: &str, multiplier: f64) -> (f64, String) {
    let value = parse_leading_integer(raw).unwrap_or(0.0);
    (value * multiplier, format!("{value} x {multiplier}"))
}

/// Lenient integer parse: optional whitespace and sign, then the leading run of digits.
/// `"4.7"` yields 4 and `"abc"` yields `None`. Digit runs beyond `i64` keep their magnitude.
pub(crate) fn parse_leading_integer(raw: &str) -> Option<f64> {
    let trimmed = raw.trim_start();
    let (negative, rest) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    if digits_end == 0 {
        return None;
    }

    let magnitude = rest[..digits_end].parse::<f64>().ok()?;
    Some(if negative { -magnitude } else { magnitude })
}

#[cfg(test)]
mod tests {
    use super::parse_leading_integer;

    #[test]
    fn parses_like_a_lenient_integer_reader() {
        assert_eq!(parse_leading_integer("42"), Some(42.0));
        assert_eq!(parse_leading_integer("  7 "), Some(7.0));
        assert_eq!(parse_leading_integer("4.7"), Some(4.0));
        assert_eq!(parse_leading_integer("-3"), Some(-3.0));
        assert_eq!(parse_leading_integer("+12kg"), Some(12.0));
        assert_eq!(parse_leading_integer("abc"), None);
        assert_eq!(parse_leading_integer(""), None);
        assert_eq!(parse_leading_integer("-"), None);
        assert_eq!(
            parse_leading_integer("99999999999999999999"),
            Some(99_999_999_999_999_999_999.0)
        );
    }
}
