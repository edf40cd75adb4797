//! Answer evaluation, dispatched on `ExerciseType`.
//!
//! The match in [`evaluate`] has one arm per exercise type and no wildcard, so
//! adding a type fails to compile until it has an evaluator.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Exercise, ExerciseType};

/// Raw answer submitted by the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum AnswerInput {
    /// Typed text, or a speech transcript.
    Text(String),
    /// One of the options offered by the exercise.
    Choice(String),
    /// Verdict pushed by an external recognizer or listener check.
    Judgement(bool),
}

impl AnswerInput {
    #[must_use]
    pub fn text(value: impl Into<String>) -> Self {
        Self::Text(value.into())
    }

    #[must_use]
    pub fn choice(value: impl Into<String>) -> Self {
        Self::Choice(value.into())
    }

    fn label(&self) -> &'static str {
        match self {
            AnswerInput::Text(_) => "text",
            AnswerInput::Choice(_) => "choice",
            AnswerInput::Judgement(_) => "judgement",
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum EvaluationError {
    #[error("{kind} exercises do not accept a {input} answer")]
    UnsupportedInput {
        kind: ExerciseType,
        input: &'static str,
    },
    #[error("answer cannot be empty")]
    EmptyAnswer,
    #[error("{0:?} is not one of the offered options")]
    UnknownOption(String),
}

/// Judge `input` against `exercise`.
///
/// # Errors
///
/// Returns `EvaluationError` when the input shape does not fit the exercise
/// type, the text is blank, or a choice is not among the offered options.
/// Errors never count as a wrong answer.
pub fn evaluate(exercise: &Exercise, input: &AnswerInput) -> Result<bool, EvaluationError> {
    match exercise.kind() {
        ExerciseType::WordMatching => choose(exercise, input),
        ExerciseType::Quiz => choose(exercise, input),
        ExerciseType::MultipleChoice => choose(exercise, input),
        ExerciseType::FillInBlanks => type_in(exercise, input),
        ExerciseType::Listening => listen(exercise, input),
        ExerciseType::Speaking => speak(exercise, input),
        ExerciseType::SpeechRecognition => speak(exercise, input),
    }
}

fn unsupported(exercise: &Exercise, input: &AnswerInput) -> EvaluationError {
    EvaluationError::UnsupportedInput {
        kind: exercise.kind(),
        input: input.label(),
    }
}

/// Exact match against one of the offered options.
fn choose(exercise: &Exercise, input: &AnswerInput) -> Result<bool, EvaluationError> {
    let AnswerInput::Choice(picked) = input else {
        return Err(unsupported(exercise, input));
    };
    let picked = picked.trim();
    if picked.is_empty() {
        return Err(EvaluationError::EmptyAnswer);
    }
    let offered = exercise.options().unwrap_or_default();
    if !offered.iter().any(|o| o == picked) {
        return Err(EvaluationError::UnknownOption(picked.to_owned()));
    }
    Ok(picked == exercise.correct_answer())
}

/// Trimmed, case-insensitive comparison.
fn type_in(exercise: &Exercise, input: &AnswerInput) -> Result<bool, EvaluationError> {
    let AnswerInput::Text(text) = input else {
        return Err(unsupported(exercise, input));
    };
    matches_text(exercise, text)
}

fn listen(exercise: &Exercise, input: &AnswerInput) -> Result<bool, EvaluationError> {
    match input {
        AnswerInput::Text(text) => matches_text(exercise, text),
        AnswerInput::Judgement(verdict) => Ok(*verdict),
        AnswerInput::Choice(_) => Err(unsupported(exercise, input)),
    }
}

fn speak(exercise: &Exercise, input: &AnswerInput) -> Result<bool, EvaluationError> {
    match input {
        AnswerInput::Judgement(verdict) => Ok(*verdict),
        AnswerInput::Text(transcript) => matches_text(exercise, transcript),
        AnswerInput::Choice(_) => Err(unsupported(exercise, input)),
    }
}

fn matches_text(exercise: &Exercise, text: &str) -> Result<bool, EvaluationError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(EvaluationError::EmptyAnswer);
    }
    Ok(text.to_lowercase() == exercise.correct_answer().to_lowercase())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExerciseDraft, ExerciseId, WordId};

    fn word() -> WordId {
        WordId::new("merhaba").unwrap()
    }

    fn matching() -> Exercise {
        Exercise::word_matching(
            ExerciseId::new(1),
            word(),
            "Merhaba",
            "Hello",
            &["Hello", "Goodbye", "Thanks"],
        )
        .unwrap()
    }

    #[test]
    fn choice_matches_exact_option() {
        let ex = matching();
        assert!(evaluate(&ex, &AnswerInput::choice("Hello")).unwrap());
        assert!(!evaluate(&ex, &AnswerInput::choice("Goodbye")).unwrap());
    }

    #[test]
    fn choice_outside_options_is_an_error() {
        let err = evaluate(&matching(), &AnswerInput::choice("hello")).unwrap_err();
        assert_eq!(err, EvaluationError::UnknownOption("hello".into()));
    }

    #[test]
    fn text_ignores_case_and_padding() {
        let ex = Exercise::fill_in_blanks(ExerciseId::new(2), word(), "Nasıl___?", "sın", None)
            .unwrap();
        assert!(evaluate(&ex, &AnswerInput::text("  SıN ")).unwrap());
        assert!(!evaluate(&ex, &AnswerInput::text("sin")).unwrap());
        assert_eq!(
            evaluate(&ex, &AnswerInput::text("   ")).unwrap_err(),
            EvaluationError::EmptyAnswer
        );
    }

    #[test]
    fn spoken_types_accept_judgement_and_transcript() {
        let ex = Exercise::speaking(ExerciseId::new(3), word(), "Merhaba").unwrap();
        assert!(evaluate(&ex, &AnswerInput::Judgement(true)).unwrap());
        assert!(!evaluate(&ex, &AnswerInput::Judgement(false)).unwrap());
        assert!(evaluate(&ex, &AnswerInput::text("merhaba")).unwrap());

        let rec = ExerciseDraft::new(
            ExerciseId::new(4),
            word(),
            ExerciseType::SpeechRecognition,
            "Say it",
            "Merhaba",
        )
        .validate()
        .unwrap();
        assert!(evaluate(&rec, &AnswerInput::Judgement(true)).unwrap());
    }

    #[test]
    fn listening_accepts_judgement() {
        let ex = Exercise::listening(ExerciseId::new(5), word(), "Merhaba").unwrap();
        assert!(evaluate(&ex, &AnswerInput::Judgement(true)).unwrap());
        assert!(evaluate(&ex, &AnswerInput::text("MERHABA")).unwrap());
    }

    #[test]
    fn mismatched_input_shape_is_rejected() {
        let err = evaluate(&matching(), &AnswerInput::text("Hello")).unwrap_err();
        assert!(matches!(err, EvaluationError::UnsupportedInput { input: "text", .. }));

        let ex = Exercise::fill_in_blanks(ExerciseId::new(2), word(), "Nasıl___?", "sın", None)
            .unwrap();
        assert!(evaluate(&ex, &AnswerInput::Judgement(true)).is_err());
    }
}
