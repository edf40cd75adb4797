use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::model::ids::{ExerciseId, WordId};

//
// ─── EXERCISE TYPE ─────────────────────────────────────────────────────────────
//

/// Closed set of exercise kinds. Every kind has exactly one evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExerciseType {
    WordMatching,
    FillInBlanks,
    Listening,
    Quiz,
    MultipleChoice,
    Speaking,
    SpeechRecognition,
}

/// How an answer for an exercise type is collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnswerMode {
    /// Pick one of the offered options.
    Choice,
    /// Free text compared case-insensitively.
    Text,
    /// Spoken answer: transcript text or an external judgement.
    Spoken,
}

/// Language skill an exercise type trains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkillCategory {
    Listening,
    Speaking,
    Reading,
    Writing,
}

impl SkillCategory {
    pub const ALL: [SkillCategory; 4] = [
        SkillCategory::Listening,
        SkillCategory::Speaking,
        SkillCategory::Reading,
        SkillCategory::Writing,
    ];
}

impl ExerciseType {
    pub const ALL: [ExerciseType; 7] = [
        ExerciseType::WordMatching,
        ExerciseType::FillInBlanks,
        ExerciseType::Listening,
        ExerciseType::Quiz,
        ExerciseType::MultipleChoice,
        ExerciseType::Speaking,
        ExerciseType::SpeechRecognition,
    ];

    /// Stable tag used in `ReviewResult::mistakes` and storage.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ExerciseType::WordMatching => "word_matching",
            ExerciseType::FillInBlanks => "fill_in_blanks",
            ExerciseType::Listening => "listening",
            ExerciseType::Quiz => "quiz",
            ExerciseType::MultipleChoice => "multiple_choice",
            ExerciseType::Speaking => "speaking",
            ExerciseType::SpeechRecognition => "speech_recognition",
        }
    }

    #[must_use]
    pub fn answer_mode(self) -> AnswerMode {
        match self {
            ExerciseType::WordMatching | ExerciseType::Quiz | ExerciseType::MultipleChoice => {
                AnswerMode::Choice
            }
            ExerciseType::FillInBlanks | ExerciseType::Listening => AnswerMode::Text,
            ExerciseType::Speaking | ExerciseType::SpeechRecognition => AnswerMode::Spoken,
        }
    }

    #[must_use]
    pub fn skill(self) -> SkillCategory {
        match self {
            ExerciseType::WordMatching | ExerciseType::Quiz | ExerciseType::MultipleChoice => {
                SkillCategory::Reading
            }
            ExerciseType::FillInBlanks => SkillCategory::Writing,
            ExerciseType::Listening => SkillCategory::Listening,
            ExerciseType::Speaking | ExerciseType::SpeechRecognition => SkillCategory::Speaking,
        }
    }
}

impl fmt::Display for ExerciseType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown exercise type: {0}")]
pub struct UnknownExerciseType(pub String);

impl FromStr for ExerciseType {
    type Err = UnknownExerciseType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ExerciseType::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownExerciseType(s.to_owned()))
    }
}

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ExerciseError {
    #[error("exercise prompt cannot be empty")]
    EmptyPrompt,
    #[error("exercise correct answer cannot be empty")]
    EmptyAnswer,
    #[error("{0} exercises need at least two options")]
    MissingOptions(ExerciseType),
    #[error("correct answer is not among the offered options")]
    AnswerNotInOptions,
}

//
// ─── EXERCISE ──────────────────────────────────────────────────────────────────
//

/// Unvalidated exercise content as delivered by a content source.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExerciseDraft {
    pub id: ExerciseId,
    pub word_id: WordId,
    pub kind: ExerciseType,
    pub prompt: String,
    pub correct_answer: String,
    pub options: Option<Vec<String>>,
    pub hint: Option<String>,
    pub explanation: Option<String>,
}

impl ExerciseDraft {
    #[must_use]
    pub fn new(
        id: ExerciseId,
        word_id: WordId,
        kind: ExerciseType,
        prompt: impl Into<String>,
        correct_answer: impl Into<String>,
    ) -> Self {
        Self {
            id,
            word_id,
            kind,
            prompt: prompt.into(),
            correct_answer: correct_answer.into(),
            options: None,
            hint: None,
            explanation: None,
        }
    }

    #[must_use]
    pub fn with_options<I, S>(mut self, options: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options = Some(options.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    #[must_use]
    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = Some(explanation.into());
        self
    }

    /// Check content invariants and produce an immutable `Exercise`.
    ///
    /// Choice-based kinds must offer at least two options, one of which is the
    /// correct answer.
    ///
    /// # Errors
    ///
    /// Returns `ExerciseError` describing the first violated invariant.
    pub fn validate(self) -> Result<Exercise, ExerciseError> {
        let prompt = self.prompt.trim().to_owned();
        if prompt.is_empty() {
            return Err(ExerciseError::EmptyPrompt);
        }
        let correct_answer = self.correct_answer.trim().to_owned();
        if correct_answer.is_empty() {
            return Err(ExerciseError::EmptyAnswer);
        }

        let options = self.options.map(|opts| {
            opts.into_iter()
                .map(|o| o.trim().to_owned())
                .filter(|o| !o.is_empty())
                .collect::<Vec<_>>()
        });

        if self.kind.answer_mode() == AnswerMode::Choice {
            let Some(opts) = options.as_ref().filter(|o| o.len() >= 2) else {
                return Err(ExerciseError::MissingOptions(self.kind));
            };
            if !opts.iter().any(|o| o == &correct_answer) {
                return Err(ExerciseError::AnswerNotInOptions);
            }
        }

        Ok(Exercise {
            id: self.id,
            word_id: self.word_id,
            kind: self.kind,
            prompt,
            correct_answer,
            options,
            hint: normalize_optional(self.hint),
            explanation: normalize_optional(self.explanation),
        })
    }
}

/// Immutable exercise presented by the session engine.
///
/// Deserializing goes through `ExerciseDraft::validate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ExerciseDraft")]
pub struct Exercise {
    id: ExerciseId,
    word_id: WordId,
    kind: ExerciseType,
    prompt: String,
    correct_answer: String,
    options: Option<Vec<String>>,
    hint: Option<String>,
    explanation: Option<String>,
}

impl TryFrom<ExerciseDraft> for Exercise {
    type Error = ExerciseError;

    fn try_from(draft: ExerciseDraft) -> Result<Self, Self::Error> {
        draft.validate()
    }
}

impl Exercise {
    #[must_use]
    pub fn id(&self) -> ExerciseId {
        self.id
    }

    /// Word this exercise drills; results roll up per word.
    #[must_use]
    pub fn word_id(&self) -> &WordId {
        &self.word_id
    }

    #[must_use]
    pub fn kind(&self) -> ExerciseType {
        self.kind
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn correct_answer(&self) -> &str {
        &self.correct_answer
    }

    #[must_use]
    pub fn options(&self) -> Option<&[String]> {
        self.options.as_deref()
    }

    #[must_use]
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }
}

// Content templates.
impl Exercise {
    /// "What does `word` mean?" with translation options.
    ///
    /// # Errors
    ///
    /// See `ExerciseDraft::validate`.
    pub fn word_matching(
        id: ExerciseId,
        word_id: WordId,
        word: &str,
        translation: &str,
        options: &[&str],
    ) -> Result<Self, ExerciseError> {
        ExerciseDraft::new(
            id,
            word_id,
            ExerciseType::WordMatching,
            format!("What does '{word}' mean?"),
            translation,
        )
        .with_options(options.iter().copied())
        .validate()
    }

    /// # Errors
    ///
    /// See `ExerciseDraft::validate`.
    pub fn fill_in_blanks(
        id: ExerciseId,
        word_id: WordId,
        sentence: &str,
        answer: &str,
        hint: Option<&str>,
    ) -> Result<Self, ExerciseError> {
        let mut draft =
            ExerciseDraft::new(id, word_id, ExerciseType::FillInBlanks, sentence, answer);
        if let Some(hint) = hint {
            draft = draft.with_hint(hint);
        }
        draft.validate()
    }

    /// # Errors
    ///
    /// See `ExerciseDraft::validate`.
    pub fn listening(
        id: ExerciseId,
        word_id: WordId,
        transcript: &str,
    ) -> Result<Self, ExerciseError> {
        ExerciseDraft::new(
            id,
            word_id,
            ExerciseType::Listening,
            "Type what you hear:",
            transcript,
        )
        .validate()
    }

    /// # Errors
    ///
    /// See `ExerciseDraft::validate`.
    pub fn quiz(
        id: ExerciseId,
        word_id: WordId,
        question: &str,
        correct_answer: &str,
        options: &[&str],
        explanation: Option<&str>,
    ) -> Result<Self, ExerciseError> {
        let mut draft = ExerciseDraft::new(id, word_id, ExerciseType::Quiz, question, correct_answer)
            .with_options(options.iter().copied());
        if let Some(explanation) = explanation {
            draft = draft.with_explanation(explanation);
        }
        draft.validate()
    }

    /// # Errors
    ///
    /// See `ExerciseDraft::validate`.
    pub fn speaking(id: ExerciseId, word_id: WordId, phrase: &str) -> Result<Self, ExerciseError> {
        ExerciseDraft::new(
            id,
            word_id,
            ExerciseType::Speaking,
            "Say the following phrase:",
            phrase,
        )
        .validate()
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_owned())
        .filter(|val| !val.is_empty())
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn word() -> WordId {
        WordId::new("hello").unwrap()
    }

    #[test]
    fn type_tags_round_trip() {
        for kind in ExerciseType::ALL {
            assert_eq!(kind.as_str().parse::<ExerciseType>().unwrap(), kind);
        }
        assert!("dictation".parse::<ExerciseType>().is_err());
    }

    #[test]
    fn serde_tag_matches_mistake_tag() {
        let json = serde_json::to_string(&ExerciseType::FillInBlanks).unwrap();
        assert_eq!(json, "\"fill_in_blanks\"");
    }

    #[test]
    fn choice_exercise_requires_answer_among_options() {
        let err = Exercise::word_matching(
            ExerciseId::new(1),
            word(),
            "Hello",
            "Merhaba",
            &["Güle güle", "Nasılsın"],
        )
        .unwrap_err();
        assert_eq!(err, ExerciseError::AnswerNotInOptions);
    }

    #[test]
    fn choice_exercise_requires_options() {
        let err = ExerciseDraft::new(ExerciseId::new(1), word(), ExerciseType::Quiz, "Q?", "A")
            .validate()
            .unwrap_err();
        assert_eq!(err, ExerciseError::MissingOptions(ExerciseType::Quiz));
    }

    #[test]
    fn text_exercise_trims_and_drops_blank_hint() {
        let ex = Exercise::fill_in_blanks(
            ExerciseId::new(2),
            word(),
            " How are you? = Nasıl___? ",
            " sın ",
            Some("   "),
        )
        .unwrap();
        assert_eq!(ex.prompt(), "How are you? = Nasıl___?");
        assert_eq!(ex.correct_answer(), "sın");
        assert_eq!(ex.hint(), None);
        assert_eq!(ex.kind().skill(), SkillCategory::Writing);
    }

    #[test]
    fn empty_answer_is_rejected() {
        let err = Exercise::speaking(ExerciseId::new(3), word(), "  ").unwrap_err();
        assert_eq!(err, ExerciseError::EmptyAnswer);
    }

    #[test]
    fn stored_choice_exercise_without_options_is_rejected() {
        let raw = r#"{
            "id": 7,
            "word_id": "merhaba",
            "kind": "multiple_choice",
            "prompt": "Pick the greeting",
            "correct_answer": "Hello",
            "options": null
        }"#;
        let err = serde_json::from_str::<Exercise>(raw).unwrap_err();
        assert!(err.to_string().contains("at least two options"));

        let raw = raw.replace(r#""options": null"#, r#""options": ["Bye", "Thanks"]"#);
        let err = serde_json::from_str::<Exercise>(&raw).unwrap_err();
        assert!(err.to_string().contains("not among the offered options"));
    }

    #[test]
    fn stored_exercise_round_trips_through_validation() {
        let ex = Exercise::quiz(
            ExerciseId::new(3),
            word(),
            "Which one means hello?",
            "merhaba",
            &["merhaba", "hoşça kal"],
            None,
        )
        .unwrap();
        let json = serde_json::to_string(&ex).unwrap();
        assert_eq!(serde_json::from_str::<Exercise>(&json).unwrap(), ex);
    }
}
