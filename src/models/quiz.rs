// src/models/quiz.rs

use serde::{Deserialize, Serialize};
use sqlx::{prelude::FromRow, types::Json};
use validator::Validate;

pub const QUESTION_TYPES: [&str; 3] = ["multiple_choice", "checkbox", "true_false"];

/// Represents the 'quizzes' table in the database.
///
/// A quiz attaches to exactly one of {course, module, lesson}; the other two
/// scope references stay NULL. Enforced at write time and by a schema CHECK.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Quiz {
    pub id: i64,

    pub title: String,

    pub course_id: Option<i64>,
    pub module_id: Option<i64>,
    pub lesson_id: Option<i64>,

    /// Time limit in minutes; 0 means unlimited.
    pub time_limit: i32,

    /// Passing threshold as a 0-100 percentage.
    pub passing_score: i32,

    pub attempts_allowed: i32,

    pub randomize_questions: bool,

    pub show_correct_answers: bool,

    /// Only published quizzes count toward progress and attempt limits.
    /// Flipped in bulk when the owning course is approved or rejected.
    pub is_published: bool,

    pub created_at: Option<chrono::DateTime<chrono::Utc>>,
}

/// Represents the 'questions' table in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub quiz_id: i64,

    /// The text content of the question.
    pub content: String,

    /// 'multiple_choice', 'checkbox' or 'true_false'.
    pub question_type: String,

    /// Ordered option strings, stored as a JSON array.
    pub options: Json<Vec<String>>,

    /// The correct answer as stored. Checkbox answers are stored as one
    /// string and awarded on exact match only.
    pub correct_answer: String,

    pub points: i32,

    /// Display order within the quiz.
    pub position: i32,
}

/// DTO for sending a question to learners (excludes the correct answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub question_type: String,
    pub content: String,
    pub options: Json<Vec<String>>,
    pub points: i32,
    pub position: i32,
}

impl From<Question> for PublicQuestion {
    fn from(q: Question) -> Self {
        PublicQuestion {
            id: q.id,
            question_type: q.question_type,
            content: q.content,
            options: q.options,
            points: q.points,
            position: q.position,
        }
    }
}

/// Quiz metadata plus its questions with answers hidden.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub id: i64,
    pub title: String,
    pub time_limit: i32,
    pub passing_score: i32,
    pub attempts_allowed: i32,
    pub questions: Vec<PublicQuestion>,
}

/// DTO for creating a question within a quiz.
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct CreateQuestionRequest {
    #[validate(length(min = 1, max = 2000))]
    pub content: String,
    #[validate(custom(function = validate_question_type))]
    pub question_type: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 2000))]
    pub correct_answer: String,
    #[validate(range(min = 0))]
    pub points: i32,
    #[validate(range(min = 0))]
    pub position: i32,
}

/// DTO for creating a quiz with its questions.
#[derive(Debug, Deserialize, Validate)]
#[validate(schema(function = validate_scope_refs))]
pub struct CreateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    pub course_id: Option<i64>,
    pub module_id: Option<i64>,
    pub lesson_id: Option<i64>,

    #[validate(range(min = 0))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: i32,
    #[validate(range(min = 1))]
    pub attempts_allowed: i32,
    pub randomize_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,

    #[validate(length(min = 1, message = "Quiz must have at least one question"), nested)]
    pub questions: Vec<CreateQuestionRequest>,
}

/// DTO for updating quiz configuration. Fields are optional.
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateQuizRequest {
    #[validate(length(min = 1, max = 200))]
    pub title: Option<String>,
    #[validate(range(min = 0))]
    pub time_limit: Option<i32>,
    #[validate(range(min = 0, max = 100))]
    pub passing_score: Option<i32>,
    #[validate(range(min = 1))]
    pub attempts_allowed: Option<i32>,
    pub randomize_questions: Option<bool>,
    pub show_correct_answers: Option<bool>,
}

fn validate_question_type(question_type: &str) -> Result<(), validator::ValidationError> {
    if !QUESTION_TYPES.contains(&question_type) {
        return Err(validator::ValidationError::new("unknown_question_type"));
    }
    Ok(())
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// A quiz must reference exactly one scope: a zero-scope quiz would be
/// unreachable by the resolver, and a multi-scope quiz would be counted twice.
fn validate_scope_refs(req: &CreateQuizRequest) -> Result<(), validator::ValidationError> {
    let refs = [req.course_id, req.module_id, req.lesson_id]
        .iter()
        .filter(|r| r.is_some())
        .count();
    if refs != 1 {
        return Err(validator::ValidationError::new("exactly_one_scope_required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> CreateQuestionRequest {
        CreateQuestionRequest {
            content: "2 + 2 = ?".to_string(),
            question_type: "multiple_choice".to_string(),
            options: vec!["3".to_string(), "4".to_string()],
            correct_answer: "4".to_string(),
            points: 1,
            position: 0,
        }
    }

    fn quiz_request() -> CreateQuizRequest {
        CreateQuizRequest {
            title: "Checkpoint".to_string(),
            course_id: None,
            module_id: Some(1),
            lesson_id: None,
            time_limit: None,
            passing_score: 70,
            attempts_allowed: 3,
            randomize_questions: None,
            show_correct_answers: None,
            questions: vec![question()],
        }
    }

    #[test]
    fn single_scope_ref_is_valid() {
        assert!(quiz_request().validate().is_ok());
    }

    #[test]
    fn zero_scope_refs_is_rejected() {
        let req = CreateQuizRequest {
            module_id: None,
            ..quiz_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn two_scope_refs_are_rejected() {
        let req = CreateQuizRequest {
            course_id: Some(7),
            ..quiz_request()
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn unknown_question_type_is_rejected() {
        let mut req = quiz_request();
        req.questions[0].question_type = "essay".to_string();
        assert!(req.validate().is_err());
    }
}
