use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{Choice, ChoiceTally, Question};

// -- JWT Claims --

/// Bearer token claims issued on register/login and checked by the auth
/// middleware.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: usize,
}

// -- Auth --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: Uuid,
    pub token: String,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub user_id: Uuid,
    pub username: String,
    pub token: String,
}

// -- Flash messages --

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageLevel {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub level: MessageLevel,
    pub message: String,
}

// -- Poll views --

#[derive(Debug, Serialize, Deserialize)]
pub struct IndexResponse {
    pub latest_question_list: Vec<Question>,
    pub messages: Vec<FlashMessage>,
}

/// Context for the voting form. `error_message` is set when a submission is
/// re-displayed after a validation failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct QuestionDetail {
    pub question: Question,
    pub choices: Vec<Choice>,
    pub selected_choice: Option<i64>,
    pub error_message: Option<String>,
    pub messages: Vec<FlashMessage>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ResultsResponse {
    pub question: Question,
    pub choices: Vec<ChoiceTally>,
    pub messages: Vec<FlashMessage>,
}

/// Form body of `POST /{question_id}/vote/`. Kept as a raw string so that a
/// missing or malformed value re-displays the form instead of rejecting the
/// request.
#[derive(Debug, Default, Deserialize)]
pub struct VoteForm {
    pub choice: Option<String>,
}

// -- Admin --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateQuestionRequest {
    pub question_text: String,
    pub pub_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub choices: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateChoiceRequest {
    pub choice_text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AdminQuestion {
    #[serde(flatten)]
    pub question: Question,
    pub published_recently: bool,
    pub choices: Vec<ChoiceTally>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}
