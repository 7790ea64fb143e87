//! Staff-only management of questions and choices.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use tracing::info;

use polls_types::api::{AdminQuestion, CreateChoiceRequest, CreateQuestionRequest};

use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, run_db};

const MAX_TEXT_LEN: usize = 200;

pub async fn list_questions(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let now = Utc::now();

    let questions = run_db(&state, move |db| {
        db.list_questions()?
            .into_iter()
            .map(|question| -> anyhow::Result<AdminQuestion> {
                let choices = db.tally(question.id)?;
                Ok(AdminQuestion {
                    published_recently: question.was_published_recently_at(now),
                    question,
                    choices,
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()
    })
    .await?;

    Ok(Json(questions))
}

pub async fn create_question(
    State(state): State<AppState>,
    Json(req): Json<CreateQuestionRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_text("question_text", &req.question_text)?;
    for choice in &req.choices {
        validate_text("choice_text", choice)?;
    }

    let pub_date = req.pub_date.unwrap_or_else(Utc::now);
    if let Some(end_date) = req.end_date {
        if end_date < pub_date {
            return Err(ApiError::BadRequest("end_date must not precede pub_date".into()));
        }
    }

    let (question, _) = run_db(&state, move |db| {
        db.create_question(&req.question_text, pub_date, req.end_date, &req.choices)
    })
    .await?;
    info!("Created question {} ({:?})", question.id, question.question_text);

    let question_id = question.id;
    let choices = run_db(&state, move |db| db.tally(question_id)).await?;

    Ok((
        StatusCode::CREATED,
        Json(AdminQuestion {
            published_recently: question.was_published_recently(),
            question,
            choices,
        }),
    ))
}

pub async fn add_choice(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Json(req): Json<CreateChoiceRequest>,
) -> ApiResult<impl IntoResponse> {
    validate_text("choice_text", &req.choice_text)?;

    let choice = run_db(&state, move |db| {
        if db.get_question(question_id)?.is_none() {
            return Ok(None);
        }
        db.add_choice(question_id, &req.choice_text).map(Some)
    })
    .await?
    .ok_or(ApiError::NotFound)?;

    Ok((StatusCode::CREATED, Json(choice)))
}

pub async fn delete_question(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
) -> ApiResult<StatusCode> {
    let deleted = run_db(&state, move |db| db.delete_question(question_id)).await?;
    if !deleted {
        return Err(ApiError::NotFound);
    }

    info!("Deleted question {}", question_id);
    Ok(StatusCode::NO_CONTENT)
}

fn validate_text(field: &str, value: &str) -> ApiResult<()> {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > MAX_TEXT_LEN {
        return Err(ApiError::BadRequest(format!(
            "{} must be 1 to {} characters",
            field, MAX_TEXT_LEN
        )));
    }
    Ok(())
}
