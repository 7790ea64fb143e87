use axum::{
    Extension, Form, Json,
    extract::{Path, State, rejection::FormRejection},
    response::{IntoResponse, Redirect, Response},
};
use axum_extra::extract::cookie::CookieJar;
use chrono::Utc;
use tracing::{debug, info};

use polls_types::api::{
    Claims, FlashMessage, IndexResponse, MessageLevel, QuestionDetail, ResultsResponse, VoteForm,
};
use polls_types::models::Question;

use crate::error::{ApiError, ApiResult};
use crate::flash;
use crate::middleware::Viewer;
use crate::state::{AppState, run_db};

pub const INDEX_LIMIT: u32 = 5;

const VOTING_CLOSED: &str = "Voting is not allowed for this question.";
const NO_CHOICE: &str = "You didn't select a choice.";
const VOTE_RECORDED: &str = "Your vote has been recorded.";

/// GET / — the latest published questions.
pub async fn index(State(state): State<AppState>, jar: CookieJar) -> ApiResult<impl IntoResponse> {
    let latest = run_db(&state, |db| db.latest_published(Utc::now(), INDEX_LIMIT)).await?;
    let (jar, messages) = flash::take(jar);

    Ok((
        jar,
        Json(IndexResponse {
            latest_question_list: latest,
            messages,
        }),
    ))
}

/// GET /{question_id}/ — the voting form, only while the question is open.
pub async fn detail(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    jar: CookieJar,
) -> ApiResult<Response> {
    let question = load_question(&state, question_id).await?;

    if !question.can_vote() {
        debug!("Question {} is outside its voting window", question_id);
        return Ok(closed_redirect(jar));
    }

    let (jar, messages) = flash::take(jar);
    let detail = detail_document(&state, question, viewer.as_ref(), None, messages).await?;
    Ok((jar, Json(detail)).into_response())
}

/// GET /{question_id}/results/ — choices with live vote counts.
pub async fn results(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    jar: CookieJar,
) -> ApiResult<impl IntoResponse> {
    let question = load_question(&state, question_id).await?;
    let choices = run_db(&state, move |db| db.tally(question_id)).await?;
    let (jar, messages) = flash::take(jar);

    Ok((
        jar,
        Json(ResultsResponse {
            question,
            choices,
            messages,
        }),
    ))
}

/// POST /{question_id}/vote/ — point the caller's ballot at the submitted
/// choice and redirect to the results.
pub async fn vote(
    State(state): State<AppState>,
    Path(question_id): Path<i64>,
    Extension(claims): Extension<Claims>,
    jar: CookieJar,
    form: Result<Form<VoteForm>, FormRejection>,
) -> ApiResult<Response> {
    // An unreadable form (no body, wrong content type, repeated key) counts as
    // no choice selected
    let form = match form {
        Ok(Form(form)) => form,
        Err(rejection) => {
            debug!("Unreadable vote form on question {}: {}", question_id, rejection);
            VoteForm::default()
        }
    };

    let question = load_question(&state, question_id).await?;

    if !question.can_vote() {
        debug!("Rejected vote by {} on closed question {}", claims.username, question_id);
        return Ok(closed_redirect(jar));
    }

    let selected = match form.choice.as_deref().map(str::trim).map(str::parse::<i64>) {
        Some(Ok(choice_id)) => {
            run_db(&state, move |db| db.get_choice_for_question(question_id, choice_id)).await?
        }
        _ => None,
    };

    let Some(choice) = selected else {
        // Redisplay the voting form
        let detail =
            detail_document(&state, question, Some(&claims), Some(NO_CHOICE.to_string()), Vec::new())
                .await?;
        return Ok((jar, Json(detail)).into_response());
    };

    let user_id = claims.sub;
    let choice_id = choice.id;
    let vote = run_db(&state, move |db| db.cast_vote(user_id, choice_id)).await?;
    info!(
        "User {} voted for choice {} on question {} (vote {})",
        claims.username, choice.id, question_id, vote.id
    );

    let jar = flash::push(jar, MessageLevel::Success, VOTE_RECORDED);
    Ok((jar, Redirect::to(&format!("/{}/results/", question_id))).into_response())
}

async fn load_question(state: &AppState, question_id: i64) -> ApiResult<Question> {
    run_db(state, move |db| db.get_question(question_id))
        .await?
        .ok_or(ApiError::NotFound)
}

fn closed_redirect(jar: CookieJar) -> Response {
    let jar = flash::push(jar, MessageLevel::Error, VOTING_CLOSED);
    (jar, Redirect::to("/")).into_response()
}

async fn detail_document(
    state: &AppState,
    question: Question,
    viewer: Option<&Claims>,
    error_message: Option<String>,
    messages: Vec<FlashMessage>,
) -> ApiResult<QuestionDetail> {
    let question_id = question.id;
    let user_id = viewer.map(|claims| claims.sub);

    let (choices, ballot) = run_db(state, move |db| {
        let choices = db.get_choices(question_id)?;
        let ballot = match user_id {
            Some(user_id) => db.get_vote_for_user(user_id)?,
            None => None,
        };
        Ok((choices, ballot))
    })
    .await?;

    // The ballot is global, so it only counts here if it points into this question
    let selected_choice = ballot
        .and_then(|vote| vote.choice_id)
        .filter(|id| choices.iter().any(|c| c.id == *id));

    Ok(QuestionDetail {
        question,
        choices,
        selected_choice,
        error_message,
        messages,
    })
}
