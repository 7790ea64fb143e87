//! Database row types: these map directly to SQLite rows.
//! Distinct from polls-types models to keep the DB layer independent;
//! conversions live at the bottom of this file.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use polls_types::models::{Choice, Question, User, Vote};

pub struct UserRow {
    pub id: String,
    pub username: String,
    pub password: String,
    pub is_staff: bool,
    pub created_at: String,
}

pub struct QuestionRow {
    pub id: i64,
    pub question_text: String,
    pub pub_date: String,
    pub end_date: Option<String>,
}

pub struct ChoiceRow {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

pub struct TallyRow {
    pub id: i64,
    pub choice_text: String,
    pub votes: i64,
}

pub struct VoteRow {
    pub id: i64,
    pub user_id: String,
    pub choice_id: Option<i64>,
}

/// Timestamps are stored as fixed-width RFC 3339 UTC strings so that string
/// comparison in SQL matches chronological order.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    let ts = DateTime::parse_from_rfc3339(raw)
        .with_context(|| format!("Corrupt timestamp '{}'", raw))?;
    Ok(ts.with_timezone(&Utc))
}

impl TryFrom<QuestionRow> for Question {
    type Error = anyhow::Error;

    fn try_from(row: QuestionRow) -> Result<Self> {
        Ok(Question {
            id: row.id,
            pub_date: parse_timestamp(&row.pub_date)?,
            end_date: row.end_date.as_deref().map(parse_timestamp).transpose()?,
            question_text: row.question_text,
        })
    }
}

impl From<ChoiceRow> for Choice {
    fn from(row: ChoiceRow) -> Self {
        Choice {
            id: row.id,
            question_id: row.question_id,
            choice_text: row.choice_text,
        }
    }
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row
                .id
                .parse()
                .with_context(|| format!("Corrupt user id '{}'", row.id))?,
            created_at: parse_timestamp(&row.created_at)?,
            username: row.username,
            is_staff: row.is_staff,
        })
    }
}

impl TryFrom<VoteRow> for Vote {
    type Error = anyhow::Error;

    fn try_from(row: VoteRow) -> Result<Self> {
        Ok(Vote {
            id: row.id,
            user_id: row
                .user_id
                .parse()
                .with_context(|| format!("Corrupt user id '{}' on vote {}", row.user_id, row.id))?,
            choice_id: row.choice_id,
        })
    }
}
