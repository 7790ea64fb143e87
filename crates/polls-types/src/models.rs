use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub is_staff: bool,
    pub created_at: DateTime<Utc>,
}

/// A poll topic. Voting is open inside the `[pub_date, end_date]` window;
/// a missing `end_date` leaves the window open-ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,
    pub question_text: String,
    pub pub_date: DateTime<Utc>,
    pub end_date: Option<DateTime<Utc>>,
}

impl Question {
    pub fn is_published_at(&self, now: DateTime<Utc>) -> bool {
        self.pub_date <= now
    }

    pub fn was_published_recently_at(&self, now: DateTime<Utc>) -> bool {
        now - Duration::days(1) <= self.pub_date && self.pub_date <= now
    }

    pub fn can_vote_at(&self, now: DateTime<Utc>) -> bool {
        match self.end_date {
            Some(end_date) => self.pub_date <= now && now <= end_date,
            None => self.pub_date <= now,
        }
    }

    pub fn is_published(&self) -> bool {
        self.is_published_at(Utc::now())
    }

    pub fn was_published_recently(&self) -> bool {
        self.was_published_recently_at(Utc::now())
    }

    pub fn can_vote(&self) -> bool {
        self.can_vote_at(Utc::now())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Choice {
    pub id: i64,
    pub question_id: i64,
    pub choice_text: String,
}

/// A choice together with its vote count, computed from the votes table at
/// read time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceTally {
    pub id: i64,
    pub choice_text: String,
    pub votes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vote {
    pub id: i64,
    pub user_id: Uuid,
    pub choice_id: Option<i64>,
}
