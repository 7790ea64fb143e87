use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, Row};
use uuid::Uuid;

use polls_types::models::{Choice, ChoiceTally, Question, User, Vote};

use crate::Database;
use crate::models::{ChoiceRow, QuestionRow, TallyRow, UserRow, VoteRow, format_timestamp};

impl Database {
    // -- Users --

    /// Returns false when the username is already taken.
    pub fn create_user(&self, id: &str, username: &str, password_hash: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, username, password) VALUES (?1, ?2, ?3)",
                (id, username, password_hash),
            );

            match inserted {
                Ok(_) => Ok(true),
                Err(rusqlite::Error::SqliteFailure(e, _))
                    if e.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    Ok(false)
                }
                Err(e) => Err(e.into()),
            }
        })
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, "id", id))?
            .map(User::try_from)
            .transpose()
    }

    /// Returns false when no user has that username.
    pub fn set_staff(&self, username: &str, is_staff: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let updated = conn.execute(
                "UPDATE users SET is_staff = ?1 WHERE username = ?2",
                rusqlite::params![is_staff, username],
            )?;
            Ok(updated > 0)
        })
    }

    // -- Questions --

    /// Insert a question and its initial choices in one transaction.
    pub fn create_question(
        &self,
        question_text: &str,
        pub_date: DateTime<Utc>,
        end_date: Option<DateTime<Utc>>,
        choices: &[String],
    ) -> Result<(Question, Vec<Choice>)> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO questions (question_text, pub_date, end_date) VALUES (?1, ?2, ?3)",
                rusqlite::params![
                    question_text,
                    format_timestamp(pub_date),
                    end_date.map(format_timestamp),
                ],
            )?;
            let question_id = tx.last_insert_rowid();

            let mut created = Vec::with_capacity(choices.len());
            for text in choices {
                created.push(insert_choice(&tx, question_id, text)?);
            }

            let question = query_question(&tx, question_id)?
                .ok_or_else(|| anyhow::anyhow!("Question {} vanished after insert", question_id))?;
            tx.commit()?;

            Ok((question, created))
        })
    }

    pub fn get_question(&self, id: i64) -> Result<Option<Question>> {
        self.with_conn(|conn| query_question(conn, id))
    }

    /// Most recently published questions, newest first, excluding any whose
    /// `pub_date` is after `now`.
    pub fn latest_published(&self, now: DateTime<Utc>, limit: u32) -> Result<Vec<Question>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question_text, pub_date, end_date
                 FROM questions
                 WHERE pub_date <= ?1
                 ORDER BY pub_date DESC, id DESC
                 LIMIT ?2",
            )?;

            let rows = stmt
                .query_map(rusqlite::params![format_timestamp(now), limit], question_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Question::try_from).collect()
        })
    }

    /// Every question, future-dated ones included, newest first.
    pub fn list_questions(&self) -> Result<Vec<Question>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question_text, pub_date, end_date
                 FROM questions
                 ORDER BY pub_date DESC, id DESC",
            )?;

            let rows = stmt
                .query_map([], question_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            rows.into_iter().map(Question::try_from).collect()
        })
    }

    /// Deletes the question; its choices and any votes on them cascade.
    pub fn delete_question(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| {
            let deleted = conn.execute("DELETE FROM questions WHERE id = ?1", [id])?;
            Ok(deleted > 0)
        })
    }

    // -- Choices --

    pub fn add_choice(&self, question_id: i64, choice_text: &str) -> Result<Choice> {
        self.with_conn(|conn| insert_choice(conn, question_id, choice_text))
    }

    pub fn get_choices(&self, question_id: i64) -> Result<Vec<Choice>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, question_id, choice_text FROM choices WHERE question_id = ?1 ORDER BY id",
            )?;

            let rows = stmt
                .query_map([question_id], choice_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows.into_iter().map(Choice::from).collect())
        })
    }

    /// Looks a choice up only within the given question's choice set.
    pub fn get_choice_for_question(&self, question_id: i64, choice_id: i64) -> Result<Option<Choice>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, question_id, choice_text FROM choices WHERE id = ?1 AND question_id = ?2",
                    [choice_id, question_id],
                    choice_row,
                )
                .optional()?;

            Ok(row.map(Choice::from))
        })
    }

    /// Choices of a question with their vote counts, counted from the votes
    /// table on every call.
    pub fn tally(&self, question_id: i64) -> Result<Vec<ChoiceTally>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.id, c.choice_text, COUNT(v.id)
                 FROM choices c
                 LEFT JOIN votes v ON v.choice_id = c.id
                 WHERE c.question_id = ?1
                 GROUP BY c.id
                 ORDER BY c.id",
            )?;

            let rows = stmt
                .query_map([question_id], |row| {
                    Ok(TallyRow {
                        id: row.get(0)?,
                        choice_text: row.get(1)?,
                        votes: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows
                .into_iter()
                .map(|row| ChoiceTally {
                    id: row.id,
                    choice_text: row.choice_text,
                    votes: row.votes.max(0) as u64,
                })
                .collect())
        })
    }

    // -- Votes --

    /// Point the user's single ballot at `choice_id`, creating the row on the
    /// first vote. One statement, so concurrent submissions by the same user
    /// cannot produce a second row.
    pub fn cast_vote(&self, user_id: Uuid, choice_id: i64) -> Result<Vote> {
        self.with_conn(|conn| {
            let row = conn.query_row(
                "INSERT INTO votes (user_id, choice_id) VALUES (?1, ?2)
                 ON CONFLICT(user_id) DO UPDATE SET choice_id = excluded.choice_id
                 RETURNING id, user_id, choice_id",
                rusqlite::params![user_id.to_string(), choice_id],
                vote_row,
            )?;

            Vote::try_from(row)
        })
    }

    pub fn get_vote_for_user(&self, user_id: Uuid) -> Result<Option<Vote>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, user_id, choice_id FROM votes WHERE user_id = ?1",
                [user_id.to_string()],
                vote_row,
            )
            .optional()
        })?
        .map(Vote::try_from)
        .transpose()
    }

    pub fn count_votes_for_user(&self, user_id: Uuid) -> Result<u64> {
        self.with_conn(|conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM votes WHERE user_id = ?1",
                [user_id.to_string()],
                |row| row.get(0),
            )?;
            Ok(count as u64)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!(
        "SELECT id, username, password, is_staff, created_at FROM users WHERE {} = ?1",
        column
    );
    let mut stmt = conn.prepare(&sql)?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                password: row.get(2)?,
                is_staff: row.get(3)?,
                created_at: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn query_question(conn: &Connection, id: i64) -> Result<Option<Question>> {
    let row = conn
        .query_row(
            "SELECT id, question_text, pub_date, end_date FROM questions WHERE id = ?1",
            [id],
            question_row,
        )
        .optional()?;

    row.map(Question::try_from).transpose()
}

fn insert_choice(conn: &Connection, question_id: i64, choice_text: &str) -> Result<Choice> {
    conn.execute(
        "INSERT INTO choices (question_id, choice_text) VALUES (?1, ?2)",
        rusqlite::params![question_id, choice_text],
    )?;

    Ok(Choice {
        id: conn.last_insert_rowid(),
        question_id,
        choice_text: choice_text.to_string(),
    })
}

fn question_row(row: &Row<'_>) -> rusqlite::Result<QuestionRow> {
    Ok(QuestionRow {
        id: row.get(0)?,
        question_text: row.get(1)?,
        pub_date: row.get(2)?,
        end_date: row.get(3)?,
    })
}

fn choice_row(row: &Row<'_>) -> rusqlite::Result<ChoiceRow> {
    Ok(ChoiceRow {
        id: row.get(0)?,
        question_id: row.get(1)?,
        choice_text: row.get(2)?,
    })
}

fn vote_row(row: &Row<'_>) -> rusqlite::Result<VoteRow> {
    Ok(VoteRow {
        id: row.get(0)?,
        user_id: row.get(1)?,
        choice_id: row.get(2)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn db_with_user(username: &str) -> (Database, Uuid) {
        let db = Database::open_in_memory().unwrap();
        let user_id = add_user(&db, username);
        (db, user_id)
    }

    fn add_user(db: &Database, username: &str) -> Uuid {
        let id = Uuid::new_v4();
        assert!(db.create_user(&id.to_string(), username, "not-a-real-hash").unwrap());
        id
    }

    fn poll(db: &Database, text: &str, pub_offset: Duration) -> (Question, Vec<Choice>) {
        let choices = vec!["Not much".to_string(), "The sky".to_string()];
        db.create_question(text, Utc::now() + pub_offset, None, &choices)
            .unwrap()
    }

    fn votes_for(db: &Database, question_id: i64, choice_id: i64) -> u64 {
        db.tally(question_id)
            .unwrap()
            .into_iter()
            .find(|t| t.id == choice_id)
            .map(|t| t.votes)
            .unwrap()
    }

    #[test]
    fn create_and_fetch_question() {
        let db = Database::open_in_memory().unwrap();
        let end = Utc::now() + Duration::days(3);
        let (q, choices) = db
            .create_question("Favourite colour?", Utc::now(), Some(end), &["Red".into()])
            .unwrap();

        let fetched = db.get_question(q.id).unwrap().unwrap();
        assert_eq!(fetched, q);
        assert_eq!(fetched.end_date.map(|d| d.timestamp()), Some(end.timestamp()));
        assert_eq!(db.get_choices(q.id).unwrap(), choices);
        assert!(db.get_question(q.id + 100).unwrap().is_none());
    }

    #[test]
    fn latest_published_skips_future_and_limits() {
        let db = Database::open_in_memory().unwrap();
        for days in 1..=6 {
            poll(&db, &format!("Past {}", days), -Duration::days(days));
        }
        poll(&db, "Future", Duration::days(30));

        let latest = db.latest_published(Utc::now(), 5).unwrap();
        let texts: Vec<_> = latest.iter().map(|q| q.question_text.as_str()).collect();
        assert_eq!(texts, vec!["Past 1", "Past 2", "Past 3", "Past 4", "Past 5"]);

        assert_eq!(db.list_questions().unwrap().len(), 7);
    }

    #[test]
    fn choice_lookup_is_scoped_to_question() {
        let db = Database::open_in_memory().unwrap();
        let (q1, c1) = poll(&db, "First", -Duration::days(1));
        let (q2, c2) = poll(&db, "Second", -Duration::days(1));

        assert!(db.get_choice_for_question(q1.id, c1[0].id).unwrap().is_some());
        assert!(db.get_choice_for_question(q1.id, c2[0].id).unwrap().is_none());
        assert!(db.get_choice_for_question(q2.id, c1[1].id).unwrap().is_none());
    }

    #[test]
    fn revote_replaces_the_single_ballot() {
        let (db, user) = db_with_user("alice");
        let (q1, c1) = poll(&db, "First", -Duration::days(1));
        let (q2, c2) = poll(&db, "Second", -Duration::days(1));

        let first = db.cast_vote(user, c1[0].id).unwrap();
        assert_eq!(votes_for(&db, q1.id, c1[0].id), 1);

        let second = db.cast_vote(user, c1[1].id).unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(votes_for(&db, q1.id, c1[0].id), 0);
        assert_eq!(votes_for(&db, q1.id, c1[1].id), 1);

        // The ballot is per user, so voting elsewhere moves it off q1.
        let third = db.cast_vote(user, c2[0].id).unwrap();
        assert_eq!(third.id, first.id);
        assert_eq!(votes_for(&db, q1.id, c1[1].id), 0);
        assert_eq!(votes_for(&db, q2.id, c2[0].id), 1);

        assert_eq!(db.count_votes_for_user(user).unwrap(), 1);
        assert_eq!(db.get_vote_for_user(user).unwrap().unwrap().choice_id, Some(c2[0].id));
    }

    #[test]
    fn tally_counts_every_users_vote() {
        let db = Database::open_in_memory().unwrap();
        let (q, c) = poll(&db, "Pick one", -Duration::days(1));

        for name in ["a", "b", "c"] {
            let user = add_user(&db, name);
            db.cast_vote(user, c[1].id).unwrap();
        }
        let user = add_user(&db, "d");
        db.cast_vote(user, c[0].id).unwrap();

        let tally = db.tally(q.id).unwrap();
        assert_eq!(tally.len(), 2);
        assert_eq!(tally[0].votes, 1);
        assert_eq!(tally[1].votes, 3);

        let total: i64 = db
            .with_conn(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM votes WHERE choice_id = ?1", [c[1].id], |r| {
                    r.get(0)
                })?)
            })
            .unwrap();
        assert_eq!(total as u64, tally[1].votes);
    }

    #[test]
    fn deleting_question_cascades_to_votes() {
        let (db, user) = db_with_user("alice");
        let (q, c) = poll(&db, "Doomed", -Duration::days(1));
        db.cast_vote(user, c[0].id).unwrap();

        assert!(db.delete_question(q.id).unwrap());
        assert!(!db.delete_question(q.id).unwrap());
        assert!(db.get_choices(q.id).unwrap().is_empty());
        assert!(db.get_vote_for_user(user).unwrap().is_none());
    }

    #[test]
    fn add_choice_and_set_staff() {
        let (db, user) = db_with_user("admin");
        let (q, _) = poll(&db, "Grow", -Duration::days(1));

        let added = db.add_choice(q.id, "Another").unwrap();
        assert_eq!(db.get_choices(q.id).unwrap().last(), Some(&added));

        assert!(!db.get_user_by_id(&user.to_string()).unwrap().unwrap().is_staff);
        assert!(db.set_staff("admin", true).unwrap());
        assert!(db.get_user_by_id(&user.to_string()).unwrap().unwrap().is_staff);
        assert!(!db.set_staff("nobody", true).unwrap());
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let (db, _) = db_with_user("alice");
        let created = db.create_user(&Uuid::new_v4().to_string(), "alice", "hash").unwrap();
        assert!(!created);
        assert!(db.get_user_by_username("alice").unwrap().is_some());
        assert!(db.get_user_by_username("bob").unwrap().is_none());
    }
}
