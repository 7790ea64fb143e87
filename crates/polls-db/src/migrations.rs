use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Ordered schema migrations. The index + 1 is the schema version; append
/// new steps, never edit applied ones.
const MIGRATIONS: &[(&str, &str)] = &[
    (
        "users",
        "
        CREATE TABLE users (
            id          TEXT PRIMARY KEY,
            username    TEXT NOT NULL UNIQUE,
            password    TEXT NOT NULL,
            is_staff    INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
        );
        ",
    ),
    (
        "questions and choices",
        "
        CREATE TABLE questions (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            question_text   TEXT NOT NULL CHECK (length(question_text) <= 200),
            pub_date        TEXT NOT NULL,
            end_date        TEXT
        );

        CREATE INDEX idx_questions_pub_date ON questions(pub_date);

        CREATE TABLE choices (
            id              INTEGER PRIMARY KEY AUTOINCREMENT,
            question_id     INTEGER NOT NULL REFERENCES questions(id) ON DELETE CASCADE,
            choice_text     TEXT NOT NULL CHECK (length(choice_text) <= 200)
        );

        CREATE INDEX idx_choices_question ON choices(question_id);
        ",
    ),
    (
        "votes",
        "
        CREATE TABLE votes (
            id          INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id     TEXT NOT NULL UNIQUE REFERENCES users(id) ON DELETE CASCADE,
            choice_id   INTEGER REFERENCES choices(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_votes_choice ON votes(choice_id);
        ",
    ),
];

pub fn run(conn: &mut Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version: usize = conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get::<_, i64>(0),
    )? as usize;

    for (idx, (name, sql)) in MIGRATIONS.iter().enumerate().skip(version) {
        let target = idx + 1;
        info!("Running migration v{} ({})", target, name);

        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.execute("INSERT INTO schema_version (version) VALUES (?1)", [target as i64])?;
        tx.commit()?;
    }

    info!("Database migrations complete (schema v{})", latest_version());
    Ok(())
}

pub fn latest_version() -> usize {
    MIGRATIONS.len()
}
