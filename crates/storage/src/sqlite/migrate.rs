use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

const SCHEMA_V1: &[&str] = &[
    r"
        CREATE TABLE IF NOT EXISTS learners (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL UNIQUE,
            email TEXT NOT NULL UNIQUE,
            full_name TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            profile_picture TEXT,
            created_at TEXT NOT NULL,
            cycle INTEGER NOT NULL DEFAULT 1 CHECK (cycle >= 1),
            modules_completed INTEGER NOT NULL DEFAULT 0 CHECK (modules_completed >= 0),
            total_score INTEGER NOT NULL DEFAULT 0 CHECK (total_score >= 0)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS modules (
            id INTEGER PRIMARY KEY CHECK (id >= 1),
            title TEXT NOT NULL,
            description TEXT,
            simulation TEXT
                CHECK (simulation IN ('phishing', 'pretexting', 'baiting', 'quid_pro_quo'))
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            module_id INTEGER NOT NULL,
            set_number INTEGER NOT NULL CHECK (set_number >= 1),
            position INTEGER NOT NULL CHECK (position >= 0),
            text TEXT NOT NULL,
            option_a TEXT NOT NULL,
            option_b TEXT NOT NULL,
            option_c TEXT NOT NULL,
            option_d TEXT NOT NULL,
            correct TEXT NOT NULL CHECK (correct IN ('a', 'b', 'c', 'd')),
            explanation TEXT NOT NULL,
            UNIQUE (module_id, set_number, position),
            FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS assessment_attempts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learner_id INTEGER NOT NULL,
            assessment_type TEXT NOT NULL
                CHECK (assessment_type IN ('knowledge_check', 'final_assessment')),
            module_id INTEGER,
            total_questions INTEGER NOT NULL CHECK (total_questions >= 1),
            correct_count INTEGER NOT NULL CHECK (correct_count BETWEEN 0 AND total_questions),
            percentage INTEGER NOT NULL CHECK (percentage BETWEEN 0 AND 100),
            passed INTEGER NOT NULL CHECK (passed IN (0, 1)),
            time_taken_secs INTEGER NOT NULL CHECK (time_taken_secs >= 0),
            cycle INTEGER NOT NULL CHECK (cycle >= 1),
            submitted_at TEXT NOT NULL,
            CHECK ((assessment_type = 'knowledge_check') = (module_id IS NOT NULL)),
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
            FOREIGN KEY (module_id) REFERENCES modules(id)
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS module_progress (
            learner_id INTEGER NOT NULL,
            module_id INTEGER NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('not_started', 'in_progress', 'completed')),
            best_score INTEGER NOT NULL CHECK (best_score BETWEEN 0 AND 100),
            attempts INTEGER NOT NULL CHECK (attempts >= 0),
            time_spent_secs INTEGER NOT NULL CHECK (time_spent_secs >= 0),
            started_at TEXT,
            completed_at TEXT,
            PRIMARY KEY (learner_id, module_id),
            CHECK (status <> 'completed' OR completed_at IS NOT NULL),
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE,
            FOREIGN KEY (module_id) REFERENCES modules(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS feedback_surveys (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learner_id INTEGER NOT NULL UNIQUE,
            program_rating INTEGER NOT NULL CHECK (program_rating BETWEEN 1 AND 5),
            content_quality INTEGER NOT NULL CHECK (content_quality BETWEEN 1 AND 5),
            difficulty_level TEXT NOT NULL CHECK (difficulty_level IN ('easy', 'moderate', 'hard')),
            recommendation_likelihood INTEGER NOT NULL
                CHECK (recommendation_likelihood BETWEEN 1 AND 5),
            comments TEXT,
            submitted_at TEXT NOT NULL,
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE TABLE IF NOT EXISTS simulation_results (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            learner_id INTEGER NOT NULL,
            simulation_type TEXT NOT NULL,
            module_id INTEGER NOT NULL,
            correct_decisions INTEGER NOT NULL CHECK (correct_decisions >= 0),
            total_decisions INTEGER NOT NULL CHECK (total_decisions >= 1),
            time_taken_secs INTEGER NOT NULL CHECK (time_taken_secs >= 0),
            completed_at TEXT NOT NULL,
            FOREIGN KEY (learner_id) REFERENCES learners(id) ON DELETE CASCADE
        );
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_questions_module_set
            ON questions (module_id, set_number, position);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_attempts_learner_type_cycle
            ON assessment_attempts (learner_id, assessment_type, module_id, cycle);
    ",
    r"
        CREATE INDEX IF NOT EXISTS idx_simulations_learner_completed
            ON simulation_results (learner_id, completed_at);
    ",
];

/// Runs versioned migrations recorded in `schema_migrations`.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    // Version 1: learners, course content, attempts, progress, surveys, simulations.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        for statement in SCHEMA_V1 {
            sqlx::query(statement).execute(&mut *tx).await?;
        }

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
