//! SQL schema for the Pathway SQLite store.
//!
//! Executed once at connection startup. Curriculum tables mirror the
//! content service's shapes and are populated through the import
//! surface on [`crate::SqliteStore`]; the engine itself only reads them.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- ── Auth ─────────────────────────────────────────────────────────────

CREATE TABLE IF NOT EXISTS sessions (
    token      TEXT PRIMARY KEY,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL
);

-- ── Curriculum (imported, read-only to the engine) ───────────────────

CREATE TABLE IF NOT EXISTS courses (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    order_index REAL
);

CREATE TABLE IF NOT EXISTS subjects (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    course_id   TEXT NOT NULL REFERENCES courses(id),
    order_index REAL
);

CREATE TABLE IF NOT EXISTS modules (
    id          TEXT PRIMARY KEY,
    title       TEXT NOT NULL,
    subject_id  TEXT NOT NULL REFERENCES subjects(id),
    slug        TEXT UNIQUE,
    order_index REAL
);

CREATE TABLE IF NOT EXISTS sections (
    id          TEXT PRIMARY KEY,
    module_id   TEXT NOT NULL REFERENCES modules(id),
    title       TEXT,
    order_index REAL
);

CREATE TABLE IF NOT EXISTS lectures (
    id         TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES sections(id)
);

CREATE TABLE IF NOT EXISTS quizzes (
    id         TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES sections(id)
);

CREATE TABLE IF NOT EXISTS quiz_questions (
    id      TEXT PRIMARY KEY,
    quiz_id TEXT NOT NULL REFERENCES quizzes(id)
);

CREATE TABLE IF NOT EXISTS exercises (
    id         TEXT PRIMARY KEY,
    section_id TEXT NOT NULL REFERENCES sections(id)
);

CREATE TABLE IF NOT EXISTS exercise_questions (
    id          TEXT PRIMARY KEY,
    exercise_id TEXT NOT NULL REFERENCES exercises(id)
);

-- ── Activity ─────────────────────────────────────────────────────────

-- Upsert-by-(user, lecture); the watched position only ever rises and
-- is_watched never reverts to 0.
CREATE TABLE IF NOT EXISTS user_lecture_progress (
    user_id          TEXT NOT NULL,
    lecture_id       TEXT NOT NULL,
    course_id        TEXT,
    subject_id       TEXT,
    module_id        TEXT NOT NULL,
    section_id       TEXT NOT NULL,
    watched_seconds  INTEGER,
    duration_seconds INTEGER,
    is_watched       INTEGER NOT NULL DEFAULT 0,
    updated_at       TEXT NOT NULL,
    UNIQUE (user_id, lecture_id)
);

-- One row per answered question. NULL question ids fall outside the
-- unique index and may repeat; counts use DISTINCT question_id.
CREATE TABLE IF NOT EXISTS user_quiz_attempts (
    user_id     TEXT NOT NULL,
    course_id   TEXT,
    subject_id  TEXT,
    module_id   TEXT NOT NULL,
    section_id  TEXT NOT NULL,
    question_id TEXT,
    created_at  TEXT NOT NULL,
    UNIQUE (user_id, section_id, question_id)
);

-- Whole-quiz attempt markers from the static quiz flow, one per
-- (user, quiz). Per-question answers live in user_quiz_attempts.
CREATE TABLE IF NOT EXISTS user_basic_quiz_attempts (
    user_id    TEXT NOT NULL,
    section_id TEXT NOT NULL,
    quiz_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,
    UNIQUE (user_id, quiz_id)
);

-- Written by the adaptive quiz engine; this store only reads them in
-- production, and writes fixtures through the import surface.
CREATE TABLE IF NOT EXISTS adaptive_quiz_sessions (
    id                      TEXT PRIMARY KEY,
    user_id                 TEXT NOT NULL,
    section_id              TEXT NOT NULL,
    status                  TEXT NOT NULL,
    current_question_number INTEGER NOT NULL DEFAULT 0,
    created_at              TEXT,
    updated_at              TEXT
);

CREATE TABLE IF NOT EXISTS adaptive_quiz_responses (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id  TEXT NOT NULL REFERENCES adaptive_quiz_sessions(id),
    question_id TEXT,
    is_correct  INTEGER,
    user_answer TEXT,
    created_at  TEXT
);

-- Append-only module-scoped submissions (legacy completion signal).
CREATE TABLE IF NOT EXISTS user_exercise_submissions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      TEXT NOT NULL,
    course_id    TEXT,
    subject_id   TEXT,
    module_id    TEXT NOT NULL,
    section_id   TEXT NOT NULL,
    exercise_id  TEXT,
    question_id  TEXT,
    is_correct   INTEGER,
    submitted_at TEXT NOT NULL
);

-- Append-only per-question submissions for structured exercises.
CREATE TABLE IF NOT EXISTS exercise_question_submissions (
    id           INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id      TEXT NOT NULL,
    exercise_id  TEXT NOT NULL,
    question_id  TEXT NOT NULL,
    user_answer  TEXT,
    is_correct   INTEGER NOT NULL,
    submitted_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS user_exercise_progress (
    user_id     TEXT NOT NULL,
    exercise_id TEXT NOT NULL,
    completed   INTEGER NOT NULL DEFAULT 0,
    updated_at  TEXT NOT NULL,
    UNIQUE (user_id, exercise_id)
);

-- The single derived status row per (user, module). Recomputation
-- upserts; it never appends.
CREATE TABLE IF NOT EXISTS user_module_status (
    id                     INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id                TEXT NOT NULL,
    module_id              TEXT NOT NULL,
    status                 TEXT NOT NULL,
    correctness_percentage REAL,
    progress               INTEGER NOT NULL DEFAULT 0,
    updated_at             TEXT NOT NULL,
    UNIQUE (user_id, module_id)
);

-- One stored path document per user, replaced wholesale.
CREATE TABLE IF NOT EXISTS user_paths (
    user_id    TEXT PRIMARY KEY,
    path_json  TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS lectures_section_idx
    ON lectures(section_id);
CREATE INDEX IF NOT EXISTS exercises_section_idx
    ON exercises(section_id);
CREATE INDEX IF NOT EXISTS lecture_progress_section_idx
    ON user_lecture_progress(user_id, section_id);
CREATE INDEX IF NOT EXISTS quiz_attempts_module_idx
    ON user_quiz_attempts(user_id, module_id);
CREATE INDEX IF NOT EXISTS basic_quiz_attempts_section_idx
    ON user_basic_quiz_attempts(user_id, section_id);
CREATE INDEX IF NOT EXISTS adaptive_sessions_user_idx
    ON adaptive_quiz_sessions(user_id, section_id);
CREATE INDEX IF NOT EXISTS exercise_submissions_module_idx
    ON user_exercise_submissions(user_id, module_id);

PRAGMA user_version = 1;
";
