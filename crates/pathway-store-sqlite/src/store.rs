//! [`SqliteStore`] — the SQLite implementation of [`ProgressStore`].

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use serde_json::Value;
use uuid::Uuid;

use pathway_core::{
  activity::{
    AdaptiveResponseRow, AdaptiveSessionRow, BasicQuizAttemptRow,
    ExerciseProgressRow, ExerciseSubmissionRow, ModuleExerciseSubmissionRow,
    ModuleStatusRow, NewBasicQuizAttempt, NewExerciseQuestionSubmission,
    NewExerciseSubmission, NewLectureProgress, NewModuleStatus, NewQuizAttempt,
    QuizAttemptRow, WatchedLectureRow,
  },
  aggregate::clamp_progress,
  curriculum::{
    CourseRow, ExerciseQuestionRef, ExerciseRef, LectureRef, ModuleRequirement,
    ModuleRow, QuizQuestionRef, QuizRef, SectionMeta, SubjectRow,
  },
  store::ProgressStore,
};

use crate::{
  encode::{
    IN_CHUNK, RawAdaptiveSession, decode_uuid, encode_dt, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

/// Run `build_sql("?, ?, …")` once per chunk of `ids` and concatenate
/// the mapped rows. `head` params precede the chunk in every query.
fn query_in<T>(
  conn: &rusqlite::Connection,
  build_sql: impl Fn(&str) -> String,
  head: &[String],
  ids: &[String],
  mut map: impl FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
) -> rusqlite::Result<Vec<T>> {
  let mut out = Vec::new();
  for chunk in ids.chunks(IN_CHUNK) {
    let placeholders = vec!["?"; chunk.len()].join(", ");
    let mut stmt = conn.prepare(&build_sql(&placeholders))?;
    let rows = stmt
      .query_map(
        rusqlite::params_from_iter(head.iter().chain(chunk.iter())),
        &mut map,
      )?
      .collect::<rusqlite::Result<Vec<_>>>()?;
    out.extend(rows);
  }
  Ok(out)
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A progress store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Import surface ──────────────────────────────────────────────────────────
// Curriculum rows, adaptive-quiz rows and auth sessions originate in
// sibling services; these upserts are the sync path in and double as
// the fixture surface in tests.

impl SqliteStore {
  pub async fn create_session(&self, token: &str, user_id: Uuid) -> Result<()> {
    let token = token.to_owned();
    let user_str = encode_uuid(user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO sessions (token, user_id, created_at)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![token, user_str, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_course(&self, row: CourseRow) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO courses (id, title, order_index)
           VALUES (?1, ?2, ?3)",
          rusqlite::params![row.id, row.title, row.order_index],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_subject(&self, row: SubjectRow) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO subjects (id, title, course_id, order_index)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![row.id, row.title, row.course_id, row.order_index],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_module(&self, row: ModuleRow) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO modules
             (id, title, subject_id, slug, order_index)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![
            row.id,
            row.title,
            row.subject_id,
            row.slug,
            row.order_index
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_section(&self, row: SectionMeta) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO sections (id, module_id, title, order_index)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![row.id, row.module_id, row.title, row.order_index],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_lecture(&self, row: LectureRef) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO lectures (id, section_id) VALUES (?1, ?2)",
          rusqlite::params![row.id, row.section_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_quiz(&self, row: QuizRef) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO quizzes (id, section_id) VALUES (?1, ?2)",
          rusqlite::params![row.id, row.section_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_quiz_question(&self, row: QuizQuestionRef) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO quiz_questions (id, quiz_id) VALUES (?1, ?2)",
          rusqlite::params![row.id, row.quiz_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_exercise(&self, row: ExerciseRef) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO exercises (id, section_id) VALUES (?1, ?2)",
          rusqlite::params![row.id, row.section_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_exercise_question(
    &self,
    row: ExerciseQuestionRef,
  ) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO exercise_questions (id, exercise_id)
           VALUES (?1, ?2)",
          rusqlite::params![row.id, row.exercise_id],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_adaptive_session(
    &self,
    user_id: Uuid,
    row: AdaptiveSessionRow,
  ) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let created = row.created_at.map(encode_dt);
    let updated = row.updated_at.map(encode_dt);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT OR REPLACE INTO adaptive_quiz_sessions
             (id, user_id, section_id, status, current_question_number,
              created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            row.id,
            user_str,
            row.section_id,
            row.status.as_str(),
            row.current_question_number,
            created,
            updated,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_adaptive_response(
    &self,
    row: AdaptiveResponseRow,
  ) -> Result<()> {
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO adaptive_quiz_responses
             (session_id, is_correct, user_answer, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![row.session_id, row.is_correct, row.user_answer, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  pub async fn put_exercise_progress(
    &self,
    user_id: Uuid,
    row: ExerciseProgressRow,
  ) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_exercise_progress
             (user_id, exercise_id, completed, updated_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id, exercise_id) DO UPDATE SET
             completed  = excluded.completed,
             updated_at = excluded.updated_at",
          rusqlite::params![user_str, row.exercise_id, row.completed, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ProgressStore impl ──────────────────────────────────────────────────────

impl ProgressStore for SqliteStore {
  type Error = Error;

  // ── Sessions ──────────────────────────────────────────────────────────

  async fn resolve_session(&self, token: &str) -> Result<Option<Uuid>> {
    let token = token.to_owned();
    let user_str: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT user_id FROM sessions WHERE token = ?1",
              rusqlite::params![token],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    user_str.as_deref().map(decode_uuid).transpose()
  }

  // ── Curriculum reads ──────────────────────────────────────────────────

  async fn resolve_module(&self, key: &str) -> Result<Option<ModuleRow>> {
    let key = key.to_owned();
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, title, subject_id, slug, order_index
               FROM modules
               WHERE id = ?1 OR slug = ?1
               ORDER BY (id = ?1) DESC
               LIMIT 1",
              rusqlite::params![key],
              |row| {
                Ok(ModuleRow {
                  id:          row.get(0)?,
                  title:       row.get(1)?,
                  subject_id:  row.get(2)?,
                  slug:        row.get(3)?,
                  order_index: row.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  async fn course(&self, id: &str) -> Result<Option<CourseRow>> {
    let id = id.to_owned();
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, title, order_index FROM courses WHERE id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(CourseRow {
                  id:          row.get(0)?,
                  title:       row.get(1)?,
                  order_index: row.get(2)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  async fn subject(&self, id: &str) -> Result<Option<SubjectRow>> {
    let id = id.to_owned();
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, title, course_id, order_index
               FROM subjects WHERE id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(SubjectRow {
                  id:          row.get(0)?,
                  title:       row.get(1)?,
                  course_id:   row.get(2)?,
                  order_index: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  async fn section(&self, id: &str) -> Result<Option<SectionMeta>> {
    let id = id.to_owned();
    let row = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT id, module_id, title, order_index
               FROM sections WHERE id = ?1",
              rusqlite::params![id],
              |row| {
                Ok(SectionMeta {
                  id:          row.get(0)?,
                  module_id:   row.get(1)?,
                  title:       row.get(2)?,
                  order_index: row.get(3)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    Ok(row)
  }

  async fn sections_of_module(&self, module_id: &str) -> Result<Vec<SectionMeta>> {
    let module_id = module_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, module_id, title, order_index
           FROM sections WHERE module_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![module_id], |row| {
            Ok(SectionMeta {
              id:          row.get(0)?,
              module_id:   row.get(1)?,
              title:       row.get(2)?,
              order_index: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  // ── Fallback curriculum tree ──────────────────────────────────────────

  async fn all_courses(&self) -> Result<Vec<CourseRow>> {
    let rows = self
      .conn
      .call(|conn| {
        let mut stmt =
          conn.prepare("SELECT id, title, order_index FROM courses")?;
        let rows = stmt
          .query_map([], |row| {
            Ok(CourseRow {
              id:          row.get(0)?,
              title:       row.get(1)?,
              order_index: row.get(2)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn subjects_of_course(&self, course_id: &str) -> Result<Vec<SubjectRow>> {
    let course_id = course_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, title, course_id, order_index
           FROM subjects WHERE course_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![course_id], |row| {
            Ok(SubjectRow {
              id:          row.get(0)?,
              title:       row.get(1)?,
              course_id:   row.get(2)?,
              order_index: row.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn modules_of_subject(&self, subject_id: &str) -> Result<Vec<ModuleRow>> {
    let subject_id = subject_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT id, title, subject_id, slug, order_index
           FROM modules WHERE subject_id = ?1",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![subject_id], |row| {
            Ok(ModuleRow {
              id:          row.get(0)?,
              title:       row.get(1)?,
              subject_id:  row.get(2)?,
              slug:        row.get(3)?,
              order_index: row.get(4)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  // ── Content reads ─────────────────────────────────────────────────────

  async fn lectures_in_sections(
    &self,
    section_ids: &[String],
  ) -> Result<Vec<LectureRef>> {
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| format!("SELECT id, section_id FROM lectures WHERE section_id IN ({ph})"),
          &[],
          &ids,
          |row| Ok(LectureRef { id: row.get(0)?, section_id: row.get(1)? }),
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn quizzes_in_sections(
    &self,
    section_ids: &[String],
  ) -> Result<Vec<QuizRef>> {
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| format!("SELECT id, section_id FROM quizzes WHERE section_id IN ({ph})"),
          &[],
          &ids,
          |row| Ok(QuizRef { id: row.get(0)?, section_id: row.get(1)? }),
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn quiz_questions(
    &self,
    quiz_ids: &[String],
  ) -> Result<Vec<QuizQuestionRef>> {
    let ids = quiz_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| format!("SELECT id, quiz_id FROM quiz_questions WHERE quiz_id IN ({ph})"),
          &[],
          &ids,
          |row| Ok(QuizQuestionRef { id: row.get(0)?, quiz_id: row.get(1)? }),
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn exercises_in_sections(
    &self,
    section_ids: &[String],
  ) -> Result<Vec<ExerciseRef>> {
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| format!("SELECT id, section_id FROM exercises WHERE section_id IN ({ph})"),
          &[],
          &ids,
          |row| Ok(ExerciseRef { id: row.get(0)?, section_id: row.get(1)? }),
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn exercise_questions(
    &self,
    exercise_ids: &[String],
  ) -> Result<Vec<ExerciseQuestionRef>> {
    let ids = exercise_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT id, exercise_id FROM exercise_questions
               WHERE exercise_id IN ({ph})"
            )
          },
          &[],
          &ids,
          |row| {
            Ok(ExerciseQuestionRef { id: row.get(0)?, exercise_id: row.get(1)? })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  // ── Activity reads ────────────────────────────────────────────────────

  async fn watched_lectures(
    &self,
    user_id: Uuid,
    section_ids: &[String],
  ) -> Result<Vec<WatchedLectureRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT section_id, lecture_id FROM user_lecture_progress
               WHERE user_id = ? AND is_watched = 1 AND section_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| {
            Ok(WatchedLectureRow { section_id: row.get(0)?, lecture_id: row.get(1)? })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn quiz_attempts(
    &self,
    user_id: Uuid,
    section_ids: &[String],
  ) -> Result<Vec<QuizAttemptRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT section_id, question_id FROM user_quiz_attempts
               WHERE user_id = ? AND section_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| {
            Ok(QuizAttemptRow { section_id: row.get(0)?, question_id: row.get(1)? })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn basic_quiz_attempts(
    &self,
    user_id: Uuid,
    section_ids: &[String],
  ) -> Result<Vec<BasicQuizAttemptRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = section_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT section_id, quiz_id FROM user_basic_quiz_attempts
               WHERE user_id = ? AND section_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| {
            Ok(BasicQuizAttemptRow { section_id: row.get(0)?, quiz_id: row.get(1)? })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn module_quiz_attempt_count(
    &self,
    user_id: Uuid,
    module_id: &str,
  ) -> Result<u64> {
    let user_str = encode_uuid(user_id);
    let module_id = module_id.to_owned();
    let count: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COUNT(DISTINCT question_id) FROM user_quiz_attempts
           WHERE user_id = ?1 AND module_id = ?2 AND question_id IS NOT NULL",
          rusqlite::params![user_str, module_id],
          |row| row.get(0),
        )?)
      })
      .await?;
    Ok(count as u64)
  }

  async fn adaptive_sessions(
    &self,
    user_id: Uuid,
    section_ids: &[String],
  ) -> Result<Vec<AdaptiveSessionRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = section_ids.to_vec();
    let raws: Vec<RawAdaptiveSession> = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT id, section_id, status, current_question_number,
                      created_at, updated_at
               FROM adaptive_quiz_sessions
               WHERE user_id = ? AND section_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| {
            Ok(RawAdaptiveSession {
              id:                      row.get(0)?,
              section_id:              row.get(1)?,
              status:                  row.get(2)?,
              current_question_number: row.get(3)?,
              created_at:              row.get(4)?,
              updated_at:              row.get(5)?,
            })
          },
        )?)
      })
      .await?;
    raws.into_iter().map(RawAdaptiveSession::into_row).collect()
  }

  async fn adaptive_responses(
    &self,
    session_ids: &[String],
  ) -> Result<Vec<AdaptiveResponseRow>> {
    let ids = session_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT session_id, is_correct, user_answer
               FROM adaptive_quiz_responses
               WHERE session_id IN ({ph})
               ORDER BY id"
            )
          },
          &[],
          &ids,
          |row| {
            Ok(AdaptiveResponseRow {
              session_id:  row.get(0)?,
              is_correct:  row.get(1)?,
              user_answer: row.get(2)?,
            })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn exercise_submissions(
    &self,
    user_id: Uuid,
    exercise_ids: &[String],
  ) -> Result<Vec<ExerciseSubmissionRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = exercise_ids.to_vec();
    let raws: Vec<(String, String, Option<String>)> = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT exercise_id, question_id, submitted_at
               FROM exercise_question_submissions
               WHERE user_id = ? AND exercise_id IN ({ph})
               ORDER BY id"
            )
          },
          &head,
          &ids,
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
      })
      .await?;

    raws
      .into_iter()
      .map(|(exercise_id, question_id, at)| {
        Ok(ExerciseSubmissionRow {
          exercise_id,
          question_id,
          submitted_at: at.as_deref().map(crate::encode::decode_dt).transpose()?,
        })
      })
      .collect()
  }

  async fn exercise_progress(
    &self,
    user_id: Uuid,
    exercise_ids: &[String],
  ) -> Result<Vec<ExerciseProgressRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = exercise_ids.to_vec();
    let rows = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT exercise_id, completed FROM user_exercise_progress
               WHERE user_id = ? AND exercise_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| {
            Ok(ExerciseProgressRow { exercise_id: row.get(0)?, completed: row.get(1)? })
          },
        )?)
      })
      .await?;
    Ok(rows)
  }

  async fn module_exercise_submissions(
    &self,
    user_id: Uuid,
    module_id: &str,
  ) -> Result<Vec<ModuleExerciseSubmissionRow>> {
    let user_str = encode_uuid(user_id);
    let module_id = module_id.to_owned();
    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT question_id, is_correct FROM user_exercise_submissions
           WHERE user_id = ?1 AND module_id = ?2
           ORDER BY id",
        )?;
        let rows = stmt
          .query_map(rusqlite::params![user_str, module_id], |row| {
            Ok(ModuleExerciseSubmissionRow {
              question_id: row.get(0)?,
              is_correct:  row.get(1)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(rows)
  }

  async fn module_statuses(
    &self,
    user_id: Uuid,
    module_ids: &[String],
  ) -> Result<Vec<ModuleStatusRow>> {
    let head = vec![encode_uuid(user_id)];
    let ids = module_ids.to_vec();
    let raws: Vec<(String, String, Option<f64>, Option<i64>)> = self
      .conn
      .call(move |conn| {
        Ok(query_in(
          conn,
          |ph| {
            format!(
              "SELECT module_id, status, correctness_percentage, progress
               FROM user_module_status
               WHERE user_id = ? AND module_id IN ({ph})"
            )
          },
          &head,
          &ids,
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?)
      })
      .await?;

    Ok(
      raws
        .into_iter()
        .map(|(module_id, status, correctness_percentage, progress)| {
          ModuleStatusRow {
            module_id,
            status: ModuleRequirement::parse(Some(&status)),
            correctness_percentage,
            progress,
          }
        })
        .collect(),
    )
  }

  // ── Activity writes ───────────────────────────────────────────────────

  async fn record_lecture_progress(
    &self,
    input: NewLectureProgress,
  ) -> Result<()> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_lecture_progress
             (user_id, lecture_id, course_id, subject_id, module_id,
              section_id, watched_seconds, duration_seconds, is_watched,
              updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
           ON CONFLICT (user_id, lecture_id) DO UPDATE SET
             watched_seconds  = MAX(
               COALESCE(user_lecture_progress.watched_seconds, 0),
               COALESCE(excluded.watched_seconds, 0)),
             duration_seconds = COALESCE(
               excluded.duration_seconds,
               user_lecture_progress.duration_seconds),
             is_watched       = MAX(
               user_lecture_progress.is_watched, excluded.is_watched),
             updated_at       = excluded.updated_at",
          rusqlite::params![
            user_str,
            input.lecture_id,
            input.course_id,
            input.subject_id,
            input.module_id,
            input.section_id,
            input.watched_seconds,
            input.duration_seconds,
            input.is_watched,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_quiz_attempt(&self, input: NewQuizAttempt) -> Result<()> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_quiz_attempts
             (user_id, course_id, subject_id, module_id, section_id,
              question_id, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
           ON CONFLICT (user_id, section_id, question_id) DO NOTHING",
          rusqlite::params![
            user_str,
            input.course_id,
            input.subject_id,
            input.module_id,
            input.section_id,
            input.question_id,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_basic_quiz_attempt(
    &self,
    input: NewBasicQuizAttempt,
  ) -> Result<()> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_basic_quiz_attempts
             (user_id, section_id, quiz_id, created_at)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (user_id, quiz_id) DO NOTHING",
          rusqlite::params![user_str, input.section_id, input.quiz_id, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_exercise_submission(
    &self,
    input: NewExerciseSubmission,
  ) -> Result<()> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_exercise_submissions
             (user_id, course_id, subject_id, module_id, section_id,
              exercise_id, question_id, is_correct, submitted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          rusqlite::params![
            user_str,
            input.course_id,
            input.subject_id,
            input.module_id,
            input.section_id,
            input.exercise_id,
            input.question_id,
            input.is_correct,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn record_exercise_question_submission(
    &self,
    input: NewExerciseQuestionSubmission,
  ) -> Result<()> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO exercise_question_submissions
             (user_id, exercise_id, question_id, user_answer, is_correct,
              submitted_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
          rusqlite::params![
            user_str,
            input.exercise_id,
            input.question_id,
            input.user_answer,
            input.is_correct,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_module_status(
    &self,
    input: NewModuleStatus,
  ) -> Result<ModuleStatusRow> {
    let user_str = encode_uuid(input.user_id);
    let at_str = encode_dt(Utc::now());
    let progress = clamp_progress(input.progress);
    let module_id = input.module_id.clone();
    let status_str = input.status.as_str();
    let correctness = input.correctness_percentage;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_module_status
             (user_id, module_id, status, correctness_percentage, progress,
              updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6)
           ON CONFLICT (user_id, module_id) DO UPDATE SET
             status                 = excluded.status,
             correctness_percentage = excluded.correctness_percentage,
             progress               = excluded.progress,
             updated_at             = excluded.updated_at",
          rusqlite::params![
            user_str,
            input.module_id,
            status_str,
            correctness,
            progress,
            at_str,
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(ModuleStatusRow {
      module_id,
      status: input.status,
      correctness_percentage: input.correctness_percentage,
      progress: Some(progress),
    })
  }

  // ── Path document ─────────────────────────────────────────────────────

  async fn load_path(&self, user_id: Uuid) -> Result<Option<Value>> {
    let user_str = encode_uuid(user_id);
    let json: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT path_json FROM user_paths WHERE user_id = ?1",
              rusqlite::params![user_str],
              |row| row.get(0),
            )
            .optional()?,
        )
      })
      .await?;
    json.as_deref().map(serde_json::from_str).transpose().map_err(Error::Json)
  }

  async fn replace_path(&self, user_id: Uuid, document: &Value) -> Result<()> {
    let user_str = encode_uuid(user_id);
    let json = serde_json::to_string(document)?;
    let at_str = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO user_paths (user_id, path_json, updated_at)
           VALUES (?1, ?2, ?3)
           ON CONFLICT (user_id) DO UPDATE SET
             path_json  = excluded.path_json,
             updated_at = excluded.updated_at",
          rusqlite::params![user_str, json, at_str],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}
