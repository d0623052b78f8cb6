//! Batch evidence gathering shared by the section-status and progress
//! flows.
//!
//! All store reads for a request happen here, before any write; the
//! evaluator then runs over in-memory evidence only. A failed read
//! aborts the whole batch — partial results are never returned.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use pathway_core::{
  activity::{AdaptiveResponseRow, AdaptiveSessionRow},
  aggregate::{ModuleProgressSnapshot, SectionRollup},
  ordering,
  requirement::{
    self, ExerciseEvidence, SectionEvidence, SectionRequirementSummary,
  },
  store::ProgressStore,
};
use serde::Serialize;
use uuid::Uuid;

use crate::error::ApiError;

/// Finished adaptive sessions reported per section, most recent first.
const HISTORY_LIMIT: usize = 3;

// ─── Output types ────────────────────────────────────────────────────────────

/// One section's gathered evidence with its evaluated summary.
#[derive(Debug, Clone)]
pub struct SectionReport {
  pub evidence: SectionEvidence,
  pub summary:  SectionRequirementSummary,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveResponseSummary {
  pub is_correct:  Option<bool>,
  pub user_answer: Option<String>,
}

/// A finished adaptive-quiz session with its response summaries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdaptiveSessionSummary {
  pub session_id:              String,
  pub section_id:              String,
  pub status:                  &'static str,
  pub current_question_number: i64,
  pub updated_at:              Option<DateTime<Utc>>,
  pub responses:               Vec<AdaptiveResponseSummary>,
}

/// The full result of one evidence batch.
#[derive(Debug, Clone)]
pub struct SectionStatusBatch {
  pub reports: Vec<SectionReport>,
  pub history: Vec<AdaptiveSessionSummary>,
}

impl SectionStatusBatch {
  pub fn statuses(&self) -> BTreeMap<String, SectionRequirementSummary> {
    self
      .reports
      .iter()
      .map(|r| (r.evidence.section_id.clone(), r.summary.clone()))
      .collect()
  }
}

// ─── Aggregation helpers ─────────────────────────────────────────────────────

/// Coarse per-module counters summed over a module's section reports.
pub fn snapshot_from(reports: &[SectionReport]) -> ModuleProgressSnapshot {
  let mut snapshot = ModuleProgressSnapshot::default();
  for report in reports {
    let e = &report.evidence;
    snapshot.total_lectures += e.total_lectures;
    snapshot.watched_lectures += e.watched_lectures;
    snapshot.total_exercise_questions += e.total_exercise_questions;
    snapshot.answered_exercise_questions += e.answered_exercise_questions;
    if e.adaptive_question_target > 0 {
      snapshot.total_adaptive_sections += 1;
      if e.answered_adaptive_questions as i64 >= e.adaptive_question_target {
        snapshot.completed_adaptive_sections += 1;
      }
    }
    snapshot.section_ids.push(e.section_id.clone());
  }
  snapshot
}

/// Fresh per-section rollup; `None` when the module has no sections at
/// all (the legacy signals decide instead).
pub fn rollup_from(reports: &[SectionReport]) -> Option<SectionRollup> {
  if reports.is_empty() {
    return None;
  }
  Some(SectionRollup {
    total:     reports.len(),
    completed: reports.iter().filter(|r| r.summary.completed).count(),
  })
}

// ─── Gathering ───────────────────────────────────────────────────────────────

/// Gather evidence for `section_ids` and evaluate each section.
///
/// Unknown section ids are skipped rather than erroring; duplicates are
/// collapsed. Every store failure carries the name of the failing step.
pub async fn gather<S>(
  store: &S,
  user: Uuid,
  section_ids: &[String],
) -> Result<SectionStatusBatch, ApiError>
where
  S: ProgressStore,
{
  let mut seen = HashSet::new();
  let requested: Vec<String> = section_ids
    .iter()
    .filter(|id| seen.insert((*id).clone()))
    .cloned()
    .collect();

  let mut sections = Vec::new();
  for id in &requested {
    if let Some(meta) = store
      .section(id)
      .await
      .map_err(|e| ApiError::store("section_fetch_failed", e))?
    {
      sections.push(meta);
    }
  }
  let ids: Vec<String> = sections.iter().map(|s| s.id.clone()).collect();

  // Subject titles and ids keyed by module. Titles feed the override
  // policy; ids scope the onboarding exception below.
  let mut subject_titles: HashMap<String, Option<String>> = HashMap::new();
  let mut module_subjects: HashMap<String, Option<String>> = HashMap::new();
  for meta in &sections {
    if module_subjects.contains_key(&meta.module_id) {
      continue;
    }
    let module = store
      .resolve_module(&meta.module_id)
      .await
      .map_err(|e| ApiError::store("module_fetch_failed", e))?;
    let (subject_id, title) = match module {
      Some(module) => {
        let title = store
          .subject(&module.subject_id)
          .await
          .map_err(|e| ApiError::store("subject_fetch_failed", e))?
          .map(|s| s.title);
        (Some(module.subject_id), title)
      }
      None => (None, None),
    };
    subject_titles.insert(meta.module_id.clone(), title);
    module_subjects.insert(meta.module_id.clone(), subject_id);
  }

  // The onboarding exception covers the first section of a subject's
  // first module, so resolve that section for every subject the batch
  // touches.
  let mut onboarding_sections: HashSet<String> = HashSet::new();
  let subject_ids: HashSet<&String> =
    module_subjects.values().flatten().collect();
  for subject_id in subject_ids {
    let modules = store
      .modules_of_subject(subject_id)
      .await
      .map_err(|e| ApiError::store("subject_modules_fetch_failed", e))?;
    let Some(first_module) =
      ordering::first_by_order(&modules, |m| m.order_index)
        .map(|index| &modules[index])
    else {
      continue;
    };
    let module_sections = store
      .sections_of_module(&first_module.id)
      .await
      .map_err(|e| ApiError::store("module_sections_fetch_failed", e))?;
    if let Some(index) =
      ordering::first_by_order(&module_sections, |s| s.order_index)
    {
      onboarding_sections.insert(module_sections[index].id.clone());
    }
  }

  // Content, batched over all sections at once.
  let lectures = store
    .lectures_in_sections(&ids)
    .await
    .map_err(|e| ApiError::store("section_lectures_fetch_failed", e))?;
  let quizzes = store
    .quizzes_in_sections(&ids)
    .await
    .map_err(|e| ApiError::store("section_quizzes_fetch_failed", e))?;
  let quiz_ids: Vec<String> = quizzes.iter().map(|q| q.id.clone()).collect();
  let quiz_questions = store
    .quiz_questions(&quiz_ids)
    .await
    .map_err(|e| ApiError::store("quiz_questions_fetch_failed", e))?;
  let exercises = store
    .exercises_in_sections(&ids)
    .await
    .map_err(|e| ApiError::store("section_exercises_fetch_failed", e))?;
  let exercise_ids: Vec<String> =
    exercises.iter().map(|x| x.id.clone()).collect();
  let exercise_questions = store
    .exercise_questions(&exercise_ids)
    .await
    .map_err(|e| ApiError::store("exercise_questions_fetch_failed", e))?;

  // Per-user activity.
  let watched = store
    .watched_lectures(user, &ids)
    .await
    .map_err(|e| ApiError::store("watched_lectures_fetch_failed", e))?;
  let attempts = store
    .quiz_attempts(user, &ids)
    .await
    .map_err(|e| ApiError::store("quiz_attempts_fetch_failed", e))?;
  let basic_attempts = store
    .basic_quiz_attempts(user, &ids)
    .await
    .map_err(|e| ApiError::store("basic_quiz_attempts_fetch_failed", e))?;
  let sessions = store
    .adaptive_sessions(user, &ids)
    .await
    .map_err(|e| ApiError::store("adaptive_sessions_fetch_failed", e))?;
  let finished_session_ids: Vec<String> = sessions
    .iter()
    .filter(|s| s.status.is_finished())
    .map(|s| s.id.clone())
    .collect();
  let responses = store
    .adaptive_responses(&finished_session_ids)
    .await
    .map_err(|e| ApiError::store("adaptive_responses_fetch_failed", e))?;
  let submissions = store
    .exercise_submissions(user, &exercise_ids)
    .await
    .map_err(|e| ApiError::store("exercise_submissions_fetch_failed", e))?;
  let exercise_progress = store
    .exercise_progress(user, &exercise_ids)
    .await
    .map_err(|e| ApiError::store("exercise_progress_fetch_failed", e))?;

  // Index everything by section / exercise / session.
  let mut lectures_by_section: HashMap<&str, usize> = HashMap::new();
  for lecture in &lectures {
    *lectures_by_section.entry(&lecture.section_id).or_default() += 1;
  }

  let quiz_section: HashMap<&str, &str> = quizzes
    .iter()
    .map(|q| (q.id.as_str(), q.section_id.as_str()))
    .collect();
  let mut static_questions: HashMap<&str, HashSet<&str>> = HashMap::new();
  for question in &quiz_questions {
    if let Some(section) = quiz_section.get(question.quiz_id.as_str()) {
      static_questions.entry(section).or_default().insert(&question.id);
    }
  }

  let mut exercises_by_section: HashMap<&str, Vec<&str>> = HashMap::new();
  for exercise in &exercises {
    exercises_by_section
      .entry(&exercise.section_id)
      .or_default()
      .push(&exercise.id);
  }
  let mut questions_by_exercise: HashMap<&str, HashSet<&str>> = HashMap::new();
  for question in &exercise_questions {
    questions_by_exercise
      .entry(&question.exercise_id)
      .or_default()
      .insert(&question.id);
  }

  let mut watched_by_section: HashMap<&str, HashSet<&str>> = HashMap::new();
  for row in &watched {
    watched_by_section.entry(&row.section_id).or_default().insert(&row.lecture_id);
  }

  let mut attempts_by_section: HashMap<&str, Vec<Option<&str>>> =
    HashMap::new();
  for attempt in &attempts {
    attempts_by_section
      .entry(&attempt.section_id)
      .or_default()
      .push(attempt.question_id.as_deref());
  }
  let basic_by_section: HashSet<&str> =
    basic_attempts.iter().map(|a| a.section_id.as_str()).collect();

  // Only answers to known questions count toward coverage.
  let mut answered_by_exercise: HashMap<&str, HashSet<&str>> = HashMap::new();
  for submission in &submissions {
    if questions_by_exercise
      .get(submission.exercise_id.as_str())
      .is_some_and(|known| known.contains(submission.question_id.as_str()))
    {
      answered_by_exercise
        .entry(&submission.exercise_id)
        .or_default()
        .insert(&submission.question_id);
    }
  }
  let progress_completed: HashSet<&str> = exercise_progress
    .iter()
    .filter(|p| p.completed)
    .map(|p| p.exercise_id.as_str())
    .collect();

  let mut sessions_by_section: HashMap<&str, Vec<&AdaptiveSessionRow>> =
    HashMap::new();
  for session in &sessions {
    sessions_by_section.entry(&session.section_id).or_default().push(session);
  }
  let mut responses_by_session: HashMap<&str, Vec<&AdaptiveResponseRow>> =
    HashMap::new();
  for response in &responses {
    responses_by_session
      .entry(&response.session_id)
      .or_default()
      .push(response);
  }

  // Evaluate each section.
  let mut reports = Vec::with_capacity(sections.len());
  for meta in &sections {
    let sid = meta.id.as_str();
    let static_set = static_questions.get(sid);
    let section_attempts = attempts_by_section.get(sid);

    let answered_static = section_attempts
      .map(|attempts| {
        attempts
          .iter()
          .filter_map(|q| *q)
          .filter(|q| static_set.is_some_and(|set| set.contains(q)))
          .collect::<HashSet<_>>()
          .len()
      })
      .unwrap_or(0);
    // Only a whole-quiz record from the static flow counts; answering
    // adaptive questions one by one is a different signal.
    let basic_quiz_attempted = basic_by_section.contains(sid);

    let adaptive_question_target = sessions_by_section
      .get(sid)
      .into_iter()
      .flatten()
      .filter(|s| s.status.is_finished())
      .map(|s| s.current_question_number)
      .max()
      .unwrap_or(0);
    // Distinct answered questions; a question retried across sessions
    // counts once.
    let answered_adaptive_questions = section_attempts
      .map(|attempts| {
        attempts.iter().filter_map(|q| *q).collect::<HashSet<_>>().len()
      })
      .unwrap_or(0);

    let mut section_exercises = Vec::new();
    let mut total_exercise_questions = 0;
    let mut answered_exercise_questions = 0;
    for exercise_id in
      exercises_by_section.get(sid).into_iter().flatten()
    {
      let total = questions_by_exercise
        .get(exercise_id)
        .map_or(0, HashSet::len);
      let answered = answered_by_exercise
        .get(exercise_id)
        .map_or(0, HashSet::len);
      total_exercise_questions += total;
      answered_exercise_questions += answered;
      section_exercises.push(ExerciseEvidence {
        exercise_id:        (*exercise_id).to_owned(),
        total_questions:    total,
        answered_questions: answered,
        progress_completed: progress_completed.contains(exercise_id),
      });
    }

    let evidence = SectionEvidence {
      section_id: meta.id.clone(),
      subject_title: subject_titles
        .get(&meta.module_id)
        .cloned()
        .flatten(),
      section_title: meta.title.clone(),
      first_of_first_module: onboarding_sections.contains(sid),
      total_lectures: lectures_by_section.get(sid).copied().unwrap_or(0),
      watched_lectures: watched_by_section.get(sid).map_or(0, HashSet::len),
      exercises: section_exercises,
      total_exercise_questions,
      answered_exercise_questions,
      total_quiz_questions: static_set.map_or(0, HashSet::len),
      answered_static_quiz_questions: answered_static,
      basic_quiz_attempted,
      adaptive_question_target,
      answered_adaptive_questions,
    };
    let summary = requirement::evaluate(&evidence);
    reports.push(SectionReport { evidence, summary });
  }

  // Session history: most recent finished sessions per section.
  let mut history = Vec::new();
  for meta in &sections {
    let mut finished: Vec<&&AdaptiveSessionRow> = sessions_by_section
      .get(meta.id.as_str())
      .into_iter()
      .flatten()
      .filter(|s| s.status.is_finished())
      .collect();
    finished.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    for session in finished.into_iter().take(HISTORY_LIMIT) {
      let responses = responses_by_session
        .get(session.id.as_str())
        .into_iter()
        .flatten()
        .map(|r| AdaptiveResponseSummary {
          is_correct:  r.is_correct,
          user_answer: r.user_answer.clone(),
        })
        .collect();
      history.push(AdaptiveSessionSummary {
        session_id:              session.id.clone(),
        section_id:              session.section_id.clone(),
        status:                  session.status.as_str(),
        current_question_number: session.current_question_number,
        updated_at:              session.updated_at,
        responses,
      });
    }
  }

  Ok(SectionStatusBatch { reports, history })
}
