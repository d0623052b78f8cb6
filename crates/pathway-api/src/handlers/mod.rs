//! Handlers for the learning-path endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/learning-path/me` | Gate-annotated course tree |
//! | `POST` | `/learning-path/progress` | Record activity, recompute module progress |
//! | `POST` | `/learning-path/section-status` | Per-section requirement summaries |

pub mod me;
pub mod progress;
pub mod section_status;
