//! Reading progress state machine.
//!
//! A progress record keeps two page counters as its source of truth. The
//! status and percentage are derived from them on every write and cached
//! alongside, so they can never disagree with the counters.

use crate::db::{Database, ReadingProgress};
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where a reader is with a book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadingStatus {
    /// No page read yet.
    #[default]
    #[serde(rename = "Not started")]
    NotStarted,
    /// Somewhere in the middle.
    #[serde(rename = "Started")]
    Started,
    /// Reached the last page.
    #[serde(rename = "Finished")]
    Finished,
}

impl ReadingStatus {
    /// Stored and wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReadingStatus::NotStarted => "Not started",
            ReadingStatus::Started => "Started",
            ReadingStatus::Finished => "Finished",
        }
    }
}

impl fmt::Display for ReadingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReadingStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Not started" => Ok(ReadingStatus::NotStarted),
            "Started" => Ok(ReadingStatus::Started),
            "Finished" => Ok(ReadingStatus::Finished),
            other => Err(AppError::Validation(format!(
                "Unknown reading status: {}",
                other
            ))),
        }
    }
}

/// Page counters plus their derived status and percentage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProgressState {
    /// Derived reading status.
    pub status: ReadingStatus,
    /// Derived completion percentage (0-100).
    pub progress: u8,
    /// Last page read.
    pub current_page: i64,
    /// Page count of the book, 0 when unknown.
    pub total_pages: i64,
}

/// A page update. Absent fields keep their current value.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct PageUpdate {
    /// New current page.
    pub current_page: Option<i64>,
    /// New total page count.
    pub total_pages: Option<i64>,
}

impl ProgressState {
    /// Fresh record: not started, nothing read, page count unknown.
    pub fn new() -> Self {
        Self::default()
    }

    /// Derive the full state from a pair of page counters.
    pub fn from_pages(current_page: i64, total_pages: i64) -> Result<Self> {
        if total_pages < 0 {
            return Err(AppError::Validation(
                "Total pages cannot be negative".to_string(),
            ));
        }
        if current_page < 0 {
            return Err(AppError::Validation(
                "Current page cannot be negative".to_string(),
            ));
        }
        if total_pages > 0 && current_page > total_pages {
            return Err(AppError::Validation(
                "Current page cannot be greater than total pages".to_string(),
            ));
        }

        let status = if current_page == 0 {
            ReadingStatus::NotStarted
        } else if total_pages > 0 && current_page >= total_pages {
            ReadingStatus::Finished
        } else {
            ReadingStatus::Started
        };

        let progress = if total_pages == 0 {
            0
        } else {
            // Widened so huge counters cannot overflow; quotient is at most 100
            (i128::from(current_page) * 100 / i128::from(total_pages)).min(100) as u8
        };

        Ok(Self {
            status,
            progress,
            current_page,
            total_pages,
        })
    }

    /// Apply an update, producing the next state. `self` is left untouched
    /// when the update is rejected.
    pub fn apply(&self, update: PageUpdate) -> Result<Self> {
        Self::from_pages(
            update.current_page.unwrap_or(self.current_page),
            update.total_pages.unwrap_or(self.total_pages),
        )
    }
}

/// Put a book on a user's list at `NotStarted`.
pub fn add(db: &Database, user_id: i64, book_id: i64) -> Result<ReadingProgress> {
    if db.get_book(book_id)?.is_none() {
        return Err(AppError::NotFound("Book not found".to_string()));
    }

    let record = db.create_progress(user_id, book_id, &ProgressState::new())?;
    tracing::info!(user_id, book_id, "Book added to reading list");
    Ok(record)
}

/// Apply a page update to an existing record.
pub fn update(
    db: &Database,
    user_id: i64,
    book_id: i64,
    update: PageUpdate,
) -> Result<ReadingProgress> {
    let current = db
        .get_progress(user_id, book_id)?
        .ok_or_else(|| AppError::NotFound("Book not in user's list".to_string()))?;

    let next = current.state.apply(update)?;

    let record = db
        .update_progress(user_id, book_id, &next)?
        .ok_or_else(|| AppError::NotFound("Book not in user's list".to_string()))?;

    tracing::debug!(
        user_id,
        book_id,
        status = %next.status,
        progress = next.progress,
        "Reading progress updated"
    );
    Ok(record)
}

/// Take a book off a user's list.
pub fn remove(db: &Database, user_id: i64, book_id: i64) -> Result<()> {
    if !db.delete_progress(user_id, book_id)? {
        return Err(AppError::NotFound("Book not in user's list".to_string()));
    }

    tracing::info!(user_id, book_id, "Book removed from reading list");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pages(current: i64, total: i64) -> PageUpdate {
        PageUpdate {
            current_page: Some(current),
            total_pages: Some(total),
        }
    }

    #[test]
    fn new_record_is_not_started() {
        let state = ProgressState::new();
        assert_eq!(state.status, ReadingStatus::NotStarted);
        assert_eq!(state.progress, 0);
        assert_eq!(state.current_page, 0);
        assert_eq!(state.total_pages, 0);
    }

    #[test]
    fn add_then_read_halfway_then_finish() {
        let state = ProgressState::new();

        let state = state.apply(pages(50, 100)).unwrap();
        assert_eq!(state.status, ReadingStatus::Started);
        assert_eq!(state.progress, 50);

        let state = state
            .apply(PageUpdate {
                current_page: Some(100),
                total_pages: None,
            })
            .unwrap();
        assert_eq!(state.status, ReadingStatus::Finished);
        assert_eq!(state.progress, 100);
        assert_eq!(state.total_pages, 100);
    }

    #[test]
    fn page_zero_resets_to_not_started() {
        let finished = ProgressState::from_pages(300, 300).unwrap();
        let reset = finished
            .apply(PageUpdate {
                current_page: Some(0),
                total_pages: None,
            })
            .unwrap();
        assert_eq!(reset.status, ReadingStatus::NotStarted);
        assert_eq!(reset.progress, 0);
    }

    #[test]
    fn last_page_is_finished() {
        for total in [1, 7, 100, 999] {
            let state = ProgressState::from_pages(total, total).unwrap();
            assert_eq!(state.status, ReadingStatus::Finished);
            assert_eq!(state.progress, 100);
        }
    }

    #[test]
    fn huge_page_counts_do_not_overflow() {
        let state = ProgressState::from_pages(100_000_000_000_000_000, 100_000_000_000_000_000)
            .unwrap();
        assert_eq!(state.status, ReadingStatus::Finished);
        assert_eq!(state.progress, 100);

        let state = ProgressState::from_pages(i64::MAX / 2, i64::MAX).unwrap();
        assert_eq!(state.status, ReadingStatus::Started);
        assert_eq!(state.progress, 49);

        let state = ProgressState::from_pages(i64::MAX, i64::MAX).unwrap();
        assert_eq!(state.progress, 100);
    }

    #[test]
    fn progress_is_floored() {
        assert_eq!(ProgressState::from_pages(1, 3).unwrap().progress, 33);
        assert_eq!(ProgressState::from_pages(2, 3).unwrap().progress, 66);
        assert_eq!(ProgressState::from_pages(199, 200).unwrap().progress, 99);
    }

    #[test]
    fn unknown_total_keeps_progress_at_zero() {
        let state = ProgressState::from_pages(42, 0).unwrap();
        assert_eq!(state.status, ReadingStatus::Started);
        assert_eq!(state.progress, 0);
    }

    #[test]
    fn rejects_negative_and_overflowing_pages() {
        let state = ProgressState::from_pages(10, 100).unwrap();

        assert!(matches!(
            state.apply(pages(5, -1)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            state.apply(pages(-1, 100)),
            Err(AppError::Validation(_))
        ));
        assert!(matches!(
            state.apply(pages(101, 100)),
            Err(AppError::Validation(_))
        ));
        assert_eq!(state, ProgressState::from_pages(10, 100).unwrap());
    }

    #[test]
    fn negative_total_checked_before_current() {
        let err = ProgressState::from_pages(-5, -5).unwrap_err();
        assert_eq!(err.to_string(), "Total pages cannot be negative");
    }

    #[test]
    fn status_round_trips_through_storage_form() {
        for status in [
            ReadingStatus::NotStarted,
            ReadingStatus::Started,
            ReadingStatus::Finished,
        ] {
            assert_eq!(status.as_str().parse::<ReadingStatus>().unwrap(), status);
        }
        assert!("reading".parse::<ReadingStatus>().is_err());
    }

    #[test]
    fn status_serializes_as_display_string() {
        let json = serde_json::to_string(&ReadingStatus::NotStarted).unwrap();
        assert_eq!(json, "\"Not started\"");
    }
}
