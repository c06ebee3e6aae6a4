//! Direction change as a two-phase operation
//!
//! A rule's direction cannot be edited in place: the rule is removed and a
//! replacement for the opposite direction is inserted. The two steps are not
//! atomic, so the full rule body is captured before the removal and put back
//! if the insert fails.
//!
//! ```text
//! Pending ──remove──▶ Deleted ──▶ Recreating ──insert ok──▶ Done
//!    │                                 │
//!  remove failed                  insert failed
//!  (nothing changed)                   │
//!                           reinsert original ──ok──▶ RolledBack
//!                                      │
//!                                    failed ──▶ CompensationFailed
//! ```

use crate::core::error::{Error, Result, StoreError};
use crate::core::rule::Rule;
use crate::core::store::RuleStore;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectionChangeState {
    /// Nothing has been touched yet (or the removal failed)
    Pending,
    /// Original removed, replacement not attempted yet
    Deleted,
    /// Replacement insert in flight
    Recreating,
    /// Replacement in place
    Done,
    /// Replacement failed, original restored
    RolledBack,
    /// Replacement failed and the original could not be restored
    CompensationFailed,
}

impl DirectionChangeState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DirectionChangeState::Done
                | DirectionChangeState::RolledBack
                | DirectionChangeState::CompensationFailed
        )
    }
}

#[derive(Debug, Clone)]
pub struct DirectionChange {
    original: Rule,
    replacement: Rule,
    state: DirectionChangeState,
}

impl DirectionChange {
    /// Plans flipping `original` to the opposite direction
    pub fn new(original: Rule) -> Self {
        let replacement = original.flipped();
        Self {
            original,
            replacement,
            state: DirectionChangeState::Pending,
        }
    }

    pub fn state(&self) -> &DirectionChangeState {
        &self.state
    }

    pub fn original(&self) -> &Rule {
        &self.original
    }

    pub fn replacement(&self) -> &Rule {
        &self.replacement
    }

    /// Runs the change against `store` and returns the replacement's name
    ///
    /// # Errors
    ///
    /// - The removal error, with the store untouched (state `Pending`)
    /// - The insert error, with the original restored (state `RolledBack`).
    ///   A different rule already holding the replacement's name is reported
    ///   as [`Error::AlreadyExists`].
    /// - [`Error::PartialFailure`] when the restore failed as well
    ///   (state `CompensationFailed`)
    pub fn run<S: RuleStore + ?Sized>(&mut self, store: &mut S) -> Result<String> {
        if self.state != DirectionChangeState::Pending {
            return Err(Error::Internal(format!(
                "direction change for '{}' already ran (state {:?})",
                self.original.name, self.state
            )));
        }

        store.remove_rule(&self.original.name).map_err(|e| {
            warn!("Direction change: removing '{}' failed: {e}", self.original.name);
            Error::from(e)
        })?;
        self.state = DirectionChangeState::Deleted;
        debug!("Direction change: '{}' removed", self.original.name);

        self.state = DirectionChangeState::Recreating;
        let insert_error = match store.insert_rule(&self.replacement) {
            Ok(()) => return Ok(self.finish()),
            // Done only if the existing rule already blocks what the
            // replacement would (e.g. after "Both"); a different rule under
            // that name must not absorb this one
            Err(StoreError::AlreadyExists(name)) => match store.find_rule(&name) {
                Ok(Some(existing)) if existing.same_filter(&self.replacement) => {
                    return Ok(self.finish());
                }
                Ok(_) => StoreError::AlreadyExists(name),
                Err(e) => e,
            },
            Err(e) => e,
        };

        warn!(
            "Direction change: inserting '{}' failed ({insert_error}), restoring '{}'",
            self.replacement.name, self.original.name
        );
        match store.insert_rule(&self.original) {
            Ok(()) | Err(StoreError::AlreadyExists(_)) => {
                self.state = DirectionChangeState::RolledBack;
                Err(insert_error.into())
            }
            Err(compensation) => {
                self.state = DirectionChangeState::CompensationFailed;
                error!(
                    "Direction change: restoring '{}' failed: {compensation}",
                    self.original.name
                );
                Err(Error::PartialFailure {
                    name: self.original.name.clone(),
                    cause: Box::new(insert_error.into()),
                    compensation: Box::new(compensation.into()),
                })
            }
        }
    }

    fn finish(&mut self) -> String {
        self.state = DirectionChangeState::Done;
        info!(
            "Direction change: '{}' replaced by '{}'",
            self.original.name, self.replacement.name
        );
        self.replacement.name.clone()
    }
}
