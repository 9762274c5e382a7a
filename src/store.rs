//! Index-keyed store for transformed frames.
//!
//! Workers insert under a mutex held only for the insert itself; the
//! assembler reads the store once all workers have exited and restores
//! decode order.

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

use crate::error::CompareError;
use crate::frame::Frame;

/// Shared mapping from frame index to transformed frame.
#[derive(Debug, Default)]
pub struct ResultStore {
    frames: Mutex<BTreeMap<u64, Frame>>,
}

impl ResultStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the transformed frame for `index`.
    ///
    /// # Errors
    ///
    /// [`CompareError::DuplicateFrame`] if `index` was already stored.
    pub fn insert(&self, index: u64, frame: Frame) -> Result<(), CompareError> {
        let previous = self
            .frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(index, frame);
        match previous {
            Some(_) => Err(CompareError::DuplicateFrame { index }),
            None => Ok(()),
        }
    }

    /// Number of stored frames.
    pub fn len(&self) -> usize {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the store and return frames `0..expected` in index order.
    ///
    /// # Errors
    ///
    /// [`CompareError::SynchronizationInvariant`] naming the first index
    /// that is absent, or `expected` itself if the store holds extra keys.
    pub fn into_ordered(self, expected: u64) -> Result<Vec<Frame>, CompareError> {
        let frames = self
            .frames
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner);

        let mut ordered = Vec::with_capacity(frames.len());
        for (position, (index, frame)) in frames.into_iter().enumerate() {
            let position = position as u64;
            if index != position || position >= expected {
                return Err(CompareError::SynchronizationInvariant {
                    missing: position,
                    expected,
                });
            }
            ordered.push(frame);
        }

        if (ordered.len() as u64) < expected {
            return Err(CompareError::SynchronizationInvariant {
                missing: ordered.len() as u64,
                expected,
            });
        }

        Ok(ordered)
    }
}
