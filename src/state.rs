use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::error::StudioError;
use crate::studio::model::{ReferenceSlot, StudioState};

#[derive(Debug, Default)]
struct Session {
    state: StudioState,
    generated_image: Option<String>,
    // Bumped whenever the whole state is replaced.
    epoch: u64,
}

/// Owns the session's [`StudioState`] and the in-flight flags that keep
/// generation and per-slot description requests from overlapping.
#[derive(Clone, Default)]
pub struct StudioStore {
    session: Arc<Mutex<Session>>,
    generating: Arc<AtomicBool>,
    describing: Arc<Mutex<HashSet<ReferenceSlot>>>,
}

/// Held while a generate-JSON or render request runs.
#[must_use]
pub struct GenerationGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for GenerationGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Held while a description request for one slot runs.
#[must_use]
pub struct DescribeGuard {
    slots: Arc<Mutex<HashSet<ReferenceSlot>>>,
    slot: ReferenceSlot,
}

impl Drop for DescribeGuard {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.slot);
    }
}

impl StudioStore {
    pub fn new(state: StudioState) -> Self {
        StudioStore {
            session: Arc::new(Mutex::new(Session {
                state,
                ..Session::default()
            })),
            ..StudioStore::default()
        }
    }

    pub fn get(&self) -> StudioState {
        self.session.lock().state.clone()
    }

    /// Replaces the whole state. Requests started before this call can no
    /// longer write their results back.
    pub fn set(&self, state: StudioState) {
        let mut session = self.session.lock();
        session.state = state;
        session.epoch += 1;
    }

    pub fn epoch(&self) -> u64 {
        self.session.lock().epoch
    }

    /// Replaces the state with `f(current)` in one critical section.
    pub fn update<F>(&self, f: F) -> StudioState
    where
        F: FnOnce(&StudioState) -> StudioState,
    {
        let mut session = self.session.lock();
        session.state = f(&session.state);
        session.state.clone()
    }

    /// Like [`StudioStore::update`], but only while the state has not been
    /// replaced since `epoch` was read.
    pub fn update_in_epoch<F>(&self, epoch: u64, f: F) -> Option<StudioState>
    where
        F: FnOnce(&StudioState) -> StudioState,
    {
        let mut session = self.session.lock();
        if session.epoch != epoch {
            return None;
        }
        session.state = f(&session.state);
        Some(session.state.clone())
    }

    pub fn generated_image(&self) -> Option<String> {
        self.session.lock().generated_image.clone()
    }

    pub fn set_generated_image(&self, image: Option<String>) {
        self.session.lock().generated_image = image;
    }

    pub fn set_generated_image_in_epoch(&self, epoch: u64, image: Option<String>) -> bool {
        let mut session = self.session.lock();
        if session.epoch != epoch {
            return false;
        }
        session.generated_image = image;
        true
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Acquire)
    }

    pub fn try_begin_generation(&self) -> Result<GenerationGuard, StudioError> {
        self.generating
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| StudioError::Busy("Generation"))?;
        Ok(GenerationGuard {
            flag: self.generating.clone(),
        })
    }

    pub fn try_begin_describe(&self, slot: ReferenceSlot) -> Result<DescribeGuard, StudioError> {
        if !self.describing.lock().insert(slot) {
            return Err(StudioError::Busy(match slot {
                ReferenceSlot::Reference => "Reference image description",
                ReferenceSlot::Character => "Character image description",
            }));
        }
        Ok(DescribeGuard {
            slots: self.describing.clone(),
            slot,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::studio::model::CharacterField;

    #[test]
    fn set_replaces_and_get_returns_copies() {
        let store = StudioStore::default();
        let edited = store.get().with_dna_field(CharacterField::Face, "sardas");
        assert_eq!(store.get().character_dna.face, "");
        store.set(edited);
        assert_eq!(store.get().character_dna.face, "sardas");
    }

    #[test]
    fn writes_from_a_replaced_session_are_dropped() {
        let store = StudioStore::default();
        let epoch = store.epoch();
        assert!(store
            .update_in_epoch(epoch, |state| state.with_dna_field(CharacterField::Eyes, "verdes"))
            .is_some());

        store.set(StudioState::default());
        assert_ne!(store.epoch(), epoch);
        assert!(store
            .update_in_epoch(epoch, |state| state.with_dna_field(CharacterField::Eyes, "azuis"))
            .is_none());
        assert!(!store.set_generated_image_in_epoch(epoch, Some("data:image/png;base64,AA==".to_string())));
        assert_eq!(store.get(), StudioState::default());
        assert_eq!(store.generated_image(), None);
    }

    #[test]
    fn second_generation_is_rejected_until_guard_drops() {
        let store = StudioStore::default();
        let guard = store.try_begin_generation().unwrap();
        assert!(store.is_generating());
        assert!(matches!(
            store.try_begin_generation(),
            Err(StudioError::Busy(_))
        ));
        drop(guard);
        assert!(!store.is_generating());
        assert!(store.try_begin_generation().is_ok());
    }

    #[test]
    fn describe_guards_are_per_slot() {
        let store = StudioStore::default();
        let reference = store.try_begin_describe(ReferenceSlot::Reference).unwrap();
        assert!(store.try_begin_describe(ReferenceSlot::Reference).is_err());
        let _character = store.try_begin_describe(ReferenceSlot::Character).unwrap();
        assert!(store.try_begin_generation().is_ok());
        drop(reference);
        assert!(store.try_begin_describe(ReferenceSlot::Reference).is_ok());
    }
}
