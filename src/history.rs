// src/history.rs
//
// Melody history for display (piano roll / notation).

use std::collections::VecDeque;

use crate::decoder::Pitch;

/// Past decoded notes, oldest first. `None` entries are rests.
#[derive(Debug, Clone, Default)]
pub struct MelodyHistory {
    notes: VecDeque<Option<Pitch>>,

    /// Maximum retained notes; `None` keeps everything.
    capacity: Option<usize>,
}

impl MelodyHistory {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            // Grows on demand; the bound may come from an untrusted document.
            notes: VecDeque::new(),
            capacity,
        }
    }

    /// Append a note, dropping the oldest once full.
    pub fn push(&mut self, note: Option<Pitch>) {
        if let Some(capacity) = self.capacity {
            if capacity == 0 {
                return;
            }
            while self.notes.len() >= capacity {
                self.notes.pop_front();
            }
        }
        self.notes.push_back(note);
    }

    pub fn clear(&mut self) {
        self.notes.clear();
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn last(&self) -> Option<Option<Pitch>> {
        self.notes.back().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Pitch>> + '_ {
        self.notes.iter().copied()
    }

    pub fn to_vec(&self) -> Vec<Option<Pitch>> {
        self.iter().collect()
    }
}
