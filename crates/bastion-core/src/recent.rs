use std::{collections::VecDeque, sync::Mutex};

/// How many recently seen activity ids are remembered.
pub const RECENT_CAPACITY: usize = 100;

/// Bounded buffer of recently posted ids, used to suppress double posts when
/// Strava delivers the same webhook more than once.
///
/// The membership check and the insert happen under one lock, so two
/// concurrent deliveries of the same id cannot both win.
#[derive(Debug)]
pub struct RecentIds {
    capacity: usize,
    ids: Mutex<VecDeque<String>>,
}

impl Default for RecentIds {
    fn default() -> Self {
        Self::new(RECENT_CAPACITY)
    }
}

impl RecentIds {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ids: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    /// Record `id`. Returns `false` if it was already within the window.
    pub fn check_and_insert(&self, id: &str) -> bool {
        let mut ids = self.ids.lock().unwrap_or_else(|e| e.into_inner());
        if ids.iter().any(|seen| seen == id) {
            return false;
        }
        if ids.len() == self.capacity {
            ids.pop_front();
        }
        ids.push_back(id.to_string());
        true
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .any(|seen| seen == id)
    }

    pub fn len(&self) -> usize {
        self.ids.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
