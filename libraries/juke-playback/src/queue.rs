//! Playlist queue: ordered upcoming sessions plus the coming-up slot
//!
//! The coming-up session is never also an entry of the sequence. Sessions are
//! owned values, so each one lives in exactly one place; moving it between
//! the slot and the sequence is a move, never a copy.

use crate::session::PlaybackSession;
use juke_core::{Item, PlayState, SessionId};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::debug;

/// Ordered sequence of upcoming sessions plus the coming-up slot
#[derive(Debug, Default)]
pub struct PlaylistQueue {
    coming_up: Option<PlaybackSession>,
    entries: VecDeque<PlaybackSession>,
}

impl PlaylistQueue {
    pub fn new() -> Self {
        Self::default()
    }

    // ===== Coming-up slot =====

    pub fn coming_up(&self) -> Option<&PlaybackSession> {
        self.coming_up.as_ref()
    }

    pub fn coming_up_mut(&mut self) -> Option<&mut PlaybackSession> {
        self.coming_up.as_mut()
    }

    /// Put `session` into the slot, preparing it if it is still closed
    fn assign_coming_up(&mut self, mut session: PlaybackSession) {
        if session.state() == PlayState::Closed {
            session.prepare();
        }
        self.coming_up = Some(session);
    }

    /// Replace the coming-up session
    ///
    /// The previous coming-up session is closed and becomes the first entry of
    /// the sequence, so it can be played again later.
    pub fn push_coming_up(&mut self, session: PlaybackSession) {
        if let Some(mut previous) = self.coming_up.take() {
            previous.close();
            self.entries.push_front(previous);
        }
        self.assign_coming_up(session);
    }

    /// Replace the coming-up session without requeueing the previous one
    ///
    /// The previous occupant is returned to the caller, closed unless
    /// `close_previous` is false.
    pub fn replace_coming_up(
        &mut self,
        session: Option<PlaybackSession>,
        close_previous: bool,
    ) -> Option<PlaybackSession> {
        let mut previous = self.coming_up.take();
        if close_previous {
            if let Some(previous) = previous.as_mut() {
                previous.close();
            }
        }
        if let Some(session) = session {
            self.assign_coming_up(session);
        }
        previous
    }

    /// Remove the coming-up session (to promote it to now-playing)
    pub fn take_coming_up(&mut self) -> Option<PlaybackSession> {
        self.coming_up.take()
    }

    /// Same as [`push_coming_up`](Self::push_coming_up)
    pub fn quickplay(&mut self, session: PlaybackSession) {
        self.push_coming_up(session);
    }

    // ===== Sequence =====

    /// Remove and return the first queued session
    pub fn take_next(&mut self) -> Option<PlaybackSession> {
        self.entries.pop_front()
    }

    pub fn enqueue(&mut self, session: PlaybackSession) {
        self.entries.push_back(session);
    }

    /// Insert at `index`, or append if `index` is past the end
    pub fn insert(&mut self, index: usize, session: PlaybackSession) {
        let index = index.min(self.entries.len());
        self.entries.insert(index, session);
    }

    pub fn position(&self, id: SessionId) -> Option<usize> {
        self.entries.iter().position(|s| s.id() == id)
    }

    /// Move an entry one step towards the front
    ///
    /// The first entry moves into the coming-up slot; the previous coming-up
    /// session is closed and becomes the first entry.
    pub fn move_up(&mut self, id: SessionId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        if index == 0 {
            let Some(session) = self.entries.pop_front() else {
                return false;
            };
            debug!("Promoting {} to coming up", session.item());
            self.push_coming_up(session);
        } else {
            self.entries.swap(index - 1, index);
        }
        true
    }

    /// Move an entry one step towards the back; the last entry wraps to the head
    pub fn move_down(&mut self, id: SessionId) -> bool {
        let Some(index) = self.position(id) else {
            return false;
        };

        if index + 1 == self.entries.len() {
            if let Some(session) = self.entries.pop_back() {
                self.entries.push_front(session);
            }
        } else {
            self.entries.swap(index, index + 1);
        }
        true
    }

    /// Remove a queued entry and close it
    pub fn remove(&mut self, id: SessionId) -> Option<PlaybackSession> {
        let index = self.position(id)?;
        let mut session = self.entries.remove(index)?;
        session.close();
        Some(session)
    }

    /// Close and drop every queued entry; the coming-up slot is kept
    ///
    /// Returns the number of removed entries.
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        for mut session in self.entries.drain(..) {
            session.close();
        }
        removed
    }

    /// Close everything, coming-up included
    pub fn close_all(&mut self) {
        if let Some(mut session) = self.coming_up.take() {
            session.close();
        }
        self.clear();
    }

    // ===== Queries =====

    pub fn entries(&self) -> impl Iterator<Item = &PlaybackSession> {
        self.entries.iter()
    }

    /// Snapshot of the queued items, in order
    pub fn items(&self) -> Vec<Item> {
        self.entries.iter().map(|s| s.item().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether the slot or the sequence holds `id`
    pub fn contains(&self, id: SessionId) -> bool {
        self.coming_up.as_ref().is_some_and(|s| s.id() == id) || self.position(id).is_some()
    }

    /// Sum of the known lengths of the queued entries
    pub fn total_length(&self) -> Duration {
        self.entries.iter().filter_map(PlaybackSession::length).sum()
    }

    /// Summary like "3 items (0:09:12)"
    pub fn length_text(&self) -> String {
        let secs = self.total_length().as_secs();
        let noun = if self.len() == 1 { "item" } else { "items" };
        format!(
            "{} {} ({}:{:02}:{:02})",
            self.len(),
            noun,
            secs / 3600,
            (secs / 60) % 60,
            secs % 60
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{Harness, ResourceCall};

    fn titles(queue: &PlaylistQueue) -> Vec<String> {
        queue.entries().map(|s| s.item().title.clone()).collect()
    }

    fn coming_up_title(queue: &PlaylistQueue) -> Option<String> {
        queue.coming_up().map(|s| s.item().title.clone())
    }

    #[test]
    fn test_push_coming_up_requeues_previous_at_front() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.enqueue(harness.session("C"));
        queue.push_coming_up(harness.session("A"));
        queue.push_coming_up(harness.session("B"));

        assert_eq!(coming_up_title(&queue).as_deref(), Some("B"));
        assert_eq!(titles(&queue), vec!["A", "C"]);
        // Previous coming-up was closed before requeueing
        assert_eq!(queue.entries().next().unwrap().state(), PlayState::Closed);
        assert_eq!(harness.log.count("A", ResourceCall::Close), 1);
    }

    #[test]
    fn test_coming_up_is_prepared() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));

        assert_eq!(harness.log.count("A", ResourceCall::Load), 1);
        assert!(queue.coming_up().unwrap().is_open());
    }

    #[test]
    fn test_queued_entries_stay_closed() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.enqueue(harness.session("A"));

        assert_eq!(harness.log.count("A", ResourceCall::Load), 0);
    }

    #[test]
    fn test_replace_coming_up_discards_previous() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));

        let previous = queue.replace_coming_up(Some(harness.session("B")), true);

        assert_eq!(previous.unwrap().state(), PlayState::Closed);
        assert!(queue.is_empty());
        assert_eq!(coming_up_title(&queue).as_deref(), Some("B"));
    }

    #[test]
    fn test_replace_coming_up_without_close() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));

        let previous = queue.replace_coming_up(None, false).unwrap();
        assert!(previous.is_open());
        assert!(queue.coming_up().is_none());
    }

    #[test]
    fn test_take_next_leaves_coming_up() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));
        queue.enqueue(harness.session("B"));

        assert_eq!(queue.take_next().unwrap().item().title, "B");
        assert!(queue.take_next().is_none());
        assert_eq!(coming_up_title(&queue).as_deref(), Some("A"));
    }

    #[test]
    fn test_move_up_first_swaps_with_coming_up() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));
        let b = harness.session("B");
        let b_id = b.id();
        queue.enqueue(b);
        queue.enqueue(harness.session("C"));

        assert!(queue.move_up(b_id));

        assert_eq!(coming_up_title(&queue).as_deref(), Some("B"));
        assert_eq!(titles(&queue), vec!["A", "C"]);
    }

    #[test]
    fn test_move_up_first_without_coming_up() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        let a = harness.session("A");
        let a_id = a.id();
        queue.enqueue(a);

        assert!(queue.move_up(a_id));
        assert_eq!(coming_up_title(&queue).as_deref(), Some("A"));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_move_up_swaps_adjacent() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.enqueue(harness.session("X"));
        let y = harness.session("Y");
        let y_id = y.id();
        queue.enqueue(y);

        assert!(queue.move_up(y_id));
        assert_eq!(titles(&queue), vec!["Y", "X"]);
        assert!(queue.coming_up().is_none());
    }

    #[test]
    fn test_move_down_last_wraps_to_head() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.enqueue(harness.session("X"));
        queue.enqueue(harness.session("Y"));
        let z = harness.session("Z");
        let z_id = z.id();
        queue.enqueue(z);

        assert!(queue.move_down(z_id));
        assert_eq!(titles(&queue), vec!["Z", "X", "Y"]);
    }

    #[test]
    fn test_move_down_swaps_adjacent() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        let x = harness.session("X");
        let x_id = x.id();
        queue.enqueue(x);
        queue.enqueue(harness.session("Y"));
        queue.enqueue(harness.session("Z"));

        assert!(queue.move_down(x_id));
        assert_eq!(titles(&queue), vec!["Y", "X", "Z"]);
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        let stranger = harness.session("S");

        assert!(!queue.move_up(stranger.id()));
        assert!(!queue.move_down(stranger.id()));
        assert!(queue.remove(stranger.id()).is_none());
    }

    #[test]
    fn test_insert_clamps_index() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.enqueue(harness.session("A"));
        queue.insert(10, harness.session("B"));
        queue.insert(0, harness.session("C"));

        assert_eq!(titles(&queue), vec!["C", "A", "B"]);
    }

    #[test]
    fn test_clear_keeps_coming_up() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        queue.push_coming_up(harness.session("A"));
        queue.enqueue(harness.session("B"));
        queue.enqueue(harness.session("C"));

        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
        assert!(queue.coming_up().is_some());
    }

    #[test]
    fn test_length_text() {
        let harness = Harness::new();
        let mut queue = PlaylistQueue::new();
        assert_eq!(queue.length_text(), "0 items (0:00:00)");

        let item = crate::test_support::item("Long").with_duration(Duration::from_secs(3725));
        queue.enqueue(harness.session_for(item));
        assert_eq!(queue.length_text(), "1 item (1:02:05)");
    }
}
