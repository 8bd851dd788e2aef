use chrono::{DateTime, Local};
use uuid::Uuid;

use super::upload::{BatchOutcome, UploadedImage};

/// One browsing session: the uploaded images and where the user is in them.
/// Created when the viewer opens, replaced by `reset`.
#[derive(Debug)]
pub struct ViewerSession {
    token: String,
    user_id: String,
    created: DateTime<Local>,
    images: Vec<UploadedImage>,
    current: usize,
}

impl ViewerSession {
    pub fn new() -> Self {
        let user_id = Uuid::new_v4().simple().to_string()[..16].to_string();
        Self {
            token: Uuid::new_v4().simple().to_string(),
            user_id,
            created: Local::now(),
            images: Vec::new(),
            current: 0,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn created(&self) -> DateTime<Local> {
        self.created
    }

    /// Replace the images with an accepted batch. A batch with nothing
    /// accepted leaves the session untouched. Returns the count loaded.
    pub fn load_batch(&mut self, outcome: BatchOutcome) -> usize {
        if outcome.accepted.is_empty() {
            return 0;
        }
        self.images = outcome.accepted;
        self.current = 0;
        log::info!("Session {}: loaded {} images", &self.token[..8], self.images.len());
        self.images.len()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&UploadedImage> {
        self.images.get(self.current)
    }

    /// 1-based (position, total) for display.
    pub fn position(&self) -> Option<(usize, usize)> {
        (!self.images.is_empty()).then(|| (self.current + 1, self.images.len()))
    }

    pub fn next(&mut self) -> bool {
        if self.current + 1 < self.images.len() {
            self.current += 1;
            true
        } else {
            false
        }
    }

    pub fn previous(&mut self) -> bool {
        if self.current > 0 {
            self.current -= 1;
            true
        } else {
            false
        }
    }

    pub fn first(&mut self) {
        self.current = 0;
    }

    pub fn last(&mut self) {
        self.current = self.images.len().saturating_sub(1);
    }

    /// Jump to `index`, clamped to the loaded range.
    pub fn seek(&mut self, index: usize) {
        self.current = index.min(self.images.len().saturating_sub(1));
    }

    /// Drop all images and start over under a fresh token.
    pub fn reset(&mut self) {
        self.images.clear();
        self.current = 0;
        self.token = Uuid::new_v4().simple().to_string();
        self.created = Local::now();
        log::info!("New viewer session {}", &self.token[..8]);
    }
}

impl Default for ViewerSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded(n: usize) -> ViewerSession {
        let mut session = ViewerSession::new();
        let accepted = (0..n).map(|i| UploadedImage::new(format!("{}.png", i), vec![i as u8])).collect();
        session.load_batch(BatchOutcome { accepted, rejected: Vec::new() });
        session
    }

    #[test]
    fn test_navigation_clamps_at_both_ends() {
        let mut session = loaded(3);
        assert_eq!(session.position(), Some((1, 3)));
        assert!(!session.previous());
        assert!(session.next());
        assert!(session.next());
        assert!(!session.next());
        assert_eq!(session.current().unwrap().name, "2.png");

        session.first();
        assert_eq!(session.current_index(), 0);
        session.last();
        assert_eq!(session.current_index(), 2);
        session.seek(99);
        assert_eq!(session.current_index(), 2);
        session.seek(1);
        assert_eq!(session.position(), Some((2, 3)));
    }

    #[test]
    fn test_empty_batch_keeps_previous_images() {
        let mut session = loaded(2);
        session.next();
        assert_eq!(session.load_batch(BatchOutcome::default()), 0);
        assert_eq!(session.len(), 2);
        assert_eq!(session.current_index(), 1);
    }

    #[test]
    fn test_new_batch_resets_position() {
        let mut session = loaded(4);
        session.last();
        let accepted = vec![UploadedImage::new("x.gif", vec![0])];
        session.load_batch(BatchOutcome { accepted, rejected: Vec::new() });
        assert_eq!(session.position(), Some((1, 1)));
    }

    #[test]
    fn test_reset_issues_new_token() {
        let mut session = loaded(2);
        let old = session.token().to_string();
        session.reset();
        assert_ne!(session.token(), old);
        assert!(session.is_empty());
        assert_eq!(session.position(), None);
        assert!(session.current().is_none());
    }

    #[test]
    fn test_navigation_on_empty_session() {
        let mut session = ViewerSession::new();
        assert!(!session.next());
        assert!(!session.previous());
        session.last();
        session.seek(5);
        assert_eq!(session.current_index(), 0);
        assert_eq!(session.user_id().len(), 16);
        assert_eq!(session.token().len(), 32);
    }
}
