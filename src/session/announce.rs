//! The announcement overlay: one visible announcement at a time.
//!
//! A new announcement replaces whatever is visible and restarts the
//! auto-hide clock. Like the presence machine, the board itself holds no
//! timer — it hands the coordinator the delay to arm, so the logic tests
//! without a runtime.

use crate::config::AnnounceConfig;
use crate::session::events::Announcement;
use std::time::Duration;

/// Holds the currently visible announcement, if any.
#[derive(Debug)]
pub struct AnnouncementBoard {
    auto_hide: Duration,
    visible: Option<Announcement>,
}

impl AnnouncementBoard {
    /// Create an empty board.
    #[must_use]
    pub fn new(config: &AnnounceConfig) -> Self {
        Self {
            auto_hide: Duration::from_millis(config.auto_hide_ms),
            visible: None,
        }
    }

    /// Show an announcement, replacing any visible one immediately.
    ///
    /// Returns the auto-hide delay the caller must (re-)arm.
    #[must_use]
    pub fn show(&mut self, announcement: Announcement) -> Duration {
        self.visible = Some(announcement);
        self.auto_hide
    }

    /// Hide the visible announcement (auto-hide fired, or the user
    /// dismissed it). Returns `true` if something was actually hidden.
    pub fn hide(&mut self) -> bool {
        self.visible.take().is_some()
    }

    /// The currently visible announcement.
    #[must_use]
    pub fn visible(&self) -> Option<&Announcement> {
        self.visible.as_ref()
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn announcement(text: &str) -> Announcement {
        Announcement {
            headline: Some("Notice".to_owned()),
            text: Some(text.to_owned()),
            link: None,
            link_text: None,
        }
    }

    #[test]
    fn show_replaces_and_returns_delay() {
        let mut board = AnnouncementBoard::new(&AnnounceConfig::default());

        let delay = board.show(announcement("first"));
        assert_eq!(delay, Duration::from_millis(6_000));

        let _ = board.show(announcement("second"));
        assert_eq!(
            board.visible().unwrap().text.as_deref(),
            Some("second")
        );
    }

    #[test]
    fn hide_is_idempotent() {
        let mut board = AnnouncementBoard::new(&AnnounceConfig::default());
        let _ = board.show(announcement("notice"));

        assert!(board.hide());
        assert!(!board.hide());
        assert!(board.visible().is_none());
    }
}
