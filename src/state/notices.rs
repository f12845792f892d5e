//! User-facing notices (load/save failures, timer notifications)

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Oldest notices are dropped past this many
pub const MAX_NOTICES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Info,
    Warning,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: DateTime<Utc>,
}

/// Bounded, most-recent-first list of notices
#[derive(Debug, Clone, Default)]
pub struct Notices {
    entries: VecDeque<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, level: NoticeLevel, message: String) {
        self.entries.push_front(Notice {
            level,
            message,
            at: Utc::now(),
        });
        self.entries.truncate(MAX_NOTICES);
    }

    pub fn list(&self) -> Vec<Notice> {
        self.entries.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_newest_first_and_bounded() {
        let mut notices = Notices::new();
        for i in 0..(MAX_NOTICES + 5) {
            notices.push(NoticeLevel::Info, format!("notice {}", i));
        }
        let list = notices.list();
        assert_eq!(list.len(), MAX_NOTICES);
        assert_eq!(list[0].message, format!("notice {}", MAX_NOTICES + 4));
        assert_eq!(list[MAX_NOTICES - 1].message, "notice 5");
    }
}
