//! Read-only grouping of timers by category

use serde::Serialize;

use super::timer::{Timer, TimerCategory};

/// Timers sharing one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub name: TimerCategory,
    pub timers: Vec<Timer>,
}

/// Group timers by category, one group per category present, in first-seen order
pub fn group(timers: &[Timer]) -> Vec<Category> {
    let mut groups: Vec<Category> = Vec::new();
    for timer in timers {
        match groups.iter_mut().find(|group| group.name == timer.category) {
            Some(group) => group.timers.push(timer.clone()),
            None => groups.push(Category {
                name: timer.category,
                timers: vec![timer.clone()],
            }),
        }
    }
    groups
}
