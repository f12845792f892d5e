//! Timer notifications and the collaborator that delivers them

use std::fmt;

use serde::Serialize;
use tracing::info;

/// Event raised by the tick reconciler
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notification {
    Completion { timer_name: String },
    Halfway { timer_name: String },
}

impl Notification {
    pub fn timer_name(&self) -> &str {
        match self {
            Notification::Completion { timer_name } | Notification::Halfway { timer_name } => {
                timer_name.as_str()
            }
        }
    }

    pub fn message(&self) -> String {
        match self {
            Notification::Completion { timer_name } => {
                format!("Timer \"{}\" has completed!", timer_name)
            }
            Notification::Halfway { timer_name } => {
                format!("Timer \"{}\" is halfway complete!", timer_name)
            }
        }
    }
}

/// Receives notifications; delivery is best-effort and must not block
pub trait Notifier: Send + Sync + fmt::Debug {
    fn notify(&self, notification: &Notification);
}

/// Notifier that writes each event to the log
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notification: &Notification) {
        info!("{}", notification.message());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_timer() {
        let done = Notification::Completion { timer_name: "Tea".to_string() };
        let half = Notification::Halfway { timer_name: "Tea".to_string() };
        assert_eq!(done.message(), "Timer \"Tea\" has completed!");
        assert_eq!(half.message(), "Timer \"Tea\" is halfway complete!");
        assert_eq!(half.timer_name(), "Tea");
    }

    #[test]
    fn serializes_with_kind_tag() {
        let json = serde_json::to_value(Notification::Halfway { timer_name: "Run".to_string() }).unwrap();
        assert_eq!(json["kind"], "halfway");
        assert_eq!(json["timer_name"], "Run");
    }
}
