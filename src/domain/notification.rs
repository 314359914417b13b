use std::fmt;
use std::sync::Mutex;

use ulid::Ulid;

use super::actor::AccountId;
use super::traits::NotificationSink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    TopUpApproved,
    TopUpRejected,
    TopUpInfoRequested,
    WithdrawalPaid,
    WithdrawalRejected,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::TopUpApproved => "topup_approved",
            NotificationKind::TopUpRejected => "topup_rejected",
            NotificationKind::TopUpInfoRequested => "topup_info_requested",
            NotificationKind::WithdrawalPaid => "withdraw_approved",
            NotificationKind::WithdrawalRejected => "withdraw_rejected",
        }
    }
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Message for the user about a settlement outcome. Delivery is
/// best-effort and happens after the settlement commits; a failed
/// delivery never rolls the settlement back.
#[derive(Debug, Clone)]
pub struct Notification {
    pub user_id: AccountId,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub related_id: Ulid,
}

/// Sink that logs deliveries through `tracing`. Stands in for the
/// platform's notification subsystem in the replay binary.
#[derive(Debug, Default)]
pub struct TracingNotifier;

impl NotificationSink for TracingNotifier {
    fn deliver(&self, notification: &Notification) {
        tracing::info!(
            user_id = notification.user_id,
            kind = %notification.kind,
            related_id = %notification.related_id,
            "notify: {}",
            notification.message
        );
    }
}

/// Sink that records every delivery, for tests and embedding apps that
/// drain notifications themselves.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|g| g.clone()).unwrap_or_default()
    }
}

impl NotificationSink for RecordingNotifier {
    fn deliver(&self, notification: &Notification) {
        if let Ok(mut sent) = self.sent.lock() {
            sent.push(notification.clone());
        }
    }
}
