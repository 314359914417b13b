use super::error::WalletError;
use super::notification::Notification;

/// Delivery capability provided by the platform's notification
/// subsystem. Fire-and-forget from the settlement core's perspective;
/// retries are the subsystem's concern.
pub trait NotificationSink {
    fn deliver(&self, notification: &Notification);
}

/// Sink for operations that could not be applied during a replay.
pub trait DeadLetterQueue {
    fn report(&self, error: &WalletError);
}
