mod notification;

pub use notification::{
    NewNotification, Notification, NotificationPreferences, NotificationPriority, NotificationType,
};
