use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval_at, Instant};
use uuid::Uuid;

use crate::features::notifications::models::{
    NewNotification, NotificationPriority, NotificationType,
};
use crate::features::notifications::services::NotificationService;
use crate::features::session::SessionRegistry;

struct Template {
    notification_type: NotificationType,
    priority: NotificationPriority,
    title: &'static str,
    message: &'static str,
}

const TEMPLATES: &[Template] = &[
    Template {
        notification_type: NotificationType::FraudWarning,
        priority: NotificationPriority::High,
        title: "Fake KYC update calls",
        message: "Callers posing as bank staff are asking customers to share OTPs for a KYC update. Banks never ask for OTPs.",
    },
    Template {
        notification_type: NotificationType::FraudWarning,
        priority: NotificationPriority::Urgent,
        title: "UPI collect request scam",
        message: "You never need to enter your UPI PIN to receive money. Decline unexpected collect requests.",
    },
    Template {
        notification_type: NotificationType::FraudWarning,
        priority: NotificationPriority::Medium,
        title: "Work-from-home task scams",
        message: "Offers paying for liking videos or rating hotels often end in demands for a deposit.",
    },
    Template {
        notification_type: NotificationType::CommunityAlert,
        priority: NotificationPriority::Medium,
        title: "New reports in your area",
        message: "Several residents reported fake courier parcel calls this week. Check the community board for details.",
    },
    Template {
        notification_type: NotificationType::CommunityAlert,
        priority: NotificationPriority::Low,
        title: "Community tip",
        message: "Verify loan apps on the RBI list of registered lenders before installing them.",
    },
];

/// Demo-mode worker posting synthetic alerts to users with live sessions.
pub struct DemoNotificationGenerator {
    notifications: Arc<NotificationService>,
    sessions: Arc<SessionRegistry>,
    interval: Duration,
}

impl DemoNotificationGenerator {
    pub fn new(
        notifications: Arc<NotificationService>,
        sessions: Arc<SessionRegistry>,
        interval: Duration,
    ) -> Self {
        Self {
            notifications,
            sessions,
            interval,
        }
    }

    fn pick(users: &[Uuid]) -> Option<NewNotification> {
        let mut rng = rand::thread_rng();
        let user_id = *users.choose(&mut rng)?;
        let template = TEMPLATES.choose(&mut rng)?;
        Some(
            NewNotification::new(
                user_id,
                template.notification_type,
                template.title,
                template.message,
            )
            .priority(template.priority),
        )
    }

    /// Generate one notification if anyone is signed in.
    pub async fn tick(&self) -> bool {
        let users = self.sessions.active_users().await;
        let Some(notification) = Self::pick(&users) else {
            return false;
        };

        let user_id = notification.user_id;
        match self.notifications.notify(notification).await {
            Ok(Some(_)) => {
                tracing::debug!("Demo notification sent to {}", user_id);
                true
            }
            Ok(None) => false,
            Err(e) => {
                tracing::warn!("Demo notification for {} failed: {:?}", user_id, e);
                false
            }
        }
    }

    pub async fn run(&self) {
        tracing::info!(
            "Starting demo notification generator (every {}s)",
            self.interval.as_secs()
        );

        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        loop {
            ticker.tick().await;
            self.tick().await;
        }
    }
}
