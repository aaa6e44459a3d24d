use chrono::Utc;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::notifications::dtos::UpdatePreferencesDto;
use crate::features::notifications::models::{
    NewNotification, Notification, NotificationPreferences, NotificationPriority, NotificationType,
};
use crate::features::users::UserService;
use crate::modules::backend::{
    decode_row, select_one, Backend, ChangeEvent, Filter, SelectQuery, Subscription,
};
use crate::shared::constants::{TABLE_NOTIFICATIONS, TABLE_NOTIFICATION_PREFERENCES};
use crate::shared::types::PaginationQuery;

pub struct NotificationService {
    backend: Arc<dyn Backend>,
    users: Arc<UserService>,
}

impl NotificationService {
    pub fn new(backend: Arc<dyn Backend>, users: Arc<UserService>) -> Self {
        Self { backend, users }
    }

    /// Deliver a notification unless the recipient turned its type off.
    /// Returns `None` when suppressed by preferences.
    pub async fn notify(&self, notification: NewNotification) -> Result<Option<Notification>> {
        let preferences = self.get_preferences(notification.user_id).await?;
        if !preferences.allows(notification.notification_type) {
            tracing::debug!(
                "Suppressed {} notification for {} by preference",
                notification.notification_type,
                notification.user_id
            );
            return Ok(None);
        }

        let row = json!({
            "user_id": notification.user_id,
            "type": notification.notification_type.as_str(),
            "priority": notification.priority.as_str(),
            "title": notification.title,
            "message": notification.message,
            "is_read": false,
            "related_report_id": notification.related_report_id,
        });

        let row = self.backend.insert(TABLE_NOTIFICATIONS, row).await.map_err(|e| {
            tracing::error!("Failed to create notification: {:?}", e);
            e
        })?;
        decode_row(row).map(Some)
    }

    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        unread_only: bool,
        pagination: &PaginationQuery,
    ) -> Result<(Vec<Notification>, i64)> {
        let (from, to) = pagination.range();
        let mut query = SelectQuery::from(TABLE_NOTIFICATIONS)
            .eq("user_id", user_id)
            .order("created_at", false)
            .range(from, to)
            .with_count();
        if unread_only {
            query = query.eq("is_read", false);
        }

        let result = self.backend.select(query).await?;
        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }

    pub async fn unread_count(&self, user_id: Uuid) -> Result<i64> {
        let result = self
            .backend
            .select(
                SelectQuery::from(TABLE_NOTIFICATIONS)
                    .eq("user_id", user_id)
                    .eq("is_read", false)
                    .count_only(),
            )
            .await?;
        Ok(result.count.unwrap_or(0))
    }

    pub async fn mark_read(&self, user_id: Uuid, id: Uuid) -> Result<Notification> {
        let now = Utc::now();
        let mut rows = self
            .backend
            .update(
                TABLE_NOTIFICATIONS,
                vec![Filter::eq("id", id), Filter::eq("user_id", user_id)],
                json!({"is_read": true, "read_at": now, "updated_at": now}),
            )
            .await?;
        let row = rows
            .pop()
            .ok_or_else(|| AppError::NotFound(format!("Notification {} not found", id)))?;
        decode_row(row)
    }

    pub async fn mark_all_read(&self, user_id: Uuid) -> Result<usize> {
        let now = Utc::now();
        let rows = self
            .backend
            .update(
                TABLE_NOTIFICATIONS,
                vec![Filter::eq("user_id", user_id), Filter::eq("is_read", false)],
                json!({"is_read": true, "read_at": now, "updated_at": now}),
            )
            .await?;
        Ok(rows.len())
    }

    pub async fn delete(&self, user_id: Uuid, id: Uuid) -> Result<()> {
        let removed = self
            .backend
            .delete(
                TABLE_NOTIFICATIONS,
                vec![Filter::eq("id", id), Filter::eq("user_id", user_id)],
            )
            .await?;
        if removed.is_empty() {
            return Err(AppError::NotFound(format!("Notification {} not found", id)));
        }
        Ok(())
    }

    pub async fn get_preferences(&self, user_id: Uuid) -> Result<NotificationPreferences> {
        let row = select_one(
            self.backend.as_ref(),
            SelectQuery::from(TABLE_NOTIFICATION_PREFERENCES).eq("user_id", user_id),
        )
        .await?;

        match row {
            Some(row) => decode_row(row),
            None => Ok(NotificationPreferences::all_enabled(user_id)),
        }
    }

    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        dto: UpdatePreferencesDto,
    ) -> Result<NotificationPreferences> {
        let mut preferences = self.get_preferences(user_id).await?;
        if let Some(v) = dto.report_status {
            preferences.report_status = v;
        }
        if let Some(v) = dto.community_alert {
            preferences.community_alert = v;
        }
        if let Some(v) = dto.system_announcement {
            preferences.system_announcement = v;
        }
        if let Some(v) = dto.fraud_warning {
            preferences.fraud_warning = v;
        }

        let mut patch = match serde_json::to_value(&preferences) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };
        patch.insert("updated_at".to_string(), json!(Utc::now()));

        let updated = self
            .backend
            .update(
                TABLE_NOTIFICATION_PREFERENCES,
                vec![Filter::eq("user_id", user_id)],
                Value::Object(patch.clone()),
            )
            .await?;

        let row = match updated.into_iter().next() {
            Some(row) => row,
            None => {
                self.backend
                    .insert(TABLE_NOTIFICATION_PREFERENCES, Value::Object(patch))
                    .await?
            }
        };
        decode_row(row)
    }

    /// Send the same notification to every active user. Individual failures
    /// are logged and skipped. Returns how many were delivered.
    pub async fn broadcast(
        &self,
        notification_type: NotificationType,
        priority: NotificationPriority,
        title: &str,
        message: &str,
    ) -> Result<usize> {
        let recipients = self.users.list_active_ids().await?;
        let mut delivered = 0;

        for user_id in recipients {
            let notification = NewNotification::new(user_id, notification_type, title, message)
                .priority(priority);
            match self.notify(notification).await {
                Ok(Some(_)) => delivered += 1,
                Ok(None) => {}
                Err(e) => tracing::warn!("Broadcast to {} failed: {:?}", user_id, e),
            }
        }

        tracing::info!("Broadcast '{}' delivered to {} user(s)", title, delivered);
        Ok(delivered)
    }

    /// Live feed of new notifications for one user.
    pub fn subscribe<F>(&self, user_id: Uuid, callback: F) -> Subscription
    where
        F: Fn(Notification) + Send + Sync + 'static,
    {
        self.backend
            .realtime()
            .channel(&format!("notifications:{}", user_id))
            .on(
                Some(ChangeEvent::Insert),
                TABLE_NOTIFICATIONS,
                Some(("user_id", user_id.into())),
                move |change| {
                    let Some(row) = change.record else { return };
                    match decode_row::<Notification>(row) {
                        Ok(notification) => callback(notification),
                        Err(e) => tracing::warn!("Dropping undecodable notification: {:?}", e),
                    }
                },
            )
            .subscribe()
    }
}
