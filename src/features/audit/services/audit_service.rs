use serde_json::json;
use std::sync::Arc;

use crate::core::error::Result;
use crate::features::audit::models::{AuditEntry, AuditLog, AuditLogParams};
use crate::modules::backend::{decode_row, Backend, SelectQuery};
use crate::shared::constants::TABLE_AUDIT_LOGS;

pub struct AuditService {
    backend: Arc<dyn Backend>,
}

impl AuditService {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Append an entry. Failures are logged and swallowed; the audited
    /// action has already happened.
    pub async fn record(&self, entry: AuditEntry) -> Option<AuditLog> {
        let row = json!({
            "actor_id": entry.actor_id,
            "action": entry.action.as_str(),
            "target_type": entry.target_type,
            "target_id": entry.target_id,
            "details": entry.details,
        });

        match self.backend.insert(TABLE_AUDIT_LOGS, row).await {
            Ok(row) => match decode_row(row) {
                Ok(log) => Some(log),
                Err(e) => {
                    tracing::error!("Failed to decode audit log: {:?}", e);
                    None
                }
            },
            Err(e) => {
                tracing::error!(
                    "Failed to record audit entry {} by {}: {:?}",
                    entry.action,
                    entry.actor_id,
                    e
                );
                None
            }
        }
    }

    pub async fn list(&self, params: &AuditLogParams) -> Result<(Vec<AuditLog>, i64)> {
        let (from, to) = params.pagination().range();
        let mut query = SelectQuery::from(TABLE_AUDIT_LOGS)
            .order("created_at", false)
            .range(from, to)
            .with_count();
        if let Some(action) = params.action {
            query = query.eq("action", action.as_str());
        }
        if let Some(actor_id) = params.actor_id {
            query = query.eq("actor_id", actor_id);
        }

        let result = self.backend.select(query).await?;
        let total = result.count.unwrap_or(0);
        Ok((result.rows()?, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::audit::models::AuditAction;
    use crate::shared::test_helpers::memory_backend;
    use uuid::Uuid;

    #[tokio::test]
    async fn records_and_filters_entries() {
        let service = AuditService::new(memory_backend());
        let admin = Uuid::new_v4();
        let target = Uuid::new_v4();

        let log = service
            .record(
                AuditEntry::new(admin, AuditAction::UserSuspended, "user")
                    .target(target)
                    .details(json!({"reason": "spam"})),
            )
            .await
            .unwrap();
        assert_eq!(log.target_id, Some(target));
        assert_eq!(log.details["reason"], "spam");

        service
            .record(AuditEntry::new(admin, AuditAction::AnnouncementSent, "announcement"))
            .await
            .unwrap();

        let params = AuditLogParams {
            page: 1,
            page_size: 20,
            action: Some(AuditAction::UserSuspended),
            actor_id: None,
        };
        let (logs, total) = service.list(&params).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(logs[0].action, AuditAction::UserSuspended);
    }
}
