use anyhow::Result;
use tracing::info;

use crate::db::{ChannelStore, UsernameStore};
use crate::slack::{ChannelLookup, UserLookup};

#[derive(Debug, Default, Clone, Copy)]
pub struct ReconcileOutcome {
    pub candidates: usize,
    pub resolved: usize,
}

impl ReconcileOutcome {
    pub fn unresolved(&self) -> usize {
        self.candidates - self.resolved
    }
}

/// Resolves placeholder usernames through the identity collaborator.
///
/// A lookup miss leaves the placeholder for a future run; lookup or
/// storage errors abort the run.
pub async fn reconcile_usernames(
    store: &dyn UsernameStore,
    lookup: &dyn UserLookup,
) -> Result<ReconcileOutcome> {
    let incomplete = store.list_incomplete_usernames().await?;
    let mut outcome = ReconcileOutcome {
        candidates: incomplete.len(),
        resolved: 0,
    };
    if incomplete.is_empty() {
        return Ok(outcome);
    }

    info!(
        count = incomplete.len(),
        "usernames needing identity reconciliation"
    );

    for username in &incomplete {
        if let Some(resolved) = lookup.user_info(&username.id).await? {
            store.upsert_username(&resolved).await?;
            outcome.resolved += 1;
        }
    }

    Ok(outcome)
}

/// Channel-name counterpart of [`reconcile_usernames`].
pub async fn reconcile_channels(
    store: &dyn ChannelStore,
    lookup: &dyn ChannelLookup,
) -> Result<ReconcileOutcome> {
    let incomplete = store.list_incomplete_channels().await?;
    let mut outcome = ReconcileOutcome {
        candidates: incomplete.len(),
        resolved: 0,
    };
    if incomplete.is_empty() {
        return Ok(outcome);
    }

    info!(
        count = incomplete.len(),
        "channels needing identity reconciliation"
    );

    for channel in &incomplete {
        if let Some(resolved) = lookup.channel_info(&channel.id).await? {
            store.upsert_channel(&resolved).await?;
            outcome.resolved += 1;
        }
    }

    Ok(outcome)
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use std::collections::HashMap;

    use async_trait::async_trait;
    use tempfile::NamedTempFile;

    use crate::config::DatabaseConfig;
    use crate::db::{DatabaseManager, Username};
    use crate::slack::SlackError;

    use super::*;

    struct RosterLookup {
        users: HashMap<String, String>,
    }

    #[async_trait]
    impl UserLookup for RosterLookup {
        async fn user_info(&self, user_id: &str) -> Result<Option<Username>, SlackError> {
            Ok(self.users.get(user_id).map(|name| Username {
                id: user_id.to_string(),
                name: Some(name.clone()),
            }))
        }
    }

    async fn sqlite_manager(file: &NamedTempFile) -> DatabaseManager {
        let config = DatabaseConfig {
            url: Some(format!("sqlite://{}", file.path().to_string_lossy())),
            max_connections: None,
            min_connections: None,
        };
        let manager = DatabaseManager::new(&config).await.expect("db manager");
        manager.migrate().await.expect("migrate");
        manager
    }

    #[tokio::test]
    async fn resolves_known_ids_and_keeps_unknown_placeholders() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = sqlite_manager(&file).await;
        let store = manager.username_store();

        for id in ["U1", "U2", "U3"] {
            store
                .upsert_username(&Username {
                    id: id.to_string(),
                    name: None,
                })
                .await
                .expect("placeholder");
        }

        let lookup = RosterLookup {
            users: HashMap::from([
                ("U1".to_string(), "Alice".to_string()),
                ("U3".to_string(), "Carol".to_string()),
            ]),
        };

        let outcome = reconcile_usernames(&*store, &lookup).await.expect("reconcile");
        assert_eq!(outcome.candidates, 3);
        assert_eq!(outcome.resolved, 2);
        assert_eq!(outcome.unresolved(), 1);

        let remaining = store
            .list_incomplete_usernames()
            .await
            .expect("list incomplete");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "U2");

        // a second pass converges: nothing new to resolve
        let outcome = reconcile_usernames(&*store, &lookup).await.expect("reconcile");
        assert_eq!(outcome.candidates, 1);
        assert_eq!(outcome.resolved, 0);
    }

    #[tokio::test]
    async fn empty_store_reconciles_quietly() {
        let file = NamedTempFile::new().expect("temp sqlite file");
        let manager = sqlite_manager(&file).await;
        let lookup = RosterLookup {
            users: HashMap::new(),
        };

        let outcome = reconcile_usernames(&*manager.username_store(), &lookup)
            .await
            .expect("reconcile");
        assert_eq!(outcome.candidates, 0);
    }
}
