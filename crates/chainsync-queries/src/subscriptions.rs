//! Live tournament and token listings.

use std::sync::Arc;

use tokio::sync::watch;

use chainsync_core::config::SyncConfig;
use chainsync_core::endpoint::EntityEndpoint;
use chainsync_core::entity::EntityView;
use chainsync_core::error::SyncError;
use chainsync_core::query::Query;
use chainsync_core::store::EntityStore;
use chainsync_core::subscription::{SubscriptionManager, SubscriptionState};

use crate::filters;

/// A [`SubscriptionManager`] bound to one fixed query.
struct LiveQuery {
    query: Query,
    config: SyncConfig,
    manager: SubscriptionManager,
}

impl LiveQuery {
    fn new(
        endpoint: Arc<dyn EntityEndpoint>,
        store: Arc<EntityStore>,
        config: &SyncConfig,
        build: fn(&str) -> Query,
    ) -> Self {
        Self {
            query: build(&config.namespace),
            config: config.clone(),
            manager: SubscriptionManager::from_config(endpoint, store, config),
        }
    }

    async fn sync(&mut self, enabled: bool) -> Result<(), SyncError> {
        if enabled {
            self.config.validate_query(&self.query)?;
        }
        self.manager.sync(&self.query, enabled).await
    }
}

macro_rules! live_query {
    ($(#[$doc:meta])* $hook:ident => $build:path) => {
        $(#[$doc])*
        pub struct $hook(LiveQuery);

        impl $hook {
            pub fn new(
                endpoint: Arc<dyn EntityEndpoint>,
                store: Arc<EntityStore>,
                namespace: impl Into<String>,
            ) -> Self {
                Self::from_config(endpoint, store, &SyncConfig::new(namespace))
            }

            /// Subscription whose query is checked against the schema in `config`
            /// before a channel is opened.
            pub fn from_config(
                endpoint: Arc<dyn EntityEndpoint>,
                store: Arc<EntityStore>,
                config: &SyncConfig,
            ) -> Self {
                Self(LiveQuery::new(endpoint, store, config, $build))
            }

            /// Open (`enabled = true`) or close the channel.
            ///
            /// # Errors
            /// `UnknownModel` if the configured schema lacks the model, or the
            /// endpoint error if the channel cannot be opened.
            pub async fn sync(&mut self, enabled: bool) -> Result<(), SyncError> {
                self.0.sync(enabled).await
            }

            /// Reopen the channel against another endpoint.
            pub async fn set_endpoint(
                &mut self,
                endpoint: Arc<dyn EntityEndpoint>,
            ) -> Result<(), SyncError> {
                self.0.manager.set_endpoint(endpoint).await
            }

            pub fn close(&mut self) {
                self.0.manager.close();
            }

            pub fn query(&self) -> &Query {
                &self.0.query
            }

            pub fn entities(&self) -> Option<Vec<EntityView>> {
                self.0.manager.entities()
            }

            pub fn is_subscribed(&self) -> bool {
                self.0.manager.is_subscribed()
            }

            pub fn state(&self) -> SubscriptionState {
                self.0.manager.state()
            }

            pub fn watch(&self) -> watch::Receiver<SubscriptionState> {
                self.0.manager.watch()
            }
        }
    };
}

live_query!(
    /// Live updates of every `Tournament`.
    TournamentsSubscription => filters::tournaments
);

live_query!(
    /// Live updates of every `Token`.
    TokensSubscription => filters::tokens
);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TOKEN, TOURNAMENT};
    use chainsync_core::entity::Entity;
    use chainsync_memory::MemoryEndpoint;
    use serde_json::json;

    const NS: &str = "budokan";

    #[tokio::test]
    async fn token_subscription_publishes_views() {
        let ep = MemoryEndpoint::new("mem");
        let store = Arc::new(EntityStore::new());
        let mut tokens = TokensSubscription::new(Arc::new(ep.clone()), store.clone(), NS);
        assert!(tokens.query().contains_model(TOKEN));

        tokens.sync(true).await.unwrap();
        assert!(tokens.is_subscribed());
        let mut rx = tokens.watch();

        ep.publish(vec![Entity::new("0x1").with_model(NS, TOKEN, json!({ "symbol": "LORDS" }))]);
        rx.wait_for(|s| s.entities.is_some()).await.unwrap();

        let views = tokens.entities().unwrap();
        assert_eq!(views[0].field(TOKEN, "symbol"), Some(&json!("LORDS")));
        assert!(store.contains(&"0x1".into()));
    }

    #[tokio::test]
    async fn schema_without_the_model_opens_nothing() {
        let ep = MemoryEndpoint::new("mem");
        let config = SyncConfig::new(NS).with_models([TOURNAMENT]);
        let store = Arc::new(EntityStore::from_config(&config));

        let mut tokens =
            TokensSubscription::from_config(Arc::new(ep.clone()), store.clone(), &config);
        let err = tokens.sync(true).await.unwrap_err();
        assert!(matches!(err, SyncError::UnknownModel { ref model, .. } if model == TOKEN));
        assert_eq!(ep.open_count(), 0);
        assert!(!tokens.is_subscribed());
        // disabling never needs the schema
        tokens.sync(false).await.unwrap();

        let mut live = TournamentsSubscription::from_config(Arc::new(ep.clone()), store, &config);
        live.sync(true).await.unwrap();
        assert!(live.is_subscribed());
        assert_eq!(ep.open_count(), 1);
    }

    #[tokio::test]
    async fn disable_cancels_and_clears() {
        let ep = MemoryEndpoint::new("mem");
        let store = Arc::new(EntityStore::new());
        let mut live = TournamentsSubscription::new(Arc::new(ep.clone()), store, NS);
        assert!(live.query().contains_model(TOURNAMENT));

        live.sync(true).await.unwrap();
        live.sync(true).await.unwrap();
        assert_eq!(ep.open_count(), 1);

        live.sync(false).await.unwrap();
        assert_eq!(ep.cancel_count(), 1);
        assert!(!live.is_subscribed());
        assert!(live.entities().is_none());
    }
}
