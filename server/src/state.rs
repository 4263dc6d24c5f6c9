use std::sync::Arc;

use db::roles::{RoleCache, RoleContext};
use db::Client;

use crate::error::ApiError;
use crate::identity::{Identity, LeagueId};

#[derive(Clone)]
pub struct AppState {
    pub client: Client,
    pub roles: Arc<RoleCache>,
}

impl AppState {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            roles: Arc::new(RoleCache::default()),
        }
    }

    /// Resolves the caller's role for the league named in the headers.
    /// Served from the TTL cache when warm.
    pub async fn authorize(
        &self,
        identity: &Identity,
        league: &LeagueId,
    ) -> Result<RoleContext, ApiError> {
        self.roles
            .resolve(&self.client, &identity.user_id, &identity.email, &league.0)
            .await
            .map_err(Into::into)
    }
}
