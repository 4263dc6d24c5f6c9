//! Identity-header resolution into a per-league role context.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::entities::{Membership, Role, UserAccount};
use crate::errors::{AccessError, RoleResolveError};
use crate::store::fetch;
use crate::Client;

/// Staleness bound after a role change; a minute at most.
pub const ROLE_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CoachAssignment {
    pub division: String,
    pub team_id: String,
}

/// Everything a handler needs to authorize one request. Built once per
/// request from the identity headers and passed explicitly to each
/// operation; there is no ambient caller state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoleContext {
    pub user_id: String,
    pub email: String,
    pub league_id: String,
    pub role: Role,
    pub coach: Option<CoachAssignment>,
}

impl RoleContext {
    pub fn is_admin(&self) -> bool {
        matches!(self.role, Role::GlobalAdmin | Role::LeagueAdmin)
    }

    pub fn require_admin(&self) -> Result<(), AccessError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AccessError::AdminRequired)
        }
    }

    /// Admins pass; otherwise the caller's coach membership must match the
    /// division and team exactly.
    pub fn require_coach_for(&self, division: &str, team_id: &str) -> Result<(), AccessError> {
        if self.is_admin() {
            return Ok(());
        }

        match &self.coach {
            Some(assignment) if assignment.division == division && assignment.team_id == team_id => {
                Ok(())
            }
            _ => Err(AccessError::WrongTeam {
                team_id: team_id.to_string(),
            }),
        }
    }

    pub fn coach(&self) -> Result<&CoachAssignment, AccessError> {
        match (&self.role, &self.coach) {
            (Role::Coach, Some(assignment)) => Ok(assignment),
            _ => Err(AccessError::CoachRequired),
        }
    }
}

impl Client {
    /// Resolves the caller's role within one league. A process-wide
    /// `GlobalAdmin` flag wins over any membership; no membership at all
    /// means read-only `Viewer`.
    pub async fn resolve_role(
        &self,
        user_id: &str,
        email: &str,
        league_id: &str,
    ) -> Result<RoleContext, RoleResolveError> {
        let account: Option<UserAccount> = fetch(self.store(), user_id, user_id).await?;
        if account.is_some_and(|account| account.is_global_admin) {
            return Ok(RoleContext {
                user_id: user_id.to_string(),
                email: email.to_string(),
                league_id: league_id.to_string(),
                role: Role::GlobalAdmin,
                coach: None,
            });
        }

        let membership: Option<Membership> = fetch(self.store(), user_id, league_id).await?;
        let (role, coach) = match membership {
            Some(membership) => {
                let coach = match (&membership.role, membership.division, membership.team_id) {
                    (Role::Coach, Some(division), Some(team_id)) => {
                        Some(CoachAssignment { division, team_id })
                    }
                    _ => None,
                };
                (membership.role, coach)
            }
            None => (Role::Viewer, None),
        };

        Ok(RoleContext {
            user_id: user_id.to_string(),
            email: email.to_string(),
            league_id: league_id.to_string(),
            role,
            coach,
        })
    }
}

struct CachedRole {
    context: RoleContext,
    resolved_at: Instant,
}

/// TTL-bounded role cache keyed by `(user, league)`.
pub struct RoleCache {
    ttl: Duration,
    entries: Mutex<HashMap<(String, String), CachedRole>>,
}

impl Default for RoleCache {
    fn default() -> Self {
        Self::new(ROLE_CACHE_TTL)
    }
}

impl RoleCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub async fn resolve(
        &self,
        client: &Client,
        user_id: &str,
        email: &str,
        league_id: &str,
    ) -> Result<RoleContext, RoleResolveError> {
        let key = (user_id.to_string(), league_id.to_string());

        if let Ok(entries) = self.entries.lock() {
            if let Some(cached) = entries.get(&key) {
                if cached.resolved_at.elapsed() < self.ttl {
                    return Ok(cached.context.clone());
                }
            }
        }

        let context = client.resolve_role(user_id, email, league_id).await?;

        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(
                key,
                CachedRole {
                    context: context.clone(),
                    resolved_at: Instant::now(),
                },
            );
        }

        Ok(context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::save;

    async fn seed_membership(client: &Client, role: Role, team: Option<(&str, &str)>) {
        let mut membership = Membership {
            user_id: "u1".into(),
            league_id: "league".into(),
            role,
            email: "coach@example.com".into(),
            division: team.map(|(division, _)| division.to_string()),
            team_id: team.map(|(_, team_id)| team_id.to_string()),
            version: 0,
        };
        save(client.store(), &mut membership).await.unwrap();
    }

    #[tokio::test]
    async fn no_membership_resolves_to_viewer() {
        let client = Client::in_memory();

        let context = client
            .resolve_role("ghost", "ghost@example.com", "league")
            .await
            .unwrap();

        assert_eq!(context.role, Role::Viewer);
        assert!(context.require_admin().is_err());
    }

    #[tokio::test]
    async fn coach_membership_carries_team_assignment() {
        let client = Client::in_memory();
        seed_membership(&client, Role::Coach, Some(("10U", "tigers"))).await;

        let context = client
            .resolve_role("u1", "coach@example.com", "league")
            .await
            .unwrap();

        assert_eq!(context.role, Role::Coach);
        assert!(context.require_coach_for("10U", "tigers").is_ok());
        assert_eq!(
            context.require_coach_for("10U", "hawks"),
            Err(AccessError::WrongTeam {
                team_id: "hawks".into()
            })
        );
    }

    #[tokio::test]
    async fn global_admin_flag_wins_in_every_league() {
        let client = Client::in_memory();
        let mut account = UserAccount {
            user_id: "root".into(),
            email: "root@example.com".into(),
            is_global_admin: true,
            version: 0,
        };
        save(client.store(), &mut account).await.unwrap();

        let context = client
            .resolve_role("root", "root@example.com", "some-league")
            .await
            .unwrap();

        assert_eq!(context.role, Role::GlobalAdmin);
        assert!(context.require_admin().is_ok());
        assert!(context.require_coach_for("10U", "tigers").is_ok());
    }

    #[tokio::test]
    async fn cache_serves_within_ttl_and_refreshes_after() {
        let client = Client::in_memory();
        seed_membership(&client, Role::Coach, Some(("10U", "tigers"))).await;

        let cache = RoleCache::new(Duration::from_secs(60));
        let first = cache
            .resolve(&client, "u1", "coach@example.com", "league")
            .await
            .unwrap();
        assert_eq!(first.role, Role::Coach);

        // Role change is not visible until the TTL lapses.
        seed_membership(&client, Role::LeagueAdmin, None).await;
        let cached = cache
            .resolve(&client, "u1", "coach@example.com", "league")
            .await
            .unwrap();
        assert_eq!(cached.role, Role::Coach);

        let expired = RoleCache::new(Duration::ZERO);
        let fresh = expired
            .resolve(&client, "u1", "coach@example.com", "league")
            .await
            .unwrap();
        assert_eq!(fresh.role, Role::LeagueAdmin);
    }
}
