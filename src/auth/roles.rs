//! Role hierarchy and the authorization predicates evaluated against it.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::users::User;

/// Privilege tiers, most privileged first: Admin > Manager > Salesperson.
///
/// Persisted as a text column; ordering lives only here, behind
/// [`Role::at_least`], so reordering variants cannot silently change
/// authorization decisions made through the named predicate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Manager,
    Salesperson,
}

impl Role {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "admin",
            Self::Manager => "manager",
            Self::Salesperson => "salesperson",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "admin" => Some(Self::Admin),
            "manager" => Some(Self::Manager),
            "salesperson" => Some(Self::Salesperson),
            _ => None,
        }
    }

    const fn privilege(self) -> u8 {
        match self {
            Self::Admin => 2,
            Self::Manager => 1,
            Self::Salesperson => 0,
        }
    }

    /// True when `self` is at least as privileged as `minimum`.
    #[must_use]
    pub fn at_least(self, minimum: Self) -> bool {
        self.privilege() >= minimum.privilege()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `actor` may act on `target` at all.
///
/// Admins manage everyone, managers manage only salespeople, salespeople
/// manage no one.
#[must_use]
pub fn can_manage(actor: &User, target: &User) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => target.role == Role::Salesperson,
        Role::Salesperson => false,
    }
}

/// Whether `actor` may disable `target`.
///
/// Requires management rights, forbids self-disable, and only salesperson
/// accounts may be disabled through this path at all.
#[must_use]
pub fn can_disable(actor: &User, target: &User) -> bool {
    if actor.id == target.id {
        return false;
    }
    if target.role != Role::Salesperson {
        return false;
    }
    can_manage(actor, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::users::User;
    use chrono::Utc;
    use uuid::Uuid;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: format!("{}@example.com", role.as_str()),
            name: "Test User".to_string(),
            password_digest: String::new(),
            role,
            company: None,
            enabled: true,
            last_sign_in_at: None,
            current_sign_in_at: None,
            sign_in_count: 0,
            password_reset_at: None,
            password_expires_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn role_round_trips_through_text() {
        for role in [Role::Admin, Role::Manager, Role::Salesperson] {
            assert_eq!(Role::parse(role.as_str()), Some(role));
        }
        assert_eq!(Role::parse("root"), None);
    }

    #[test]
    fn at_least_follows_the_hierarchy() {
        assert!(Role::Admin.at_least(Role::Admin));
        assert!(Role::Admin.at_least(Role::Manager));
        assert!(Role::Admin.at_least(Role::Salesperson));
        assert!(Role::Manager.at_least(Role::Manager));
        assert!(Role::Manager.at_least(Role::Salesperson));
        assert!(!Role::Manager.at_least(Role::Admin));
        assert!(Role::Salesperson.at_least(Role::Salesperson));
        assert!(!Role::Salesperson.at_least(Role::Manager));
        assert!(!Role::Salesperson.at_least(Role::Admin));
    }

    #[test]
    fn admin_manages_everyone() {
        let admin = user(Role::Admin);
        for role in [Role::Admin, Role::Manager, Role::Salesperson] {
            assert!(can_manage(&admin, &user(role)));
        }
    }

    #[test]
    fn manager_manages_only_salespeople() {
        let manager = user(Role::Manager);
        assert!(can_manage(&manager, &user(Role::Salesperson)));
        assert!(!can_manage(&manager, &user(Role::Manager)));
        assert!(!can_manage(&manager, &user(Role::Admin)));
    }

    #[test]
    fn salesperson_manages_no_one() {
        let sales = user(Role::Salesperson);
        for role in [Role::Admin, Role::Manager, Role::Salesperson] {
            assert!(!can_manage(&sales, &user(role)));
        }
    }

    #[test]
    fn nobody_can_disable_themselves() {
        for role in [Role::Admin, Role::Manager, Role::Salesperson] {
            let actor = user(role);
            assert!(!can_disable(&actor, &actor));
        }
    }

    #[test]
    fn only_salespeople_can_be_disabled() {
        let admin = user(Role::Admin);
        assert!(can_disable(&admin, &user(Role::Salesperson)));
        assert!(!can_disable(&admin, &user(Role::Manager)));
        assert!(!can_disable(&admin, &user(Role::Admin)));
    }

    #[test]
    fn manager_can_disable_salesperson_but_not_peers() {
        let manager = user(Role::Manager);
        assert!(can_disable(&manager, &user(Role::Salesperson)));
        assert!(!can_disable(&manager, &user(Role::Manager)));
        let sales = user(Role::Salesperson);
        assert!(!can_disable(&sales, &user(Role::Salesperson)));
    }
}
