//! Route prefix groups owned by external handler sets.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the six handler sets mounted under `/api`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RouteGroup {
    Users,
    Subscriptions,
    Classes,
    Bookings,
    Dashboard,
    Auth,
}

impl RouteGroup {
    pub const ALL: [RouteGroup; 6] = [
        RouteGroup::Users,
        RouteGroup::Subscriptions,
        RouteGroup::Classes,
        RouteGroup::Bookings,
        RouteGroup::Dashboard,
        RouteGroup::Auth,
    ];

    pub fn prefix(self) -> &'static str {
        match self {
            RouteGroup::Users => "/api/users",
            RouteGroup::Subscriptions => "/api/subscriptions",
            RouteGroup::Classes => "/api/classes",
            RouteGroup::Bookings => "/api/bookings",
            RouteGroup::Dashboard => "/api/dashboard",
            RouteGroup::Auth => "/api/auth",
        }
    }

    pub fn upstream_env_var(self) -> &'static str {
        match self {
            RouteGroup::Users => "USERS_UPSTREAM_URL",
            RouteGroup::Subscriptions => "SUBSCRIPTIONS_UPSTREAM_URL",
            RouteGroup::Classes => "CLASSES_UPSTREAM_URL",
            RouteGroup::Bookings => "BOOKINGS_UPSTREAM_URL",
            RouteGroup::Dashboard => "DASHBOARD_UPSTREAM_URL",
            RouteGroup::Auth => "AUTH_UPSTREAM_URL",
        }
    }

    /// The group whose prefix contains `path`, on a segment boundary.
    ///
    /// `/api/users` and `/api/users/42` belong to `Users`; `/api/usersfoo` does not.
    pub fn for_path(path: &str) -> Option<RouteGroup> {
        RouteGroup::ALL.into_iter().find(|group| {
            path.strip_prefix(group.prefix())
                .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
        })
    }
}

impl fmt::Display for RouteGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}
