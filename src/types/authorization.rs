//! Location permission states

use serde::{Deserialize, Serialize};
use std::fmt;

/// Authorization state of the location sensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthorizationStatus {
    /// The user has not answered the permission prompt yet
    #[default]
    NotDetermined,
    /// The user refused location access
    Denied,
    /// Access is blocked by policy and cannot be granted by the user
    Restricted,
    /// Location updates may be started
    Authorized,
}

impl AuthorizationStatus {
    pub fn is_authorized(self) -> bool {
        self == AuthorizationStatus::Authorized
    }

    /// Denied or restricted: nothing will be delivered until settings change
    pub fn is_blocked(self) -> bool {
        matches!(self, AuthorizationStatus::Denied | AuthorizationStatus::Restricted)
    }
}

impl fmt::Display for AuthorizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuthorizationStatus::NotDetermined => "NotDetermined",
            AuthorizationStatus::Denied => "Denied",
            AuthorizationStatus::Restricted => "Restricted",
            AuthorizationStatus::Authorized => "Authorized",
        };
        f.write_str(name)
    }
}
