use crate::types::{CanAccess, Identity};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Authenticated session state attached to a request by the auth handshake
/// layer (external to this crate).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionState {
    pub user_name: String,
    #[serde(default)]
    pub roles: Vec<String>,
    /// Tenant names the user is a member of; only consulted by find.
    #[serde(default)]
    pub tenants: Vec<String>,
}

/// The set of identities a request may act as: the caller's own user
/// identity plus one role identity per held role.
///
/// Derived once per request and immutable for its duration. An absent
/// session collapses to `user/anonymous` with no roles — a valid,
/// maximally restrictive caller, not an error.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessibleIdentitySet {
    pub identities: HashSet<Identity>,
    pub tenants: Vec<String>,
}

impl AccessibleIdentitySet {
    pub fn resolve(session: Option<&SessionState>) -> Self {
        match session {
            Some(state) => {
                let mut identities = HashSet::with_capacity(state.roles.len() + 1);
                identities.insert(Identity::user(&state.user_name));
                for role in &state.roles {
                    identities.insert(Identity::role(role));
                }
                AccessibleIdentitySet {
                    identities,
                    tenants: state.tenants.clone(),
                }
            }
            None => {
                let mut identities = HashSet::with_capacity(1);
                identities.insert(Identity::user("anonymous"));
                AccessibleIdentitySet {
                    identities,
                    tenants: Vec::new(),
                }
            }
        }
    }

    /// Read access: wildcard in either grant set, or a non-empty
    /// intersection with `ro_identities ∪ rw_identities`.
    pub fn can_read(&self, access: &CanAccess) -> bool {
        self.granted_by(&access.ro_identities) || self.granted_by(&access.rw_identities)
    }

    /// Write access: `rw_identities` only. Read-only grants never permit
    /// mutation.
    pub fn can_write(&self, access: &CanAccess) -> bool {
        self.granted_by(&access.rw_identities)
    }

    fn granted_by(&self, grants: &HashSet<Identity>) -> bool {
        grants
            .iter()
            .any(|g| g.is_wildcard() || self.identities.contains(g))
    }

    /// Identities as a sorted list, for embedding into a find query.
    pub fn to_sorted_vec(&self) -> Vec<Identity> {
        let mut v: Vec<Identity> = self.identities.iter().cloned().collect();
        v.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        v
    }
}
