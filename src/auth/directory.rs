//! User directory lookups.

use std::collections::HashMap;

use crate::config::UserConfig;

/// Source of user identities and group memberships.
pub trait Directory: Send + Sync {
    /// Resolve a user id when the password matches.
    fn check_password(&self, user: &str, password: &str) -> Option<String>;

    fn user_groups(&self, uid: &str) -> Vec<String>;
}

/// Directory built from the `[[auth.users]]` config entries.
#[derive(Debug, Default, Clone)]
pub struct StaticDirectory {
    users: HashMap<String, (String, Vec<String>)>,
}

impl StaticDirectory {
    pub fn from_users(users: &[UserConfig]) -> Self {
        let users = users
            .iter()
            .map(|u| (u.name.clone(), (u.password.clone(), u.groups.clone())))
            .collect();
        Self { users }
    }
}

impl Directory for StaticDirectory {
    fn check_password(&self, user: &str, password: &str) -> Option<String> {
        let (expected, _) = self.users.get(user)?;
        (expected == password).then(|| user.to_string())
    }

    fn user_groups(&self, uid: &str) -> Vec<String> {
        self.users.get(uid).map(|(_, groups)| groups.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup() {
        let dir = StaticDirectory::from_users(&[UserConfig {
            name: "alice".into(),
            password: "wonder".into(),
            groups: vec!["sales".into()],
        }]);
        assert_eq!(dir.check_password("alice", "wonder").as_deref(), Some("alice"));
        assert_eq!(dir.check_password("alice", "nope"), None);
        assert_eq!(dir.check_password("bob", "wonder"), None);
        assert_eq!(dir.user_groups("alice"), vec!["sales".to_string()]);
        assert!(dir.user_groups("bob").is_empty());
    }
}
