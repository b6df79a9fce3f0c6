//! In-process login → [`UserInfo`] table. SPEC_FULL §4.4.

use crate::models::{AccountType, UserInfo};
use std::collections::HashMap;
use std::sync::RwLock;

pub struct UserInfoCache {
    entries: RwLock<HashMap<String, UserInfo>>,
}

impl Default for UserInfoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl UserInfoCache {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, login: &str) -> Option<UserInfo> {
        self.entries.read().expect("user cache poisoned").get(login).cloned()
    }

    /// Unconditionally overwrites any existing entry for the login.
    pub fn set(&self, info: UserInfo) {
        let mut guard = self.entries.write().expect("user cache poisoned");
        guard.insert(info.login.clone(), info);
    }

    /// Overwrites only when there is no entry yet, or the existing entry's
    /// classification is the weakest (`AccountType::User`). This lets a
    /// later, more authoritative signal (Bot, Organization) replace a
    /// tentative classification without clobbering one already confirmed.
    pub fn set_if_not_exists(&self, info: UserInfo) {
        let mut guard = self.entries.write().expect("user cache poisoned");
        match guard.get(&info.login) {
            Some(existing) if existing.account_type != AccountType::User => {}
            _ => {
                guard.insert(info.login.clone(), info);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user(login: &str, account_type: AccountType) -> UserInfo {
        UserInfo {
            login: login.to_string(),
            is_bot: account_type == AccountType::Bot,
            has_write_access: false,
            account_type,
            last_update: Utc::now(),
        }
    }

    #[test]
    fn given_empty_cache_when_set_if_not_exists_then_inserted() {
        let cache = UserInfoCache::new();
        cache.set_if_not_exists(user("alice", AccountType::User));
        assert_eq!(cache.get("alice").unwrap().account_type, AccountType::User);
    }

    #[test]
    fn given_weak_existing_entry_when_set_if_not_exists_with_bot_then_overwritten() {
        let cache = UserInfoCache::new();
        cache.set_if_not_exists(user("ci", AccountType::User));
        cache.set_if_not_exists(user("ci", AccountType::Bot));
        assert_eq!(cache.get("ci").unwrap().account_type, AccountType::Bot);
    }

    #[test]
    fn given_authoritative_existing_entry_when_set_if_not_exists_with_user_then_kept() {
        let cache = UserInfoCache::new();
        cache.set_if_not_exists(user("org-bot", AccountType::Organization));
        cache.set_if_not_exists(user("org-bot", AccountType::User));
        assert_eq!(
            cache.get("org-bot").unwrap().account_type,
            AccountType::Organization
        );
    }

    #[test]
    fn given_existing_entry_when_set_then_always_overwritten() {
        let cache = UserInfoCache::new();
        cache.set(user("bob", AccountType::Organization));
        cache.set(user("bob", AccountType::User));
        assert_eq!(cache.get("bob").unwrap().account_type, AccountType::User);
    }
}
