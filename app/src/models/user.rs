//! In-memory user store backing the demo pages.

use std::sync::{PoisonError, RwLock};

use serde_json::{json, Value as Json};

#[derive(Clone, Debug)]
pub struct User {
    pub id: u64,
    pub name: String,
    pub email: String,
    pub admin: bool,
}

impl User {
    fn to_json(&self) -> Json {
        json!({
            "id": self.id,
            "name": self.name,
            "email": self.email,
            "admin": self.admin,
        })
    }
}

pub struct UserRepository {
    users: RwLock<Vec<User>>,
}

impl UserRepository {
    pub const NAME: &'static str = "UserRepository";

    pub fn seeded() -> Self {
        let users = vec![
            User {
                id: 1,
                name: "Ada Lovelace".to_string(),
                email: "ada@example.com".to_string(),
                admin: true,
            },
            User {
                id: 2,
                name: "Grace Hopper".to_string(),
                email: "grace@example.com".to_string(),
                admin: false,
            },
            User {
                id: 3,
                name: "Alan Turing".to_string(),
                email: "alan@example.com".to_string(),
                admin: false,
            },
        ];
        Self {
            users: RwLock::new(users),
        }
    }

    pub fn all(&self) -> Json {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        Json::Array(users.iter().map(User::to_json).collect())
    }

    pub fn find(&self, id: u64) -> Option<Json> {
        let users = self.users.read().unwrap_or_else(PoisonError::into_inner);
        users.iter().find(|u| u.id == id).map(User::to_json)
    }

    pub fn rename(&self, id: u64, name: &str) -> bool {
        let mut users = self.users.write().unwrap_or_else(PoisonError::into_inner);
        match users.iter_mut().find(|u| u.id == id) {
            Some(user) => {
                user.name = name.to_string();
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_and_rename() {
        let repo = UserRepository::seeded();
        assert!(repo.find(1).is_some());
        assert!(repo.find(99).is_none());

        assert!(repo.rename(2, "Rear Admiral Hopper"));
        let user = repo.find(2).unwrap();
        assert_eq!(user["name"], "Rear Admiral Hopper");
    }
}
