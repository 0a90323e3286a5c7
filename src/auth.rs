use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
        }
    }
}

/// Registration fixes the role from the username: a `teacher` prefix
/// (case-insensitive) makes a teacher account, everything else a student.
pub fn role_for_username(username: &str) -> Role {
    if username.to_ascii_lowercase().starts_with("teacher") {
        Role::Teacher
    } else {
        Role::Student
    }
}

pub fn hash_password(password: &str) -> String {
    let digest = Sha256::digest(password.as_bytes());
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    hash_password(password) == stored_hash
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashing_is_stable_and_collision_free_for_distinct_inputs() {
        let h1 = hash_password("hunter2");
        assert_eq!(h1, hash_password("hunter2"));
        assert_eq!(h1.len(), 64);
        assert_ne!(h1, hash_password("hunter3"));
        assert!(verify_password("hunter2", &h1));
        assert!(!verify_password("hunter3", &h1));
    }

    #[test]
    fn role_follows_username_prefix() {
        assert_eq!(role_for_username("teacher_amy"), Role::Teacher);
        assert_eq!(role_for_username("Teacher01"), Role::Teacher);
        assert_eq!(role_for_username("sam"), Role::Student);
        assert_eq!(role_for_username("the_teacher"), Role::Student);
    }
}
