use sha2::{Digest, Sha256};

/// System-reserved accounts that are reported verbatim.
pub const STANDARD_USERS: &[&str] = &["Guest", "Administrator"];

const HASH_PREFIX_LEN: usize = 16;

/// Maps a user identifier to a stable `anon_<hash>` token.
///
/// The digest is unsalted so the same identifier yields the same token on
/// every host and after restarts.
pub fn anonymize_user(user: &str) -> String {
    if STANDARD_USERS.contains(&user) {
        return user.to_string();
    }

    let digest = Sha256::digest(user.as_bytes());
    let hash: String = digest
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect();
    format!("anon_{}", &hash[..HASH_PREFIX_LEN])
}

pub fn anonymize_optional(user: Option<&str>) -> Option<String> {
    user.map(anonymize_user)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_token() {
        let first = anonymize_user("test@example.com");
        assert_eq!(first, anonymize_user("test@example.com"));
        assert!(first.starts_with("anon_"));
        assert_eq!(first.len(), "anon_".len() + HASH_PREFIX_LEN);
        assert_ne!(first, anonymize_user("other@example.com"));
    }

    #[test]
    fn standard_users_pass_through() {
        for user in STANDARD_USERS {
            assert_eq!(anonymize_user(user), *user);
        }
        assert_eq!(anonymize_optional(None), None);
    }
}
