//! Shared-secret check for the scheduled crawl trigger.

use groundwork_shared::{CrawlSettings, resolve_secret};

/// Secret the trigger expects, read from the configured env var.
pub fn trigger_secret(settings: &CrawlSettings) -> Option<String> {
    resolve_secret(&settings.trigger_secret_env)
}

/// Whether a trigger request may run.
///
/// With a secret configured, the `Authorization` header must be exactly
/// `Bearer <secret>`. Without one, every request is allowed (local use).
pub fn authorize(secret: Option<&str>, authorization: Option<&str>) -> bool {
    match secret {
        None => true,
        Some(secret) => authorization.is_some_and(|header| header == format!("Bearer {secret}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_secret_allows_everything() {
        assert!(authorize(None, None));
        assert!(authorize(None, Some("Bearer whatever")));
    }

    #[test]
    fn secret_requires_exact_bearer_match() {
        let secret = Some("s3cret");
        assert!(authorize(secret, Some("Bearer s3cret")));
        assert!(!authorize(secret, None));
        assert!(!authorize(secret, Some("s3cret")));
        assert!(!authorize(secret, Some("bearer s3cret")));
        assert!(!authorize(secret, Some("Bearer s3cret ")));
        assert!(!authorize(secret, Some("Bearer other")));
    }
}
