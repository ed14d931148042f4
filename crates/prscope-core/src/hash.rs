use sha2::{Digest, Sha256};

use crate::config::PrscopeConfig;

/// Fingerprint a review input: the prepared diff text plus the settings that
/// change what the model is asked.
///
/// Hex SHA-256 of `diff|model|provider|profile`. Two runs with the same hash
/// sent the model byte-identical prompts.
///
/// # Examples
///
/// ```
/// use prscope_core::{compute_review_hash, PrscopeConfig, ProviderKind};
///
/// let config = PrscopeConfig::new(ProviderKind::OpenAi, "gpt-4o", "OPENAI_API_KEY");
/// let hash = compute_review_hash("+line", &config);
/// assert_eq!(hash.len(), 64);
/// assert_eq!(hash, compute_review_hash("+line", &config));
/// ```
pub fn compute_review_hash(diff: &str, config: &PrscopeConfig) -> String {
    let input = [
        diff,
        config.model.as_str(),
        config.provider.as_str(),
        config.profile.as_str(),
    ]
    .join("|");
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ProviderKind, ReviewProfile};

    fn config() -> PrscopeConfig {
        PrscopeConfig::new(ProviderKind::OpenAi, "gpt-4o", "OPENAI_API_KEY")
    }

    #[test]
    fn matches_known_digest() {
        // sha256("|m|ollama|balanced")
        let config = PrscopeConfig::new(ProviderKind::Ollama, "m", "K");
        let hash = compute_review_hash("", &config);
        let mut hasher = Sha256::new();
        hasher.update(b"|m|ollama|balanced");
        assert_eq!(hash, format!("{:x}", hasher.finalize()));
    }

    #[test]
    fn profile_changes_hash() {
        let balanced = config();
        let mut strict = config();
        strict.profile = ReviewProfile::Strict;
        assert_ne!(
            compute_review_hash("diff", &balanced),
            compute_review_hash("diff", &strict)
        );
    }

    #[test]
    fn limits_do_not_change_hash() {
        let a = config();
        let mut b = config();
        b.max_files = 3;
        assert_eq!(compute_review_hash("diff", &a), compute_review_hash("diff", &b));
    }
}
