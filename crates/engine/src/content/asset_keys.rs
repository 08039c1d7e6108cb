use thiserror::Error;

/// Keys name graphics and maps (`player`, `hat_girl`, `world`). They double as
/// file stems, so the alphabet is kept portable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetKeyError {
    #[error("asset key must not be empty")]
    Empty,
    #[error("asset key must not contain path separators")]
    PathSeparator,
    #[error("asset key must not contain '..'")]
    ParentTraversal,
    #[error("asset key contains invalid character '{character}'")]
    InvalidCharacter { character: char },
}

pub fn validate_asset_key(key: &str) -> Result<(), AssetKeyError> {
    if key.is_empty() {
        return Err(AssetKeyError::Empty);
    }
    if key.contains(['/', '\\']) {
        return Err(AssetKeyError::PathSeparator);
    }
    if key.contains("..") {
        return Err(AssetKeyError::ParentTraversal);
    }
    for ch in key.chars() {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || matches!(ch, '_' | '-' | '.') {
            continue;
        }
        return Err(AssetKeyError::InvalidCharacter { character: ch });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_keys() {
        for key in ["player", "hat_girl", "fire-boss", "world2"] {
            assert!(validate_asset_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_invalid_keys() {
        assert_eq!(validate_asset_key(""), Err(AssetKeyError::Empty));
        assert_eq!(validate_asset_key("a/b"), Err(AssetKeyError::PathSeparator));
        assert_eq!(validate_asset_key(r"a\b"), Err(AssetKeyError::PathSeparator));
        assert_eq!(validate_asset_key(".."), Err(AssetKeyError::ParentTraversal));
        assert_eq!(
            validate_asset_key("Player"),
            Err(AssetKeyError::InvalidCharacter { character: 'P' })
        );
        assert!(validate_asset_key("a b").is_err());
    }
}
