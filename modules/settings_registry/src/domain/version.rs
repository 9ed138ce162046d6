//! Export document version gating

/// Leading dot-separated numeric component of `version`
pub fn major_version(version: &str) -> Option<u64> {
    version.trim().split('.').next()?.parse().ok()
}

/// Documents are compatible when their major versions are equal
pub fn is_version_compatible(imported: &str, current: &str) -> bool {
    match (major_version(imported), major_version(current)) {
        (Some(imported), Some(current)) => imported == current,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_major_version() {
        assert_eq!(major_version("1.4.2"), Some(1));
        assert_eq!(major_version("12"), Some(12));
        assert_eq!(major_version("v1.0.0"), None);
        assert_eq!(major_version(""), None);
    }

    #[test]
    fn test_same_major_is_compatible() {
        assert!(is_version_compatible("1.0.0", "1.9.3"));
        assert!(is_version_compatible("2.1", "2.0.0"));
    }

    #[test]
    fn test_different_major_is_rejected() {
        assert!(!is_version_compatible("2.0.0", "1.0.0"));
        assert!(!is_version_compatible("0.9.0", "1.0.0"));
        assert!(!is_version_compatible("garbage", "1.0.0"));
    }
}
