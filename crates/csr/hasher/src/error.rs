use thiserror::Error;

/// Errors raised while canonicalizing or hashing a payload.
///
/// Both variants are configuration-time failures: they are fatal to the
/// proposal that triggered them and are never coerced into a fallback.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HashError {
    #[error("unsupported hash algorithm '{id}'")]
    UnsupportedAlgorithm { id: String },

    #[error("value at '{path}' has no canonical encoding: {reason}")]
    NonCanonicalizableValue { path: String, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_algorithm_display() {
        let e = HashError::UnsupportedAlgorithm { id: "md5".into() };
        assert!(e.to_string().contains("md5"));
    }

    #[test]
    fn non_canonicalizable_display_names_path() {
        let e = HashError::NonCanonicalizableValue {
            path: "/limits/cpu".into(),
            reason: "nesting too deep".into(),
        };
        let text = e.to_string();
        assert!(text.contains("/limits/cpu"));
        assert!(text.contains("nesting too deep"));
    }
}
