//! The ciphertext marker appended to every value this system encrypts.
//!
//! A stored field value has the shape:
//!
//! ```text
//! <backend-specific ciphertext encoding><ENC>
//! ```
//!
//! A value ends with [`ENCRYPTION_MARKER`] if and only if it was produced by the
//! encrypt path and has not been decrypted since. Plaintext values must not end
//! with this literal: such a value is taken for ciphertext and handed to the
//! cipher on decrypt, which then fails.

/// Literal suffix tagging ciphertext produced by the encrypt path.
pub const ENCRYPTION_MARKER: &str = "<ENC>";

/// Returns `true` if `value` carries the marker suffix.
pub fn is_marked(value: &str) -> bool {
    value.ends_with(ENCRYPTION_MARKER)
}

/// Append the marker to backend ciphertext.
pub fn seal(mut ciphertext: String) -> String {
    ciphertext.push_str(ENCRYPTION_MARKER);
    ciphertext
}

/// Strip the marker, returning the backend ciphertext.
///
/// Returns `None` when `value` is not marked, i.e. it is plaintext that was
/// never encrypted or has already been decrypted.
pub fn unseal(value: &str) -> Option<&str> {
    value.strip_suffix(ENCRYPTION_MARKER)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_appends_marker() {
        let sealed = seal("v1.abc.def".into());
        assert_eq!(sealed, "v1.abc.def<ENC>");
        assert!(is_marked(&sealed));
    }

    #[test]
    fn unseal_strips_exactly_one_marker() {
        assert_eq!(unseal("abc<ENC>"), Some("abc"));
        assert_eq!(unseal("abc<ENC><ENC>"), Some("abc<ENC>"));
    }

    #[test]
    fn unmarked_values_are_left_alone() {
        assert_eq!(unseal("plain"), None);
        assert_eq!(unseal("<ENC>plain"), None);
        assert!(!is_marked("encrypted-David"));
    }

    #[test]
    fn bare_marker_unseals_to_empty_ciphertext() {
        assert_eq!(unseal(ENCRYPTION_MARKER), Some(""));
    }
}
