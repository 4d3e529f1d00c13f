//! Identity normalisation for operator-entered UUIDs.
//!
//! The feed mixes the canonical hyphenated form
//! (`c0b075fa-049d-49ec-879e-45e5f0e66b08`) with the bare 32-hex form
//! (`c0b075fa049d49ec879e45e5f0e66b08`). Bare strings are re-hyphenated at
//! offsets 8, 12, 16, 20 before parsing.

use thiserror::Error;
use uuid::Uuid;

const HYPHENATED_LEN: usize = 36;
const BARE_LEN: usize = 32;
const GROUP_OFFSETS: [usize; 4] = [8, 12, 16, 20];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid uuid - {0}")]
pub struct IdentityError(pub String);

/// Parse a hyphenated or bare-hex identity.
pub fn parse_identity(raw: &str) -> Result<Uuid, IdentityError> {
    let raw = raw.trim();
    let hyphenated = if raw.contains('-') {
        if raw.len() != HYPHENATED_LEN {
            return Err(IdentityError(raw.to_string()));
        }
        raw.to_string()
    } else {
        if raw.len() != BARE_LEN || !raw.is_ascii() {
            return Err(IdentityError(raw.to_string()));
        }
        hyphenate(raw)
    };

    Uuid::try_parse(&hyphenated).map_err(|_| IdentityError(raw.to_string()))
}

/// Insert hyphens into an ASCII 32-character string.
fn hyphenate(bare: &str) -> String {
    let mut out = String::with_capacity(HYPHENATED_LEN);
    let mut start = 0;
    for offset in GROUP_OFFSETS {
        out.push_str(&bare[start..offset]);
        out.push('-');
        start = offset;
    }
    out.push_str(&bare[start..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    const HYPHENATED: &str = "c0b075fa-049d-49ec-879e-45e5f0e66b08";
    const BARE: &str = "c0b075fa049d49ec879e45e5f0e66b08";

    #[test]
    fn bare_and_hyphenated_are_the_same_identity() {
        assert_eq!(parse_identity(BARE).unwrap(), parse_identity(HYPHENATED).unwrap());
    }

    #[test]
    fn hyphenate_offsets() {
        assert_eq!(hyphenate(BARE), HYPHENATED);
    }

    #[test]
    fn uppercase_accepted() {
        assert_eq!(
            parse_identity(&BARE.to_ascii_uppercase()).unwrap(),
            parse_identity(HYPHENATED).unwrap()
        );
    }

    #[test]
    fn surrounding_whitespace_ignored() {
        assert!(parse_identity("  c0b075fa049d49ec879e45e5f0e66b08 ").is_ok());
    }

    #[test]
    fn rejects_wrong_length() {
        assert!(parse_identity("c0b075fa049d49ec879e45e5f0e66b0").is_err());
        assert!(parse_identity("c0b075fa-049d-49ec-879e-45e5f0e66b0").is_err());
        assert!(parse_identity("").is_err());
    }

    #[test]
    fn rejects_non_hex() {
        let err = parse_identity("z0b075fa049d49ec879e45e5f0e66b08").unwrap_err();
        assert_eq!(err.to_string(), "invalid uuid - z0b075fa049d49ec879e45e5f0e66b08");
    }

    #[test]
    fn rejects_misplaced_hyphens() {
        assert!(parse_identity("c0b075fa0-49d-49ec-879e-45e5f0e66b08").is_err());
    }

    #[test]
    fn rejects_multibyte_without_panicking() {
        assert!(parse_identity(&"é".repeat(16)).is_err());
    }
}
