//! Grammar for vote comments.
//!
//! ```text
//! ballot := ws* "Vote:" ws* "Logo" ws* digit+ any*
//! ```
//!
//! Matching is case sensitive and anchored at the start of the trimmed body.
//! Text after the number is ignored.

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BallotError {
    /// The body does not start with `Vote: Logo <digits>`.
    InvalidFormat,
    /// The digits do not fit a logo number; carries them verbatim.
    NumberOutOfRange(String),
}

pub fn parse_ballot(body: &str) -> Result<u32, BallotError> {
    let rest = body
        .trim()
        .strip_prefix("Vote:")
        .ok_or(BallotError::InvalidFormat)?
        .trim_start()
        .strip_prefix("Logo")
        .ok_or(BallotError::InvalidFormat)?
        .trim_start();

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let digits = &rest[..digits_end];
    if digits.is_empty() {
        return Err(BallotError::InvalidFormat);
    }
    digits
        .parse()
        .map_err(|_| BallotError::NumberOutOfRange(digits.to_string()))
}

/// First `max_chars` characters of `text`, with `***` appended when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}***", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_ballot() {
        assert_eq!(parse_ballot("Vote: Logo 1"), Ok(1));
        assert_eq!(parse_ballot("  Vote: Logo 42  \n"), Ok(42));
    }

    #[test]
    fn test_whitespace_is_optional() {
        assert_eq!(parse_ballot("Vote:Logo7"), Ok(7));
        assert_eq!(parse_ballot("Vote:\tLogo\n  12"), Ok(12));
    }

    #[test]
    fn test_trailing_text_is_ignored() {
        assert_eq!(parse_ballot("Vote: Logo 3 because it is round"), Ok(3));
        assert_eq!(parse_ballot("Vote: Logo 3!"), Ok(3));
    }

    #[test]
    fn test_free_text_is_invalid() {
        assert_eq!(parse_ballot("I like logo 1 best"), Err(BallotError::InvalidFormat));
        assert_eq!(parse_ballot("vote: logo 1"), Err(BallotError::InvalidFormat));
        assert_eq!(parse_ballot("Please Vote: Logo 1"), Err(BallotError::InvalidFormat));
        assert_eq!(parse_ballot("Vote: Logo"), Err(BallotError::InvalidFormat));
        assert_eq!(parse_ballot("Vote: Logo -1"), Err(BallotError::InvalidFormat));
        assert_eq!(parse_ballot(""), Err(BallotError::InvalidFormat));
    }

    #[test]
    fn test_huge_number_is_kept_verbatim() {
        assert_eq!(
            parse_ballot("Vote: Logo 99999999999"),
            Err(BallotError::NumberOutOfRange("99999999999".to_string()))
        );
    }

    #[test]
    fn test_excerpt() {
        assert_eq!(excerpt("short", 15), "short");
        assert_eq!(excerpt("exactly fifteen", 15), "exactly fifteen");
        assert_eq!(excerpt("I like logo 1 best", 15), "I like logo 1 b***");
        assert_eq!(excerpt("ééééé", 2), "éé***");
    }
}
