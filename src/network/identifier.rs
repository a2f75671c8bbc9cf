//! Correlation identifier embedding in host names.
//!
//! Clients build probe hosts such as `extra.<33-char id>.oast.example`. The
//! identifier is the only label of exactly [`IDENTIFIER_WIDTH`] bytes, which
//! keeps it easy to locate no matter how many routing labels precede it. The
//! first [`CORRELATION_ID_WIDTH`] bytes of that label are the key the store
//! files interactions under.

use super::types::ExtractedId;

/// Width in bytes of the label that carries an embedded identifier.
pub const IDENTIFIER_WIDTH: usize = 33;

/// Number of leading identifier bytes used as the store key.
pub const CORRELATION_ID_WIDTH: usize = 20;

/// Locates the identifier label in `host`, if any.
///
/// When several labels have the identifier width the last one wins, and the
/// full id covers every label up to and including it. A label whose key
/// prefix would split a multi-byte character carries no usable key.
pub fn extract_identifier(host: &str) -> Option<ExtractedId> {
    let labels: Vec<&str> = host.split('.').collect();
    let index = find_identifier_label(&labels)?;
    let unique_id = labels[index];
    let correlation_id = unique_id.get(..CORRELATION_ID_WIDTH)?;

    Some(ExtractedId {
        correlation_id: correlation_id.to_string(),
        unique_id: unique_id.to_string(),
        full_id: labels[..=index].join("."),
    })
}

/// Returns the identifier label of `host` reversed, or an empty string when
/// the host carries no identifier.
pub fn reflect(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    match find_identifier_label(&labels) {
        Some(index) => labels[index].chars().rev().collect(),
        None => String::new(),
    }
}

fn find_identifier_label(labels: &[&str]) -> Option<usize> {
    labels
        .iter()
        .rposition(|label| label.len() == IDENTIFIER_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id_label(c: char) -> String {
        std::iter::repeat(c).take(IDENTIFIER_WIDTH).collect()
    }

    #[test]
    fn key_prefix_is_measured_in_bytes() {
        // 2 + 31 bytes; the key is the first 20 bytes, i.e. 19 chars.
        let label = format!("é{}", "a".repeat(31));
        assert_eq!(label.len(), IDENTIFIER_WIDTH);

        let extracted = extract_identifier(&format!("{}.example.com", label)).unwrap();
        assert_eq!(extracted.correlation_id, format!("é{}", "a".repeat(18)));
        assert_eq!(extracted.correlation_id.len(), CORRELATION_ID_WIDTH);
    }

    #[test]
    fn key_prefix_splitting_a_char_is_rejected() {
        // Bytes 19 and 20 hold 'é', so a 20-byte prefix would cut it in half.
        let label = format!("{}é{}", "a".repeat(19), "a".repeat(12));
        assert_eq!(label.len(), IDENTIFIER_WIDTH);
        assert!(extract_identifier(&format!("{}.example.com", label)).is_none());
    }

    #[test]
    fn extracts_leading_identifier() {
        let label = id_label('a');
        let host = format!("{}.example.com", label);

        let extracted = extract_identifier(&host).expect("identifier present");
        assert_eq!(extracted.correlation_id, "a".repeat(CORRELATION_ID_WIDTH));
        assert_eq!(extracted.full_id, label);
        assert_eq!(extracted.unique_id, label);
    }

    #[test]
    fn full_id_keeps_preceding_labels() {
        let label = id_label('b');
        let host = format!("x.{}.example.com", label);

        let extracted = extract_identifier(&host).expect("identifier present");
        assert_eq!(extracted.full_id, format!("x.{}", label));
        assert_eq!(extracted.correlation_id.len(), CORRELATION_ID_WIDTH);
    }

    #[test]
    fn no_identifier_width_label() {
        assert!(extract_identifier("www.example.com").is_none());
        assert!(extract_identifier("").is_none());
    }

    #[test]
    fn width_must_match_exactly() {
        let short = "c".repeat(IDENTIFIER_WIDTH - 1);
        let long = "c".repeat(IDENTIFIER_WIDTH + 1);
        assert!(extract_identifier(&format!("{}.example.com", short)).is_none());
        assert!(extract_identifier(&format!("{}.example.com", long)).is_none());
        assert_eq!(reflect(&format!("{}.example.com", long)), "");
    }

    #[test]
    fn last_matching_label_wins() {
        let first = id_label('d');
        let second = id_label('e');
        let host = format!("{}.mid.{}.example.com", first, second);

        let extracted = extract_identifier(&host).expect("identifier present");
        assert_eq!(extracted.unique_id, second);
        assert_eq!(extracted.full_id, format!("{}.mid.{}", first, second));
        assert_eq!(reflect(&host), second);
    }

    #[test]
    fn reflection_reverses_identifier() {
        let label = "abcdefghijklmnopqrstuvwxyz0123456";
        assert_eq!(label.len(), IDENTIFIER_WIDTH);

        let host = format!("{}.oast.example", label);
        assert_eq!(reflect(&host), "6543210zyxwvutsrqponmlkjihgfedcba");
    }

    #[test]
    fn reflection_empty_without_identifier() {
        assert_eq!(reflect("oast.example"), "");
    }
}
