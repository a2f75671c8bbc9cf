/// An identifier located in a host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedId {
    /// Store key: the leading characters of the identifier label.
    pub correlation_id: String,
    /// The identifier label itself.
    pub unique_id: String,
    /// Every label from the start of the host up to and including the identifier.
    pub full_id: String,
}
