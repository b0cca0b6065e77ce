use kardex_core::{DomainError, DomainResult};

/// Trim and collapse internal runs of whitespace to a single space.
pub(crate) fn collapse_whitespace(input: &str) -> String {
    input.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Collapse whitespace; blank input becomes `None`.
pub(crate) fn collapse_optional(input: Option<&str>) -> Option<String> {
    input.map(collapse_whitespace).filter(|s| !s.is_empty())
}

/// Character-count bounds check (inclusive).
pub(crate) fn check_length(
    field: &'static str,
    value: &str,
    min: usize,
    max: usize,
) -> DomainResult<()> {
    let len = value.chars().count();
    if len < min || len > max {
        return Err(DomainError::field(
            field,
            format!("must be between {min} and {max} characters (got {len})"),
        ));
    }
    Ok(())
}
