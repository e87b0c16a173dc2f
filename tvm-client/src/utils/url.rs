//! URL path helpers

/// Join URL path parts with single slashes.
///
/// Leading and trailing slashes of every part are dropped, empty parts are
/// skipped, and a leading slash on the first part is kept.
///
/// ```text
/// join(&["https://tvm.example.com/", "/aws/s3", "ns"]) -> "https://tvm.example.com/aws/s3/ns"
/// ```
pub fn join(parts: &[&str]) -> String {
    let start = if parts.first().is_some_and(|p| p.starts_with('/')) {
        "/"
    } else {
        ""
    };

    let joined = parts
        .iter()
        .map(|p| p.trim_matches('/'))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    format!("{start}{joined}")
}
