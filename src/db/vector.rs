/// Render an embedding as the `[f1,f2,...]` string literal pgvector expects
/// when cast with `$1::vector` ("embedding column is written
/// as `vector` by casting a string literal").
#[must_use]
pub fn to_pg_literal(embedding: &[f32]) -> String {
    let mut s = String::with_capacity(embedding.len() * 12 + 2);
    s.push('[');
    for (i, v) in embedding.iter().enumerate() {
        if i > 0 {
            s.push(',');
        }
        s.push_str(&v.to_string());
    }
    s.push(']');
    s
}

/// Parse a pgvector `[f1,f2,...]` text representation back into floats.
/// Used when a row is fetched with `embedding::text` for diagnostics; normal
/// retrieval never needs this because similarity is computed in SQL.
#[must_use]
pub fn from_pg_literal(text: &str) -> Vec<f32> {
    text.trim_start_matches('[')
        .trim_end_matches(']')
        .split(',')
        .filter(|s| !s.is_empty())
        .filter_map(|s| s.parse::<f32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_literal() {
        let v = vec![0.1_f32, -0.25, 3.0];
        let lit = to_pg_literal(&v);
        assert_eq!(lit, "[0.1,-0.25,3]");
        let parsed = from_pg_literal(&lit);
        assert_eq!(parsed.len(), 3);
        assert!((parsed[0] - 0.1).abs() < 1e-6);
        assert!((parsed[1] + 0.25).abs() < 1e-6);
    }

    #[test]
    fn empty_vector() {
        assert_eq!(to_pg_literal(&[]), "[]");
        assert!(from_pg_literal("[]").is_empty());
    }
}
