//! Chunk condition builder
//!
//! Splits one heavy query into disjoint sub-queries. Each returned string is an
//! extra `WHERE` condition; together they cover every row exactly once.
//!
//! - [`ChunksConditionBuilder::by_chunks`] uses ready-made boundaries (e.g. quantiles
//!   from [`Table::get_chunks_ids`](crate::Table::get_chunks_ids))
//! - [`ChunksConditionBuilder::by_modulo`] relies on `cityHash64` being evenly distributed

use crate::error::{ChxError, ChxResult};

/// Boundary placeholder inside a replacement template
pub const ID_REPLACEMENT: &str = "%";

#[derive(Debug, Clone, Copy, Default)]
pub struct ChunksConditionBuilder;

impl ChunksConditionBuilder {
    pub fn new() -> Self {
        Self
    }

    /// N boundaries → N+1 conditions.
    ///
    /// `replacement` wraps each boundary, `%` standing for the boundary itself
    /// (`"'%'"` quotes string ids, `"%"` keeps numbers bare).
    pub fn by_chunks<S: AsRef<str>>(
        &self,
        chunks: &[S],
        field: &str,
        replacement: &str,
    ) -> ChxResult<Vec<String>> {
        if chunks.is_empty() {
            return Err(ChxError::InvalidArguments(
                "chunks must contain at least one boundary".to_string(),
            ));
        }
        if !replacement.contains(ID_REPLACEMENT) {
            return Err(ChxError::InvalidArguments(format!(
                "replacement must contain '{ID_REPLACEMENT}'"
            )));
        }

        let bound = |chunk: &S| replacement.replace(ID_REPLACEMENT, chunk.as_ref());

        let mut result = Vec::with_capacity(chunks.len() + 1);
        result.push(format!("{field} <= {}", bound(&chunks[0])));
        for pair in chunks.windows(2) {
            result.push(format!(
                "{field} > {} AND {field} <= {}",
                bound(&pair[0]),
                bound(&pair[1])
            ));
        }
        result.push(format!("{field} > {}", bound(&chunks[chunks.len() - 1])));
        Ok(result)
    }

    /// `modulo(cityHash64(field), parts) = r` for every remainder.
    pub fn by_modulo(&self, parts: u32, field: &str) -> ChxResult<Vec<String>> {
        if parts <= 1 {
            return Err(ChxError::InvalidArguments(
                "parts count must be greater than 1".to_string(),
            ));
        }
        Ok((0..parts)
            .map(|remainder| format!("modulo(cityHash64({field}), {parts}) = {remainder}"))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_boundary() {
        let conditions = ChunksConditionBuilder::new()
            .by_chunks(&["234"], "id", ID_REPLACEMENT)
            .unwrap();
        assert_eq!(conditions, vec!["id <= 234", "id > 234"]);
    }

    #[test]
    fn test_quoted_boundaries() {
        let conditions = ChunksConditionBuilder::new()
            .by_chunks(&["a", "b"], "sku", "'%'")
            .unwrap();
        assert_eq!(
            conditions,
            vec!["sku <= 'a'", "sku > 'a' AND sku <= 'b'", "sku > 'b'"]
        );
    }

    #[test]
    fn test_invalid_chunk_arguments() {
        let builder = ChunksConditionBuilder::new();
        assert!(builder.by_chunks::<&str>(&[], "id", "%").is_err());
        assert!(builder.by_chunks(&["1"], "id", "x").is_err());
    }

    #[test]
    fn test_modulo() {
        let conditions = ChunksConditionBuilder::new().by_modulo(3, "productId").unwrap();
        assert_eq!(
            conditions,
            vec![
                "modulo(cityHash64(productId), 3) = 0",
                "modulo(cityHash64(productId), 3) = 1",
                "modulo(cityHash64(productId), 3) = 2",
            ]
        );
        assert!(ChunksConditionBuilder::new().by_modulo(1, "id").is_err());
        assert!(ChunksConditionBuilder::new().by_modulo(0, "id").is_err());
    }
}
