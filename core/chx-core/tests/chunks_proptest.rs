// Chunk condition property tests
//
// 생성된 조건들이 모든 값을 정확히 한 번씩 덮는지 검증

use chx_core::ChunksConditionBuilder;
use chx_core::chunks::ID_REPLACEMENT;
use proptest::prelude::*;

/// Evaluates `id <= N`, `id > N` and their `AND` for one value.
fn matches(condition: &str, value: i64) -> bool {
    condition.split(" AND ").all(|part| {
        if let Some(bound) = part.strip_prefix("id <= ") {
            value <= bound.parse::<i64>().unwrap()
        } else if let Some(bound) = part.strip_prefix("id > ") {
            value > bound.parse::<i64>().unwrap()
        } else {
            panic!("unexpected condition {part}")
        }
    })
}

/// Evaluates `modulo(cityHash64(id), P) = R` for a precomputed hash.
fn matches_modulo(condition: &str, hash: u64) -> bool {
    let rest = condition.strip_prefix("modulo(cityHash64(id), ").unwrap();
    let (parts, remainder) = rest.split_once(") = ").unwrap();
    hash % parts.parse::<u64>().unwrap() == remainder.parse::<u64>().unwrap()
}

proptest! {
    #[test]
    fn prop_chunks_cover_every_value_once(
        boundaries in prop::collection::btree_set(-1000i64..1000, 1..8),
        value in -1100i64..1100,
    ) {
        let boundaries: Vec<String> = boundaries.iter().map(i64::to_string).collect();
        let conditions = ChunksConditionBuilder::new()
            .by_chunks(&boundaries, "id", ID_REPLACEMENT)
            .unwrap();

        prop_assert_eq!(conditions.len(), boundaries.len() + 1);
        let hits = conditions.iter().filter(|c| matches(c, value)).count();
        prop_assert_eq!(hits, 1);
    }

    #[test]
    fn prop_modulo_covers_every_hash_once(parts in 2u32..32, hash in any::<u64>()) {
        let conditions = ChunksConditionBuilder::new().by_modulo(parts, "id").unwrap();

        prop_assert_eq!(conditions.len(), parts as usize);
        let hits = conditions.iter().filter(|c| matches_modulo(c, hash)).count();
        prop_assert_eq!(hits, 1);
    }
}
