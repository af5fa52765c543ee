use crate::db::models::ScoredMemory;
use crate::db::repository::MemoryRepository;
use crate::error::DbError;
use std::collections::HashSet;
use uuid::Uuid;

/// A memory ready for prompt injection: either a standalone memory or a
/// fully reassembled chunk group — chunked memories are either fully
/// present or fully absent, never partially injected.
#[derive(Debug, Clone)]
pub struct ReassembledMemory {
    pub content: String,
    pub distance: f32,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Reassemble every chunked memory in the retrieved set by fetching its
/// siblings and concatenating them in `chunk_index` order, deduplicating
/// groups that appear more than once among the top-K hits.
pub async fn reassemble(
    repo: &MemoryRepository<'_>,
    scored: Vec<ScoredMemory>,
) -> Result<Vec<ReassembledMemory>, DbError> {
    let mut seen_groups: HashSet<Uuid> = HashSet::new();
    let mut out = Vec::with_capacity(scored.len());

    for sm in scored {
        match sm.memory.chunk_group_id {
            Some(group_id) => {
                if !seen_groups.insert(group_id) {
                    continue;
                }
                let siblings = repo.chunk_group_siblings(group_id).await?;
                let content = siblings
                    .iter()
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("");
                out.push(ReassembledMemory {
                    content,
                    distance: sm.distance,
                    created_at: sm.memory.created_at,
                });
            }
            None => out.push(ReassembledMemory {
                content: sm.memory.content,
                distance: sm.distance,
                created_at: sm.memory.created_at,
            }),
        }
    }

    Ok(out)
}

/// Sort ascending by distance (closest first) — the order memories should
/// be presented in the "Relevant Memories" prompt section.
#[must_use]
pub fn sort_by_relevance(mut memories: Vec<ReassembledMemory>) -> Vec<ReassembledMemory> {
    memories.sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap_or(std::cmp::Ordering::Equal));
    memories
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn mem(content: &str, distance: f32) -> ReassembledMemory {
        ReassembledMemory {
            content: content.to_string(),
            distance,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn sort_orders_closest_first() {
        let memories = vec![mem("far", 0.9), mem("close", 0.1), mem("mid", 0.5)];
        let sorted = sort_by_relevance(memories);
        assert_eq!(sorted[0].content, "close");
        assert_eq!(sorted[1].content, "mid");
        assert_eq!(sorted[2].content, "far");
    }
}
