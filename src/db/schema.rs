use anyhow::Context;
use sqlx::PgPool;

/// Core entity tables: users, personas, personalities, prompts, configs.
const CREATE_CORE_TABLES: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    platform_id   TEXT NOT NULL UNIQUE,
    display_handle TEXT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE UNIQUE INDEX IF NOT EXISTS users_username_lower_idx ON users (lower(display_handle));

CREATE TABLE IF NOT EXISTS personas (
    id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id        UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    preferred_name TEXT NOT NULL,
    pronouns       TEXT,
    bio            TEXT
);

CREATE TABLE IF NOT EXISTS system_prompts (
    id         UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name       TEXT NOT NULL,
    content    TEXT NOT NULL,
    is_default BOOLEAN NOT NULL DEFAULT false
);
CREATE UNIQUE INDEX IF NOT EXISTS idx_system_prompts_default
    ON system_prompts ((is_default)) WHERE is_default = true;

CREATE TABLE IF NOT EXISTS llm_configs (
    id                  UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    name                TEXT NOT NULL,
    model               TEXT NOT NULL,
    vision_model        TEXT,
    owner_user_id       UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    is_global           BOOLEAN NOT NULL DEFAULT false,
    is_default          BOOLEAN NOT NULL DEFAULT false,
    advanced_parameters JSONB NOT NULL DEFAULT '{}'::jsonb
);
CREATE UNIQUE INDEX IF NOT EXISTS unique_default_llm_config
    ON llm_configs ((is_default)) WHERE is_default = true;

CREATE TABLE IF NOT EXISTS personalities (
    id                   UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    owner_user_id        UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    slug                 TEXT NOT NULL UNIQUE,
    display_name         TEXT NOT NULL,
    avatar_ref           TEXT NOT NULL,
    system_prompt_id     UUID REFERENCES system_prompts(id) ON DELETE SET NULL,
    default_llm_config_id UUID NOT NULL REFERENCES llm_configs(id),
    context_overrides    JSONB NOT NULL DEFAULT '{}'::jsonb
);

CREATE TABLE IF NOT EXISTS personality_aliases (
    alias          TEXT PRIMARY KEY,
    personality_id UUID NOT NULL REFERENCES personalities(id) ON DELETE CASCADE
);

CREATE TABLE IF NOT EXISTS user_personality_configs (
    user_id            UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    personality_id     UUID NOT NULL REFERENCES personalities(id) ON DELETE CASCADE,
    persona_override   UUID REFERENCES personas(id) ON DELETE SET NULL,
    llm_config_override UUID REFERENCES llm_configs(id) ON DELETE SET NULL,
    config_overrides   JSONB NOT NULL DEFAULT '{}'::jsonb,
    PRIMARY KEY (user_id, personality_id)
);

CREATE TABLE IF NOT EXISTS activated_channels (
    channel_id     TEXT NOT NULL,
    guild_id       TEXT,
    personality_id UUID NOT NULL REFERENCES personalities(id) ON DELETE CASCADE,
    PRIMARY KEY (channel_id)
);

CREATE TABLE IF NOT EXISTS denylisted_entities (
    entity_type TEXT NOT NULL,
    discord_id  TEXT NOT NULL,
    scope       TEXT NOT NULL,
    scope_id    TEXT,
    UNIQUE (entity_type, discord_id, scope, scope_id)
);
";

/// Conversation history, append-only with tombstones.
const CREATE_CONVERSATION_TABLES: &str = "
CREATE TABLE IF NOT EXISTS conversation_turns (
    id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    channel_id     TEXT NOT NULL,
    guild_id       TEXT,
    personality_id UUID NOT NULL REFERENCES personalities(id) ON DELETE CASCADE,
    persona_id     UUID NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
    role           TEXT NOT NULL,
    content        TEXT NOT NULL,
    token_count    INTEGER,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_turns_channel_personality_created
    ON conversation_turns (channel_id, personality_id, created_at DESC);

-- Intentionally FK-free: a tombstone must outlive the turn it marks.
CREATE TABLE IF NOT EXISTS conversation_tombstones (
    turn_id    UUID PRIMARY KEY,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

/// Memory table plus its protected HNSW vector index and partial chunk-group
/// index. These two indexes sit outside the ordinary migration-drift model
/// () — the migration tool must never generate a DROP for
/// either, because neither is expressible in the declarative schema model
/// it diffs against (HNSW opclass, partial WHERE clause).
const CREATE_MEMORY_TABLES: &str = "
CREATE TABLE IF NOT EXISTS memories (
    id              UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    persona_id      UUID NOT NULL REFERENCES personas(id) ON DELETE CASCADE,
    personality_id  UUID REFERENCES personalities(id) ON DELETE CASCADE,
    content         TEXT NOT NULL,
    embedding       vector(1536) NOT NULL,
    channel_id      TEXT,
    guild_id        TEXT,
    chunk_group_id  UUID,
    chunk_index     INTEGER,
    total_chunks    INTEGER,
    source          TEXT NOT NULL,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE TABLE IF NOT EXISTS pending_memories (
    id            UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    turn_id       UUID NOT NULL REFERENCES conversation_turns(id) ON DELETE CASCADE,
    attempt_count INTEGER NOT NULL DEFAULT 0,
    last_error    TEXT,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

/// Raw DDL for the protected indexes. Kept apart from `CREATE_MEMORY_TABLES`
/// so the protected-index allow-list (`PROTECTED_INDEXES`) can name them
/// exactly and the migration tool can strip them from generated diffs.
const CREATE_PROTECTED_INDEXES: &str = "
CREATE INDEX IF NOT EXISTS memories_embedding_hnsw_idx
    ON memories USING hnsw (embedding vector_cosine_ops)
    WITH (m = 16, ef_construction = 64);

CREATE INDEX IF NOT EXISTS memories_chunk_group_id_idx
    ON memories (chunk_group_id) WHERE chunk_group_id IS NOT NULL;
";

const CREATE_DIAGNOSTIC_TABLES: &str = "
CREATE TABLE IF NOT EXISTS llm_diagnostic_logs (
    id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_id  UUID NOT NULL,
    message_id  TEXT,
    model       TEXT NOT NULL,
    provider    TEXT NOT NULL,
    duration_ms BIGINT NOT NULL,
    payload     JSONB NOT NULL,
    created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_diagnostic_logs_created ON llm_diagnostic_logs (created_at);
CREATE INDEX IF NOT EXISTS idx_diagnostic_logs_message ON llm_diagnostic_logs (message_id);

CREATE TABLE IF NOT EXISTS usage_logs (
    id             UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    user_id        UUID NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    provider       TEXT NOT NULL,
    input_tokens   BIGINT NOT NULL,
    output_tokens  BIGINT NOT NULL,
    created_at     TIMESTAMPTZ NOT NULL DEFAULT now()
);
";

/// Names of indexes the migration tool must never drop as drift, because
/// they use features (HNSW opclass, partial WHERE) outside the declarative
/// schema generator's model. See `CREATE_PROTECTED_INDEXES`.
pub const PROTECTED_INDEXES: &[&str] = &["memories_embedding_hnsw_idx", "memories_chunk_group_id_idx"];

/// Initialise the full schema. All statements are `IF NOT EXISTS`, so this
/// is safe to call on every process start.
pub async fn init_schema(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::raw_sql("CREATE EXTENSION IF NOT EXISTS vector;")
        .execute(pool)
        .await
        .context("enable pgvector extension")?;
    sqlx::raw_sql("CREATE EXTENSION IF NOT EXISTS pgcrypto;")
        .execute(pool)
        .await
        .context("enable pgcrypto extension (gen_random_uuid)")?;

    sqlx::raw_sql(CREATE_CORE_TABLES)
        .execute(pool)
        .await
        .context("create core entity tables")?;

    sqlx::raw_sql(CREATE_CONVERSATION_TABLES)
        .execute(pool)
        .await
        .context("create conversation tables")?;

    sqlx::raw_sql(CREATE_MEMORY_TABLES)
        .execute(pool)
        .await
        .context("create memory tables")?;

    sqlx::raw_sql(CREATE_PROTECTED_INDEXES)
        .execute(pool)
        .await
        .context("create protected vector/chunk-group indexes")?;

    sqlx::raw_sql(CREATE_DIAGNOSTIC_TABLES)
        .execute(pool)
        .await
        .context("create diagnostic/usage log tables")?;

    Ok(())
}

/// Guard used by the (external, out-of-core) migration tool: refuse to drop
/// any index named in `PROTECTED_INDEXES` regardless of what drift detection
/// reports.
#[must_use]
pub fn is_protected_index(index_name: &str) -> bool {
    PROTECTED_INDEXES.contains(&index_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protected_indexes_cover_vector_and_chunk_group() {
        assert!(is_protected_index("memories_embedding_hnsw_idx"));
        assert!(is_protected_index("memories_chunk_group_id_idx"));
        assert!(!is_protected_index("idx_turns_channel_personality_created"));
    }

    // Schema application against a live Postgres+pgvector instance is
    // exercised in tests/db_schema.rs (#[ignore] — requires DATABASE_URL).
}
