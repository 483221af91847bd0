//! Settlement database schema.

/// SQL to create the settlement tables.
pub const CREATE_SETTLEMENT_TABLES: &str = r"
CREATE TABLE IF NOT EXISTS tournaments (
    id          UUID PRIMARY KEY,
    buy_in      BIGINT NOT NULL,
    rake_bps    INTEGER NOT NULL,
    entries     JSONB NOT NULL,
    saved_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS pots (
    tournament_id UUID PRIMARY KEY,
    total_entries BIGINT NOT NULL,
    gross_pot     BIGINT NOT NULL,
    rake_bps      INTEGER NOT NULL,
    rake          BIGINT NOT NULL,
    prize_pool    BIGINT NOT NULL,
    created_at    TIMESTAMPTZ NOT NULL DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS rankings (
    tournament_id  UUID NOT NULL,
    participant_id TEXT NOT NULL,
    position       INTEGER NOT NULL,
    correct_count  INTEGER NOT NULL,
    avg_latency_ms BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_rankings_tournament_id
    ON rankings (tournament_id, position);

CREATE TABLE IF NOT EXISTS payouts (
    id             TEXT PRIMARY KEY,
    tournament_id  UUID NOT NULL,
    participant_id TEXT NOT NULL,
    rank           INTEGER NOT NULL,
    amount         BIGINT NOT NULL,
    tx_hash        TEXT,
    merkle_proof   JSONB NOT NULL DEFAULT '[]'::jsonb,
    status         TEXT NOT NULL,
    explorer_url   TEXT
);

CREATE INDEX IF NOT EXISTS idx_payouts_tournament_id
    ON payouts (tournament_id, rank);
";
