//! `PostgreSQL` implementation of the `SettlementRepository` trait.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::instrument;
use uuid::Uuid;

use quizarena_core::error::DomainError;
use quizarena_core::repository::{
    PayoutRecord, PayoutStatus, PotBreakdown, RankingRow, SettlementRepository, TournamentEntry,
    TournamentRecord,
};

use crate::schema::CREATE_SETTLEMENT_TABLES;

/// PostgreSQL-backed settlement repository.
#[derive(Debug, Clone)]
pub struct PgSettlementRepository {
    pool: PgPool,
}

impl PgSettlementRepository {
    /// Creates a new `PgSettlementRepository`.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the settlement tables when they do not exist yet.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::Infrastructure` if the DDL fails.
    pub async fn migrate(&self) -> Result<(), DomainError> {
        sqlx::raw_sql(CREATE_SETTLEMENT_TABLES)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}

fn db_error(err: sqlx::Error) -> DomainError {
    DomainError::Infrastructure(format!("database error: {err}"))
}

fn to_i64(value: u64, column: &str) -> Result<i64, DomainError> {
    i64::try_from(value)
        .map_err(|_| DomainError::Validation(format!("{column} out of range: {value}")))
}

fn to_u64(value: i64, column: &str) -> Result<u64, DomainError> {
    u64::try_from(value)
        .map_err(|_| DomainError::Infrastructure(format!("negative {column} in store: {value}")))
}

fn to_i32(value: u32, column: &str) -> Result<i32, DomainError> {
    i32::try_from(value)
        .map_err(|_| DomainError::Validation(format!("{column} out of range: {value}")))
}

fn payout_from_row(row: &PgRow) -> Result<PayoutRecord, DomainError> {
    let status: String = row.try_get("status").map_err(db_error)?;
    let rank: i32 = row.try_get("rank").map_err(db_error)?;
    let amount: i64 = row.try_get("amount").map_err(db_error)?;
    let Json(merkle_proof): Json<Vec<String>> = row.try_get("merkle_proof").map_err(db_error)?;
    Ok(PayoutRecord {
        id: row.try_get("id").map_err(db_error)?,
        tournament_id: row.try_get("tournament_id").map_err(db_error)?,
        participant_id: row.try_get("participant_id").map_err(db_error)?,
        rank: u32::try_from(rank)
            .map_err(|_| DomainError::Infrastructure(format!("negative rank in store: {rank}")))?,
        amount: to_u64(amount, "amount")?,
        tx_hash: row.try_get("tx_hash").map_err(db_error)?,
        merkle_proof,
        status: status.parse::<PayoutStatus>()?,
        explorer_url: row.try_get("explorer_url").map_err(db_error)?,
    })
}

const PAYOUT_COLUMNS: &str =
    "id, tournament_id, participant_id, rank, amount, tx_hash, merkle_proof, status, explorer_url";

#[async_trait]
impl SettlementRepository for PgSettlementRepository {
    #[instrument(skip(self, record), fields(tournament_id = %record.id))]
    async fn save_tournament(&self, record: &TournamentRecord) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO tournaments (id, buy_in, rake_bps, entries)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (id) DO UPDATE
             SET buy_in = EXCLUDED.buy_in, rake_bps = EXCLUDED.rake_bps, entries = EXCLUDED.entries",
        )
        .bind(record.id)
        .bind(to_i64(record.buy_in, "buy_in")?)
        .bind(to_i32(record.rake_bps, "rake_bps")?)
        .bind(Json(&record.entries))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load_tournament(
        &self,
        tournament_id: Uuid,
    ) -> Result<Option<TournamentRecord>, DomainError> {
        let row = sqlx::query("SELECT id, buy_in, rake_bps, entries FROM tournaments WHERE id = $1")
            .bind(tournament_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let buy_in: i64 = row.try_get("buy_in").map_err(db_error)?;
        let rake_bps: i32 = row.try_get("rake_bps").map_err(db_error)?;
        let Json(entries): Json<Vec<TournamentEntry>> =
            row.try_get("entries").map_err(db_error)?;

        Ok(Some(TournamentRecord {
            id: row.try_get("id").map_err(db_error)?,
            buy_in: to_u64(buy_in, "buy_in")?,
            rake_bps: u32::try_from(rake_bps).map_err(|_| {
                DomainError::Infrastructure(format!("negative rake_bps in store: {rake_bps}"))
            })?,
            entries,
        }))
    }

    #[instrument(skip(self, pot))]
    async fn persist_pot(
        &self,
        tournament_id: Uuid,
        pot: &PotBreakdown,
    ) -> Result<(), DomainError> {
        sqlx::query(
            "INSERT INTO pots (tournament_id, total_entries, gross_pot, rake_bps, rake, prize_pool)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (tournament_id) DO UPDATE
             SET total_entries = EXCLUDED.total_entries,
                 gross_pot = EXCLUDED.gross_pot,
                 rake_bps = EXCLUDED.rake_bps,
                 rake = EXCLUDED.rake,
                 prize_pool = EXCLUDED.prize_pool,
                 created_at = NOW()",
        )
        .bind(tournament_id)
        .bind(to_i64(pot.total_entries, "total_entries")?)
        .bind(to_i64(pot.gross_pot, "gross_pot")?)
        .bind(to_i32(pot.rake_bps, "rake_bps")?)
        .bind(to_i64(pot.rake, "rake")?)
        .bind(to_i64(pot.prize_pool, "prize_pool")?)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, ranking), fields(rows = ranking.len()))]
    async fn save_ranking(
        &self,
        tournament_id: Uuid,
        ranking: &[RankingRow],
    ) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for row in ranking {
            sqlx::query(
                "INSERT INTO rankings (tournament_id, participant_id, position, correct_count, avg_latency_ms)
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(tournament_id)
            .bind(&row.participant_id)
            .bind(to_i32(row.position, "position")?)
            .bind(to_i32(row.correct_count, "correct_count")?)
            .bind(to_i64(row.average_latency_ms, "avg_latency_ms")?)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self, payouts), fields(count = payouts.len()))]
    async fn create_payouts(&self, payouts: &[PayoutRecord]) -> Result<(), DomainError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        for payout in payouts {
            sqlx::query(
                "INSERT INTO payouts (id, tournament_id, participant_id, rank, amount, tx_hash, merkle_proof, status, explorer_url)
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            )
            .bind(&payout.id)
            .bind(payout.tournament_id)
            .bind(&payout.participant_id)
            .bind(to_i32(payout.rank, "rank")?)
            .bind(to_i64(payout.amount, "amount")?)
            .bind(payout.tx_hash.as_deref())
            .bind(Json(&payout.merkle_proof))
            .bind(payout.status.as_str())
            .bind(payout.explorer_url.as_deref())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }
        tx.commit().await.map_err(db_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_payouts(&self, tournament_id: Uuid) -> Result<Vec<PayoutRecord>, DomainError> {
        let sql = format!(
            "SELECT {PAYOUT_COLUMNS} FROM payouts WHERE tournament_id = $1 ORDER BY rank ASC"
        );
        let rows = sqlx::query(&sql)
            .bind(tournament_id)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        rows.iter().map(payout_from_row).collect()
    }

    #[instrument(skip(self))]
    async fn load_payout(&self, payout_id: &str) -> Result<Option<PayoutRecord>, DomainError> {
        let sql = format!("SELECT {PAYOUT_COLUMNS} FROM payouts WHERE id = $1");
        let row = sqlx::query(&sql)
            .bind(payout_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(payout_from_row).transpose()
    }

    #[instrument(skip(self))]
    async fn mark_payout_status(
        &self,
        payout_id: &str,
        status: PayoutStatus,
        tx_hash: Option<&str>,
        explorer_url: Option<&str>,
    ) -> Result<(), DomainError> {
        let result = sqlx::query(
            "UPDATE payouts
             SET status = $1,
                 tx_hash = COALESCE($2, tx_hash),
                 explorer_url = COALESCE($3, explorer_url)
             WHERE id = $4",
        )
        .bind(status.as_str())
        .bind(tx_hash)
        .bind(explorer_url)
        .bind(payout_id)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::not_found("payout", payout_id));
        }
        Ok(())
    }
}
