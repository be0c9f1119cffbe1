//! Database layer: migrations, queries, and cursor management.

use std::str::FromStr;

use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Acquire, Sqlite, SqlitePool,
};
use tracing::info;

use crate::errors::{IndexerError, Result};
use crate::events::{DaoEvent, EventKind, EventRecord, ProposalDetails};
use crate::proposal::{parse_amount, ProposalRow, ProposalSnapshot, ProposalStatus};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };

    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Cursor helpers
// ─────────────────────────────────────────────────────────

/// Read the last-seen ledger from the cursor row.
/// Returns `0` when no cursor has been persisted yet.
pub async fn get_last_ledger(pool: &SqlitePool) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT last_ledger FROM indexer_cursor WHERE id = 1")
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|(v,)| v).unwrap_or(0))
}

/// Persist the last-seen ledger (and optionally a pagination cursor string).
pub async fn save_cursor(
    pool: &SqlitePool,
    last_ledger: i64,
    last_cursor: Option<&str>,
) -> Result<()> {
    sqlx::query("UPDATE indexer_cursor SET last_ledger = ?1, last_cursor = ?2 WHERE id = 1")
        .bind(last_ledger)
        .bind(last_cursor)
        .execute(pool)
        .await?;
    Ok(())
}

/// Read back the raw cursor string (used to resume pagination mid-ledger).
pub async fn get_cursor_string(pool: &SqlitePool) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> =
        sqlx::query_as("SELECT last_cursor FROM indexer_cursor WHERE id = 1")
            .fetch_optional(pool)
            .await?;
    Ok(row.and_then(|(v,)| v))
}

// ─────────────────────────────────────────────────────────
// Event writes
// ─────────────────────────────────────────────────────────

/// Persist one decoded event. Returns `false` if it was already stored.
///
/// Events already stored (same RPC event id, or same
/// `(ledger, tx_hash, event_type, proposal_id, actor)` tuple) are silently
/// ignored to make the indexer idempotent. Runs on whatever connection or
/// transaction the caller passes, so the insert can share a transaction with
/// the projection it feeds.
pub fn insert_event<'a, 'c, A>(conn: A, ev: &'a DaoEvent) -> impl std::future::Future<Output = Result<bool>> + Send + 'a
where
    A: Acquire<'c, Database = Sqlite> + Send + 'a,
    'c: 'a,
{
    async move {
        let mut conn = conn.acquire().await?;
        let payload = ev.details.as_ref().map(serde_json::to_string).transpose()?;
        let rows_affected = sqlx::query(
            r#"
        INSERT OR IGNORE INTO events
            (event_id, event_type, proposal_id, actor, amount, support, payload,
             ledger, timestamp, contract_id, tx_hash)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        )
        .bind(&ev.event_id)
        .bind(ev.kind.as_str())
        .bind(ev.proposal_id.map(|id| id.to_string()))
        .bind(&ev.actor)
        .bind(&ev.amount)
        .bind(ev.support)
        .bind(payload)
        .bind(ev.ledger)
        .bind(ev.timestamp)
        .bind(&ev.contract_id)
        .bind(&ev.tx_hash)
        .execute(&mut *conn)
        .await?
        .rows_affected();

        Ok(rows_affected > 0)
    }
}

// ─────────────────────────────────────────────────────────
// Event reads
// ─────────────────────────────────────────────────────────

const EVENT_COLUMNS: &str = "id, event_id, event_type, proposal_id, actor, amount, support, \
                             payload, ledger, timestamp, contract_id, tx_hash, created_at";

/// Fetch all events for a given proposal, ordered by ledger ascending.
pub async fn get_events_for_proposal(
    pool: &SqlitePool,
    proposal_id: &str,
) -> Result<Vec<EventRecord>> {
    let sql = format!(
        "SELECT {EVENT_COLUMNS} FROM events WHERE proposal_id = ?1 ORDER BY ledger ASC, id ASC"
    );
    let rows = sqlx::query_as::<_, EventRecord>(&sql)
        .bind(proposal_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Fetch all events, ordered by ledger ascending.
pub async fn get_all_events(pool: &SqlitePool) -> Result<Vec<EventRecord>> {
    let sql = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY ledger ASC, id ASC");
    let rows = sqlx::query_as::<_, EventRecord>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Treasury balance as of the last indexed ledger: deposits minus releases.
///
/// Only the DAO's own events are counted, so plain token transfers to the
/// contract are missed. Serves as the fallback when the live read fails.
pub async fn treasury_balance(pool: &SqlitePool) -> Result<i128> {
    let rows: Vec<(String, Option<String>)> = sqlx::query_as(
        "SELECT event_type, amount FROM events WHERE event_type IN (?1, ?2)",
    )
    .bind(EventKind::TreasuryDeposit.as_str())
    .bind(EventKind::FundsReleased.as_str())
    .fetch_all(pool)
    .await?;

    let mut balance: i128 = 0;
    for (event_type, amount) in rows {
        let amount = match amount.as_deref() {
            Some(raw) => parse_amount(raw)?,
            None => continue,
        };
        let next = if event_type == EventKind::TreasuryDeposit.as_str() {
            balance.checked_add(amount)
        } else {
            balance.checked_sub(amount)
        };
        balance = next.ok_or_else(|| {
            IndexerError::Decode("indexed treasury balance overflows i128".to_string())
        })?;
    }
    Ok(balance)
}

// ─────────────────────────────────────────────────────────
// Projection writes
// ─────────────────────────────────────────────────────────

pub fn upsert_proposal_created<'a, 'c, A>(
    conn: A,
    id: u64,
    proposer: Option<&'a str>,
    requested_amount: Option<&'a str>,
    ledger: i64,
) -> impl std::future::Future<Output = Result<()>> + Send + 'a
where
    A: Acquire<'c, Database = Sqlite> + Send + 'a,
    'c: 'a,
{
    async move {
        let mut conn = conn.acquire().await?;
        sqlx::query(
            r#"
        INSERT INTO proposals (id, proposer, requested_amount, created_ledger, updated_ledger)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT(id) DO UPDATE SET
            proposer = excluded.proposer,
            requested_amount = excluded.requested_amount,
            created_ledger = excluded.created_ledger
        "#,
        )
        .bind(id as i64)
        .bind(proposer)
        .bind(requested_amount)
        .bind(ledger)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// `jobs` is stored as decimal text: a `u64` does not fit SQLite's INTEGER.
pub fn upsert_proposal_details<'a, 'c, A>(
    conn: A,
    id: u64,
    details: &'a ProposalDetails,
    ledger: i64,
) -> impl std::future::Future<Output = Result<()>> + Send + 'a
where
    A: Acquire<'c, Database = Sqlite> + Send + 'a,
    'c: 'a,
{
    async move {
        let mut conn = conn.acquire().await?;
        sqlx::query(
            r#"
        INSERT INTO proposals (id, name, category, description, jobs, deadline,
                               created_ledger, updated_ledger)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT(id) DO UPDATE SET
            name = excluded.name,
            category = excluded.category,
            description = excluded.description,
            jobs = excluded.jobs,
            deadline = excluded.deadline
        "#,
        )
        .bind(id as i64)
        .bind(&details.name)
        .bind(&details.category)
        .bind(&details.description)
        .bind(details.jobs.to_string())
        .bind(details.deadline)
        .bind(ledger)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}

/// Record a vote and bump the matching tally, once per `(proposal, voter)`.
/// Returns `false` if the voter was already recorded.
///
/// Inside an open transaction this runs as a savepoint.
pub fn record_vote<'a, 'c, A>(
    conn: A,
    id: u64,
    voter: &'a str,
    support: bool,
    ledger: i64,
) -> impl std::future::Future<Output = Result<bool>> + Send + 'a
where
    A: Acquire<'c, Database = Sqlite> + Send + 'a,
    'c: 'a,
{
    async move {
        let mut tx = conn.begin().await?;

        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO votes (proposal_id, voter, support, ledger) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(id as i64)
        .bind(voter)
        .bind(support)
        .bind(ledger)
        .execute(&mut *tx)
        .await?
        .rows_affected()
            > 0;

        if inserted {
            let sql = if support {
                "UPDATE proposals SET yes_votes = yes_votes + 1, updated_ledger = ?2 WHERE id = ?1"
            } else {
                "UPDATE proposals SET no_votes = no_votes + 1, updated_ledger = ?2 WHERE id = ?1"
            };
            sqlx::query(sql)
                .bind(id as i64)
                .bind(ledger)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(inserted)
    }
}

/// Move a proposal from `from` to `to`. Returns `false` (and changes nothing)
/// if the stored status is not `from`.
pub fn transition_status<'a, 'c, A>(
    conn: A,
    id: u64,
    from: ProposalStatus,
    to: ProposalStatus,
    ledger: i64,
) -> impl std::future::Future<Output = Result<bool>> + Send + 'a
where
    A: Acquire<'c, Database = Sqlite> + Send + 'a,
    'c: 'a,
{
    async move {
        let mut conn = conn.acquire().await?;
        let funds_released = to == ProposalStatus::Released;
        let rows = sqlx::query(
            r#"
        UPDATE proposals
        SET    status = ?3, funds_released = ?4, updated_ledger = ?5
        WHERE  id = ?1 AND status = ?2
        "#,
        )
        .bind(id as i64)
        .bind(from.code())
        .bind(to.code())
        .bind(funds_released)
        .bind(ledger)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        Ok(rows > 0)
    }
}

// ─────────────────────────────────────────────────────────
// Projection reads
// ─────────────────────────────────────────────────────────

const PROPOSAL_COLUMNS: &str = "id, proposer, requested_amount, name, category, description, \
                                jobs, deadline, yes_votes, no_votes, status, funds_released, \
                                created_ledger, updated_ledger";

/// All proposal snapshots by ascending id, optionally filtered by status.
pub async fn list_proposals(
    pool: &SqlitePool,
    status: Option<ProposalStatus>,
) -> Result<Vec<ProposalSnapshot>> {
    let rows = match status {
        Some(status) => {
            let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE status = ?1 ORDER BY id ASC");
            sqlx::query_as::<_, ProposalRow>(&sql)
                .bind(status.code())
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals ORDER BY id ASC");
            sqlx::query_as::<_, ProposalRow>(&sql).fetch_all(pool).await?
        }
    };
    rows.into_iter().map(ProposalSnapshot::try_from).collect()
}

pub async fn get_proposal(pool: &SqlitePool, id: u64) -> Result<Option<ProposalSnapshot>> {
    let sql = format!("SELECT {PROPOSAL_COLUMNS} FROM proposals WHERE id = ?1");
    let row = sqlx::query_as::<_, ProposalRow>(&sql)
        .bind(id as i64)
        .fetch_optional(pool)
        .await?;
    row.map(ProposalSnapshot::try_from).transpose()
}

/// The support flag `voter` cast on proposal `id`, if any.
pub async fn get_vote(pool: &SqlitePool, id: u64, voter: &str) -> Result<Option<bool>> {
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT support FROM votes WHERE proposal_id = ?1 AND voter = ?2")
            .bind(id as i64)
            .bind(voter)
            .fetch_optional(pool)
            .await?;
    Ok(row.map(|(support,)| support))
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection: every in-memory connection is a separate database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    migrate(&pool).await.expect("migrations");
    pool
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: EventKind, event_id: &str, proposal_id: Option<u64>) -> DaoEvent {
        DaoEvent {
            kind,
            event_id: Some(event_id.to_string()),
            proposal_id,
            actor: None,
            amount: None,
            support: None,
            details: None,
            ledger: 100,
            timestamp: 1_700_000_000,
            contract_id: "CDAO".to_string(),
            tx_hash: Some(format!("tx-{event_id}")),
        }
    }

    #[tokio::test]
    async fn cursor_starts_at_zero_and_persists() {
        let pool = test_pool().await;
        assert_eq!(get_last_ledger(&pool).await.unwrap(), 0);
        assert_eq!(get_cursor_string(&pool).await.unwrap(), None);

        save_cursor(&pool, 4242, Some("cursor-1")).await.unwrap();
        assert_eq!(get_last_ledger(&pool).await.unwrap(), 4242);
        assert_eq!(
            get_cursor_string(&pool).await.unwrap().as_deref(),
            Some("cursor-1")
        );
    }

    #[tokio::test]
    async fn duplicate_events_are_ignored() {
        let pool = test_pool().await;
        let ev = event(EventKind::ProposalApproved, "e1", Some(1));

        assert!(insert_event(&pool, &ev).await.unwrap());
        assert!(!insert_event(&pool, &ev).await.unwrap());

        assert_eq!(get_all_events(&pool).await.unwrap().len(), 1);
        assert_eq!(get_events_for_proposal(&pool, "1").await.unwrap().len(), 1);
        assert!(get_events_for_proposal(&pool, "2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn treasury_balance_nets_deposits_and_releases() {
        let pool = test_pool().await;
        let mut deposit = event(EventKind::TreasuryDeposit, "d1", None);
        deposit.amount = Some("10000".to_string());
        let mut released = event(EventKind::FundsReleased, "r1", Some(1));
        released.amount = Some("2500".to_string());

        insert_event(&pool, &deposit).await.unwrap();
        insert_event(&pool, &released).await.unwrap();
        assert_eq!(treasury_balance(&pool).await.unwrap(), 7_500);
    }

    #[tokio::test]
    async fn treasury_balance_overflow_is_an_error() {
        let pool = test_pool().await;
        for id in ["d1", "d2"] {
            let mut deposit = event(EventKind::TreasuryDeposit, id, None);
            deposit.amount = Some(i128::MAX.to_string());
            insert_event(&pool, &deposit).await.unwrap();
        }
        assert!(matches!(
            treasury_balance(&pool).await,
            Err(IndexerError::Decode(_))
        ));
    }

    #[tokio::test]
    async fn vote_inside_rolled_back_transaction_leaves_no_trace() {
        let pool = test_pool().await;
        upsert_proposal_created(&pool, 1, Some("GP"), Some("100"), 10).await.unwrap();

        let mut tx = pool.begin().await.unwrap();
        assert!(record_vote(&mut *tx, 1, "GV", true, 11).await.unwrap());
        tx.rollback().await.unwrap();

        assert_eq!(get_vote(&pool, 1, "GV").await.unwrap(), None);
        let p = get_proposal(&pool, 1).await.unwrap().unwrap();
        assert_eq!((p.yes_votes, p.no_votes), (0, 0));
    }

    #[tokio::test]
    async fn votes_count_once_per_voter() {
        let pool = test_pool().await;
        upsert_proposal_created(&pool, 1, Some("GP"), Some("100"), 10).await.unwrap();

        assert!(record_vote(&pool, 1, "GV", true, 11).await.unwrap());
        assert!(!record_vote(&pool, 1, "GV", false, 12).await.unwrap());
        assert!(record_vote(&pool, 1, "GW", false, 12).await.unwrap());

        let p = get_proposal(&pool, 1).await.unwrap().unwrap();
        assert_eq!((p.yes_votes, p.no_votes), (1, 1));
        assert_eq!(get_vote(&pool, 1, "GV").await.unwrap(), Some(true));
        assert_eq!(get_vote(&pool, 1, "GX").await.unwrap(), None);
    }

    #[tokio::test]
    async fn transitions_are_guarded_by_current_status() {
        let pool = test_pool().await;
        upsert_proposal_created(&pool, 1, Some("GP"), Some("100"), 10).await.unwrap();

        assert!(!transition_status(&pool, 1, ProposalStatus::Approved, ProposalStatus::Released, 11)
            .await
            .unwrap());
        assert!(transition_status(&pool, 1, ProposalStatus::Active, ProposalStatus::Approved, 12)
            .await
            .unwrap());
        assert!(transition_status(&pool, 1, ProposalStatus::Approved, ProposalStatus::Released, 13)
            .await
            .unwrap());

        let p = get_proposal(&pool, 1).await.unwrap().unwrap();
        assert_eq!(p.status, ProposalStatus::Released);
        assert!(p.funds_released);
        assert_eq!(p.updated_ledger, 13);

        let released = list_proposals(&pool, Some(ProposalStatus::Released)).await.unwrap();
        assert_eq!(released.len(), 1);
        assert!(list_proposals(&pool, Some(ProposalStatus::Active)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn details_and_created_merge_in_either_order() {
        let pool = test_pool().await;
        let details = ProposalDetails {
            name: "Tani Maju".to_string(),
            category: "Agriculture".to_string(),
            description: "Seed bank".to_string(),
            jobs: 12,
            deadline: 1_700_100_000,
        };
        upsert_proposal_details(&pool, 4, &details, 20).await.unwrap();
        upsert_proposal_created(&pool, 4, Some("GP"), Some("5000"), 20).await.unwrap();

        let p = get_proposal(&pool, 4).await.unwrap().unwrap();
        assert_eq!(p.name.as_deref(), Some("Tani Maju"));
        assert_eq!(p.requested_amount, 5_000);
        assert_eq!(p.jobs, 12);
        assert_eq!(p.deadline, Some(1_700_100_000));
        assert_eq!(p.status, ProposalStatus::Active);
    }

    #[tokio::test]
    async fn jobs_keep_full_u64_range() {
        let pool = test_pool().await;
        let details = ProposalDetails {
            name: "Pabrik".to_string(),
            category: "Manufacturing".to_string(),
            description: "Garment line".to_string(),
            jobs: u64::MAX,
            deadline: 1_700_100_000,
        };
        upsert_proposal_details(&pool, 9, &details, 30).await.unwrap();

        let p = get_proposal(&pool, 9).await.unwrap().unwrap();
        assert_eq!(p.jobs, u64::MAX);
    }
}
