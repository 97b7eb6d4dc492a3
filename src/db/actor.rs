use crate::db::models::{
    AnalysisCreate, ApiLogCreate, DbAnalysis, DbApiLog, DbFeedback, DbPin, DbUser,
    FeedbackCreate,
};
use crate::db::schema::SQLITE_INIT;
use crate::error::WaltError;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::info;

#[derive(Debug)]
pub enum DbActorMessage {
    /// Insert (or replace, keyed by session id) a relayed analysis and return its id.
    RecordAnalysis(AnalysisCreate, RpcReplyPort<Result<i64, WaltError>>),

    /// Fetch an analysis by session id.
    GetAnalysis(String, RpcReplyPort<Result<Option<DbAnalysis>, WaltError>>),

    /// Store user feedback and return its id.
    RecordFeedback(FeedbackCreate, RpcReplyPort<Result<i64, WaltError>>),

    /// List feedback left for a session, oldest first.
    ListFeedback(String, RpcReplyPort<Result<Vec<DbFeedback>, WaltError>>),

    /// Append one master server call to the API log.
    RecordApiLog(ApiLogCreate, RpcReplyPort<Result<i64, WaltError>>),

    /// Most recent API log rows, newest first.
    ListApiLog(u32, RpcReplyPort<Result<Vec<DbApiLog>, WaltError>>),

    ListPins(RpcReplyPort<Result<Vec<DbPin>, WaltError>>),

    ListUsers(RpcReplyPort<Result<Vec<DbUser>, WaltError>>),
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn record_analysis(&self, create: AnalysisCreate) -> Result<i64, WaltError> {
        ractor::call!(self.actor, DbActorMessage::RecordAnalysis, create).map_err(|e| {
            WaltError::RactorError(format!("DbActor RecordAnalysis RPC failed: {e}"))
        })?
    }

    pub async fn get_analysis(&self, session_id: &str) -> Result<Option<DbAnalysis>, WaltError> {
        ractor::call!(
            self.actor,
            DbActorMessage::GetAnalysis,
            session_id.to_string()
        )
        .map_err(|e| WaltError::RactorError(format!("DbActor GetAnalysis RPC failed: {e}")))?
    }

    pub async fn record_feedback(&self, create: FeedbackCreate) -> Result<i64, WaltError> {
        ractor::call!(self.actor, DbActorMessage::RecordFeedback, create).map_err(|e| {
            WaltError::RactorError(format!("DbActor RecordFeedback RPC failed: {e}"))
        })?
    }

    pub async fn list_feedback(&self, session_id: &str) -> Result<Vec<DbFeedback>, WaltError> {
        ractor::call!(
            self.actor,
            DbActorMessage::ListFeedback,
            session_id.to_string()
        )
        .map_err(|e| WaltError::RactorError(format!("DbActor ListFeedback RPC failed: {e}")))?
    }

    pub async fn record_api_log(&self, create: ApiLogCreate) -> Result<i64, WaltError> {
        ractor::call!(self.actor, DbActorMessage::RecordApiLog, create).map_err(|e| {
            WaltError::RactorError(format!("DbActor RecordApiLog RPC failed: {e}"))
        })?
    }

    pub async fn list_api_log(&self, limit: u32) -> Result<Vec<DbApiLog>, WaltError> {
        ractor::call!(self.actor, DbActorMessage::ListApiLog, limit)
            .map_err(|e| WaltError::RactorError(format!("DbActor ListApiLog RPC failed: {e}")))?
    }

    pub async fn list_pins(&self) -> Result<Vec<DbPin>, WaltError> {
        ractor::call!(self.actor, DbActorMessage::ListPins)
            .map_err(|e| WaltError::RactorError(format!("DbActor ListPins RPC failed: {e}")))?
    }

    pub async fn list_users(&self) -> Result<Vec<DbUser>, WaltError> {
        ractor::call!(self.actor, DbActorMessage::ListUsers)
            .map_err(|e| WaltError::RactorError(format!("DbActor ListUsers RPC failed: {e}")))?
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        let pool = &state.pool;
        match message {
            DbActorMessage::RecordAnalysis(create, reply) => {
                let _ = reply.send(record_analysis(pool, create).await);
            }
            DbActorMessage::GetAnalysis(session_id, reply) => {
                let _ = reply.send(get_analysis(pool, &session_id).await);
            }
            DbActorMessage::RecordFeedback(create, reply) => {
                let _ = reply.send(record_feedback(pool, create).await);
            }
            DbActorMessage::ListFeedback(session_id, reply) => {
                let _ = reply.send(list_feedback(pool, &session_id).await);
            }
            DbActorMessage::RecordApiLog(create, reply) => {
                let _ = reply.send(record_api_log(pool, create).await);
            }
            DbActorMessage::ListApiLog(limit, reply) => {
                let _ = reply.send(list_api_log(pool, limit).await);
            }
            DbActorMessage::ListPins(reply) => {
                let _ = reply.send(list_pins(pool).await);
            }
            DbActorMessage::ListUsers(reply) => {
                let _ = reply.send(list_users(pool).await);
            }
        }
        Ok(())
    }
}

async fn record_analysis(pool: &SqlitePool, c: AnalysisCreate) -> Result<i64, WaltError> {
    let id: i64 = sqlx::query_scalar(
        r#"
    INSERT INTO analyses (
        session_id, authentic, authenticity_rating, result_json, source, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?)
    ON CONFLICT(session_id) DO UPDATE SET
        authentic = excluded.authentic,
        authenticity_rating = excluded.authenticity_rating,
        result_json = excluded.result_json,
        source = excluded.source,
        created_at = excluded.created_at
    RETURNING id
    "#,
    )
    .bind(c.session_id)
    .bind(c.authentic)
    .bind(c.authenticity_rating)
    .bind(c.result_json)
    .bind(c.source.as_str())
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn get_analysis(pool: &SqlitePool, session_id: &str) -> Result<Option<DbAnalysis>, WaltError> {
    let row = sqlx::query_as::<_, DbAnalysis>(
        r#"
    SELECT id, session_id, authentic, authenticity_rating, result_json, source, created_at
    FROM analyses
    WHERE session_id = ?
    "#,
    )
    .bind(session_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

async fn record_feedback(pool: &SqlitePool, c: FeedbackCreate) -> Result<i64, WaltError> {
    let id: i64 = sqlx::query_scalar(
        r#"
    INSERT INTO user_feedback (session_id, rating, comment, created_at)
    VALUES (?, ?, ?, ?)
    RETURNING id
    "#,
    )
    .bind(c.session_id)
    .bind(c.rating)
    .bind(c.comment)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn list_feedback(pool: &SqlitePool, session_id: &str) -> Result<Vec<DbFeedback>, WaltError> {
    let rows = sqlx::query_as::<_, DbFeedback>(
        r#"
    SELECT id, session_id, rating, comment, created_at
    FROM user_feedback
    WHERE session_id = ?
    ORDER BY id
    "#,
    )
    .bind(session_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn record_api_log(pool: &SqlitePool, c: ApiLogCreate) -> Result<i64, WaltError> {
    let id: i64 = sqlx::query_scalar(
        r#"
    INSERT INTO mobile_app_api_log (
        session_id, endpoint, transport, status_code, latency_ms, error, created_at
    )
    VALUES (?, ?, ?, ?, ?, ?, ?)
    RETURNING id
    "#,
    )
    .bind(c.session_id)
    .bind(c.endpoint)
    .bind(c.transport)
    .bind(i64::from(c.status_code))
    .bind(i64::try_from(c.latency_ms).unwrap_or(i64::MAX))
    .bind(c.error)
    .bind(Utc::now())
    .fetch_one(pool)
    .await?;

    Ok(id)
}

async fn list_api_log(pool: &SqlitePool, limit: u32) -> Result<Vec<DbApiLog>, WaltError> {
    let rows = sqlx::query_as::<_, DbApiLog>(
        r#"
    SELECT id, session_id, endpoint, transport, status_code, latency_ms, error, created_at
    FROM mobile_app_api_log
    ORDER BY id DESC
    LIMIT ?
    "#,
    )
    .bind(i64::from(limit))
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn list_pins(pool: &SqlitePool) -> Result<Vec<DbPin>, WaltError> {
    let rows = sqlx::query_as::<_, DbPin>(
        r#"
    SELECT id, pin_id, name, series, created_at
    FROM pins
    ORDER BY id
    "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

async fn list_users(pool: &SqlitePool) -> Result<Vec<DbUser>, WaltError> {
    let rows = sqlx::query_as::<_, DbUser>(
        r#"
    SELECT id, username, email, created_at
    FROM users
    ORDER BY id
    "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> Result<DbActorHandle, WaltError> {
    // Unnamed: tests run several databases side by side in one process.
    let (actor, _jh) = ractor::Actor::spawn(
        None,
        DbActor,
        database_url.to_string(),
    )
    .await
    .map_err(|e| WaltError::RactorError(format!("failed to spawn DbActor: {e}")))?;

    Ok(DbActorHandle { actor })
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), WaltError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
