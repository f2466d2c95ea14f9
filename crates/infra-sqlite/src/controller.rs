// SQLite Controller - embedded registry/queue/lock/message implementation
//
// `queue_pop`'s atomicity is implemented as a `BEGIN
// IMMEDIATE` transaction: select one queued token with no live lock,
// insert its lock, commit. `locks.token` is UNIQUE, so two concurrent
// transactions can never both insert a lock for the same token; SQLite's
// write lock on the `BEGIN IMMEDIATE` transaction serializes the
// candidates-selection step itself.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use foreman_core::domain::{
    Instruction, JobInfo, Lock, LogContext, Message, Progress, Status, Token,
};
use foreman_core::port::controller::Result;
use foreman_core::port::{Controller, ControllerError, QueuePushOutcome};
use sqlx::{Row, SqlitePool};
use std::time::Duration;
use tracing::{instrument, warn};

fn map_sqlx_error(err: sqlx::Error) -> ControllerError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("5") => {
            ControllerError::Transient(format!("database locked: {}", db_err.message()))
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::Io(_) => {
            ControllerError::Transient(err.to_string())
        }
        _ => ControllerError::Internal(err.to_string()),
    }
}

pub struct SqliteController {
    pool: SqlitePool,
    name: String,
    lock_ttl: Duration,
}

impl SqliteController {
    pub fn new(pool: SqlitePool, name: impl Into<String>, lock_ttl: Duration) -> Self {
        Self {
            pool,
            name: name.into(),
            lock_ttl,
        }
    }

    fn load_info(row_info: &str) -> Result<JobInfo> {
        serde_json::from_str(row_info).map_err(|e| ControllerError::Internal(e.to_string()))
    }

    fn dump_info(info: &JobInfo) -> Result<String> {
        serde_json::to_string(info).map_err(|e| ControllerError::Internal(e.to_string()))
    }

    /// Purge expired locks/registry-records/messages; for each `running`
    /// record without a live lock, requeue or fail it.
    /// Called at the start of every public operation.
    async fn cleanup_inner(&self, requeue: bool) -> Result<()> {
        let now = Utc::now();

        sqlx::query("DELETE FROM locks WHERE expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM registry WHERE expires_at IS NOT NULL AND expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM messages WHERE expires_at IS NOT NULL AND expires_at < ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let orphaned = sqlx::query(
            r#"
            SELECT registry.token, registry.info FROM registry
            LEFT JOIN locks ON locks.token = registry.token
            WHERE registry.status = 'running' AND locks.id IS NULL
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        for row in orphaned {
            let token: String = row.get("token");
            let raw_info: String = row.get("info");
            let mut info = match Self::load_info(&raw_info) {
                Ok(i) => i,
                Err(_) => continue,
            };

            if requeue {
                info.metadata.reset_for_requeue();
                info.report.progress = Progress::queued();
                info.report
                    .log
                    .log_at(LogContext::Event, now, &self.name, "requeued: lock lost");
                let dumped = Self::dump_info(&info)?;
                sqlx::query("UPDATE registry SET status = 'queued', info = ? WHERE token = ?")
                    .bind(dumped)
                    .bind(&token)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
                warn!(token = %token, "requeued orphaned job");
            } else {
                info.metadata.set_aborted(&self.name, now);
                info.report.progress = Progress::failed("lock lost, not retried");
                info.report.log.log_at(
                    LogContext::Error,
                    now,
                    &self.name,
                    "lock lost while running, marked failed",
                );
                let dumped = Self::dump_info(&info)?;
                sqlx::query("UPDATE registry SET status = 'failed', info = ? WHERE token = ?")
                    .bind(dumped)
                    .bind(&token)
                    .execute(&self.pool)
                    .await
                    .map_err(map_sqlx_error)?;
                warn!(token = %token, "force-failed orphaned job");
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Controller for SqliteController {
    #[instrument(skip(self, info))]
    async fn queue_push(&self, mut info: JobInfo) -> Result<(Token, QueuePushOutcome)> {
        self.cleanup_inner(true).await?;
        let now = Utc::now();

        let existing: Option<String> = sqlx::query_scalar("SELECT info FROM registry WHERE token = ?")
            .bind(&info.token.value)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(raw) = existing {
            let existing_info = Self::load_info(&raw)?;
            if existing_info.config.original_body == info.config.original_body {
                return Ok((existing_info.token, QueuePushOutcome::AlreadyExists));
            }
            return Err(ControllerError::ResubmissionConflict {
                token: info.token.value.clone(),
            });
        }

        info.metadata.set_produced(&self.name, now);
        info.report.progress = Progress::queued();
        let dumped = Self::dump_info(&info)?;

        sqlx::query(
            "INSERT INTO registry (token, status, info, created_at, expires_at) VALUES (?, 'queued', ?, ?, ?)",
        )
        .bind(&info.token.value)
        .bind(dumped)
        .bind(now.to_rfc3339())
        .bind(info.token.expires_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok((info.token, QueuePushOutcome::Created))
    }

    #[instrument(skip(self))]
    async fn queue_pop(&self, worker_name: &str) -> Result<Option<Lock>> {
        self.cleanup_inner(true).await?;
        let now = Utc::now();
        let expires_at = now + chrono::Duration::from_std(self.lock_ttl).unwrap();

        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;
        sqlx::query("PRAGMA busy_timeout = 5000")
            .execute(&mut *tx)
            .await
            .ok();

        let candidate: Option<String> = sqlx::query_scalar(
            r#"
            SELECT registry.token FROM registry
            LEFT JOIN locks ON locks.token = registry.token
            WHERE registry.status = 'queued' AND locks.id IS NULL
            ORDER BY registry.created_at ASC
            LIMIT 1
            "#,
        )
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let token = match candidate {
            Some(t) => t,
            None => {
                tx.commit().await.map_err(map_sqlx_error)?;
                return Ok(None);
            }
        };

        let lock_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO locks (id, name, token, expires_at) VALUES (?, ?, ?, ?)")
            .bind(&lock_id)
            .bind(worker_name)
            .bind(&token)
            .bind(expires_at.to_rfc3339())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        sqlx::query("UPDATE registry SET status = 'running' WHERE token = ?")
            .bind(&token)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        tx.commit().await.map_err(map_sqlx_error)?;

        Ok(Some(Lock::new(lock_id, worker_name, token, expires_at)))
    }

    #[instrument(skip(self))]
    async fn release_lock(&self, lock_id: &str) -> Result<()> {
        sqlx::query("DELETE FROM locks WHERE id = ?")
            .bind(lock_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn refresh_lock(&self, lock_id: &str) -> Result<Lock> {
        self.cleanup_inner(true).await?;
        let now = Utc::now();
        let new_expiry = now + chrono::Duration::from_std(self.lock_ttl).unwrap();

        let row = sqlx::query("SELECT name, token, expires_at FROM locks WHERE id = ?")
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(ControllerError::StaleLockRefresh)?;

        let current_expiry: String = row.get("expires_at");
        let current_expiry: DateTime<Utc> = current_expiry
            .parse()
            .map_err(|_| ControllerError::Internal("corrupt lock expiry".into()))?;
        if current_expiry <= now {
            return Err(ControllerError::StaleLockRefresh);
        }

        sqlx::query("UPDATE locks SET expires_at = ? WHERE id = ?")
            .bind(new_expiry.to_rfc3339())
            .bind(lock_id)
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let name: String = row.get("name");
        let token: String = row.get("token");
        Ok(Lock::new(lock_id, name, token, new_expiry))
    }

    #[instrument(skip(self))]
    async fn get_token(&self, token: &str) -> Result<Token> {
        let info = self.get_info(token).await?;
        Ok(info.token)
    }

    #[instrument(skip(self))]
    async fn get_info(&self, token: &str) -> Result<JobInfo> {
        self.cleanup_inner(true).await?;
        let raw: Option<String> = sqlx::query_scalar("SELECT info FROM registry WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        let raw = raw.ok_or_else(|| ControllerError::UnknownToken(token.to_string()))?;
        Self::load_info(&raw)
    }

    #[instrument(skip(self))]
    async fn get_status(&self, token: &str) -> Result<Status> {
        let info = self.get_info(token).await?;
        Ok(info.report.progress.status)
    }

    #[instrument(skip(self, info))]
    async fn registry_push(
        &self,
        lock_id: &str,
        status: Option<Status>,
        info: Option<JobInfo>,
    ) -> Result<()> {
        let now = Utc::now();
        let row = sqlx::query("SELECT token, expires_at FROM locks WHERE id = ?")
            .bind(lock_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .ok_or(ControllerError::StaleLockRegistryPush)?;

        let expires_at: String = row.get("expires_at");
        let expires_at: DateTime<Utc> = expires_at
            .parse()
            .map_err(|_| ControllerError::Internal("corrupt lock expiry".into()))?;
        if expires_at <= now {
            return Err(ControllerError::StaleLockRegistryPush);
        }
        let token: String = row.get("token");

        if let Some(mut new_info) = info {
            if let Some(s) = status {
                new_info.report.progress = match s {
                    Status::Queued => Progress::queued(),
                    Status::Running => new_info.report.progress,
                    Status::Completed => Progress::completed(new_info.report.progress.verbose),
                    Status::Aborted => Progress::aborted(new_info.report.progress.verbose),
                    Status::Failed => Progress::failed(new_info.report.progress.verbose),
                };
            }
            let dumped = Self::dump_info(&new_info)?;
            sqlx::query("UPDATE registry SET status = ?, info = ? WHERE token = ?")
                .bind(new_info.report.progress.status.to_string())
                .bind(dumped)
                .bind(&token)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        } else if let Some(s) = status {
            sqlx::query("UPDATE registry SET status = ? WHERE token = ?")
                .bind(s.to_string())
                .bind(&token)
                .execute(&self.pool)
                .await
                .map_err(map_sqlx_error)?;
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn message_push(
        &self,
        token: &str,
        instruction: Instruction,
        origin: &str,
        content: &str,
    ) -> Result<()> {
        let exists: Option<i64> = sqlx::query_scalar("SELECT 1 FROM registry WHERE token = ?")
            .bind(token)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;
        if exists.is_none() {
            return Ok(());
        }

        let instruction_str = match instruction {
            Instruction::Abort => "abort",
        };
        sqlx::query(
            "INSERT INTO messages (token, instruction, origin, content, received_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(token)
        .bind(instruction_str)
        .bind(origin)
        .bind(content)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn message_get(&self, since: DateTime<Utc>) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT token, instruction, origin, content, received_at FROM messages WHERE received_at >= ?",
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in rows {
            let token: String = row.get("token");
            let instruction_str: String = row.get("instruction");
            let origin: String = row.get("origin");
            let content: String = row.get("content");
            let received_at: String = row.get("received_at");
            let received_at: DateTime<Utc> = received_at
                .parse()
                .map_err(|_| ControllerError::Internal("corrupt message timestamp".into()))?;
            let instruction = match instruction_str.as_str() {
                "abort" => Instruction::Abort,
                other => return Err(ControllerError::Internal(format!("unknown instruction '{other}'"))),
            };
            messages.push(Message::new_abort(token, origin, content, received_at));
            let _ = instruction;
        }
        Ok(messages)
    }

    #[instrument(skip(self))]
    async fn cleanup(&self, requeue: bool) -> Result<()> {
        self.cleanup_inner(requeue).await
    }
}
