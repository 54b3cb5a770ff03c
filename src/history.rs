//! history.rs: daily relay counts, written once per run and read back for trends.
//!
//! A day is always replaced as a whole: re-running on the same date overwrites
//! that date's rows instead of adding to them.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate};
use tokio::sync::Mutex;
use tokio_postgres::{Client, NoTls};

use crate::analyze::tally::RelayCounts;

#[async_trait]
pub trait CountStore: Send + Sync {
    /// Replace everything stored for `date` with `counts`.
    async fn replace_day(&self, date: NaiveDate, counts: &RelayCounts) -> Result<()>;

    /// Count for `relay` on each of `dates`, `None` where nothing was stored.
    async fn counts_for(&self, relay: &str, dates: &[NaiveDate]) -> Result<Vec<Option<u32>>>;
}

/// The `days` dates ending at `today`, oldest first.
pub fn trend_dates(today: NaiveDate, days: u32) -> Vec<NaiveDate> {
    (0..i64::from(days))
        .rev()
        .map(|back| today - Duration::days(back))
        .collect()
}

/* ----------------------------
Postgres
---------------------------- */

const CREATE_TABLE: &str = "
    CREATE TABLE IF NOT EXISTS relay_stats (
        id SERIAL PRIMARY KEY,
        date DATE NOT NULL,
        relay_url TEXT NOT NULL,
        subscription_count INTEGER NOT NULL,
        UNIQUE(date, relay_url)
    )";

pub struct PgCountStore {
    client: Mutex<Client>,
}

impl PgCountStore {
    /// Connect and make sure the `relay_stats` table exists.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .context("failed to connect to Postgres")?;
        tokio::spawn(async move {
            if let Err(err) = connection.await {
                tracing::warn!(error = %err, "postgres connection error");
            }
        });

        client
            .execute(CREATE_TABLE, &[])
            .await
            .context("failed to create relay_stats")?;

        Ok(Self {
            client: Mutex::new(client),
        })
    }
}

#[async_trait]
impl CountStore for PgCountStore {
    async fn replace_day(&self, date: NaiveDate, counts: &RelayCounts) -> Result<()> {
        let mut client = self.client.lock().await;
        let transaction = client.transaction().await?;
        transaction
            .execute("DELETE FROM relay_stats WHERE date = $1", &[&date])
            .await
            .with_context(|| format!("failed to clear relay_stats for {date}"))?;

        let statement = transaction
            .prepare(
                "INSERT INTO relay_stats (date, relay_url, subscription_count) VALUES ($1, $2, $3)",
            )
            .await?;
        for (url, &count) in counts {
            let count = i32::try_from(count).context("subscription_count out of range")?;
            transaction
                .execute(&statement, &[&date, url, &count])
                .await
                .with_context(|| format!("failed to insert count for {url}"))?;
        }
        transaction.commit().await?;
        Ok(())
    }

    async fn counts_for(&self, relay: &str, dates: &[NaiveDate]) -> Result<Vec<Option<u32>>> {
        let client = self.client.lock().await;
        let rows = client
            .query(
                "SELECT date, subscription_count FROM relay_stats \
                 WHERE relay_url = $1 AND date = ANY($2)",
                &[&relay, &dates],
            )
            .await
            .with_context(|| format!("failed to read history for {relay}"))?;

        let by_date: BTreeMap<NaiveDate, u32> = rows
            .iter()
            .map(|row| {
                let date: NaiveDate = row.get(0);
                let count: i32 = row.get(1);
                (date, u32::try_from(count).unwrap_or(0))
            })
            .collect();
        Ok(dates.iter().map(|d| by_date.get(d).copied()).collect())
    }
}

/* ----------------------------
JSON file
---------------------------- */

type DayCounts = BTreeMap<String, BTreeMap<String, u32>>;

/// `{ "YYYY-MM-DD": { relay: count } }` on local disk; for runs without a
/// database.
pub struct JsonFileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<DayCounts> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(s) => serde_json::from_str(&s)
                .with_context(|| format!("parsing history {}", self.path.display())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DayCounts::new()),
            Err(e) => {
                Err(e).with_context(|| format!("reading history {}", self.path.display()))
            }
        }
    }

    async fn write_all(&self, all: &DayCounts) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir)
                .await
                .with_context(|| format!("creating {}", dir.display()))?;
        }
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(all)?)
            .await
            .with_context(|| format!("writing {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("replacing {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl CountStore for JsonFileStore {
    async fn replace_day(&self, date: NaiveDate, counts: &RelayCounts) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut all = self.read_all().await?;
        all.insert(
            date.to_string(),
            counts.iter().map(|(k, v)| (k.clone(), *v)).collect(),
        );
        self.write_all(&all).await
    }

    async fn counts_for(&self, relay: &str, dates: &[NaiveDate]) -> Result<Vec<Option<u32>>> {
        let _guard = self.lock.lock().await;
        let all = self.read_all().await?;
        Ok(dates
            .iter()
            .map(|d| all.get(&d.to_string()).and_then(|day| day.get(relay)).copied())
            .collect())
    }
}
