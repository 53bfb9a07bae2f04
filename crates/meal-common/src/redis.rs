/// Redis wrapper with graceful degradation.
///
/// All operations return `Option<T>` or `bool`. On any Redis error the operation logs a warning
/// and reports absence, so a missing Redis reads as an empty store rather than a failure.
use redis::AsyncCommands;
use tracing::warn;

const SCAN_BATCH: usize = 200;

pub struct RedisCache {
    client: Option<redis::Client>,
}

impl RedisCache {
    /// Build a client for `url`. A `None` URL or an unparseable one yields a cache whose
    /// operations are all no-ops.
    pub fn new(url: Option<&str>) -> Self {
        let client = url.and_then(|u| {
            redis::Client::open(u)
                .inspect_err(|e| warn!(error = %e, url = u, "failed to create redis client, store disabled"))
                .ok()
        });
        Self { client }
    }

    /// Send a PING. Returns `true` if Redis is reachable.
    pub async fn is_available(&self) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        let result: Result<String, _> = redis::cmd("PING").query_async(&mut conn).await;
        result.is_ok()
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut conn = self.connection().await?;
        conn.get::<_, Option<String>>(key)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis GET failed"))
            .ok()?
    }

    /// Fetch several keys in one round trip. Missing keys come back as `None` in place.
    pub async fn get_many(&self, keys: &[String]) -> Option<Vec<Option<String>>> {
        if keys.is_empty() {
            return Some(Vec::new());
        }
        let mut conn = self.connection().await?;
        let values: Vec<Option<String>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await
            .inspect_err(|e| warn!(error = %e, count = keys.len(), "redis MGET failed"))
            .ok()?;
        Some(values)
    }

    pub async fn set(&self, key: &str, value: &str) -> bool {
        let Some(mut conn) = self.connection().await else {
            return false;
        };
        conn.set::<_, _, ()>(key, value)
            .await
            .inspect_err(|e| warn!(error = %e, key, "redis SET failed"))
            .is_ok()
    }

    /// List every key under `prefix` using SCAN (never KEYS, which blocks the server).
    /// Keys are returned sorted so callers see a stable order.
    pub async fn scan_keys(&self, prefix: &str) -> Option<Vec<String>> {
        let mut conn = self.connection().await?;
        let pattern = format!("{prefix}*");
        let mut cursor: u64 = 0;
        let mut out = Vec::new();
        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await
                .inspect_err(|e| warn!(error = %e, pattern, "redis SCAN failed"))
                .ok()?;
            out.extend(keys);
            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }
        out.sort();
        out.dedup();
        Some(out)
    }

    async fn connection(&self) -> Option<redis::aio::MultiplexedConnection> {
        let client = self.client.as_ref()?;
        client
            .get_multiplexed_async_connection()
            .await
            .inspect_err(|e| warn!(error = %e, "redis connection failed"))
            .ok()
    }
}
