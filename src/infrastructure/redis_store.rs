use async_trait::async_trait;
use redis::aio::MultiplexedConnection;
use redis::{Client, RedisError, Script};

use super::kv::{KvStore, ScanBatch, StoreError, Transaction, TxOp, TxOutcome};

// ARGV holds (opcode, key, value) triples. Every precondition is checked
// before the first write, so a failed check leaves the keyspace untouched.
// Returns -1 on commit, otherwise the zero-based index of the failing op.
const TRANSACTION_LUA: &str = r#"
for i = 1, #ARGV, 3 do
  local op, key = ARGV[i], ARGV[i + 1]
  local exists = redis.call('EXISTS', key) == 1
  if (op == 'set_nx' and exists) or ((op == 'set_xx' or op == 'del') and not exists) then
    return (i - 1) / 3
  end
end
for i = 1, #ARGV, 3 do
  local op, key, value = ARGV[i], ARGV[i + 1], ARGV[i + 2]
  if op == 'set_nx' or op == 'set_xx' then
    redis.call('SET', key, value)
  elseif op == 'del' then
    redis.call('DEL', key)
  elseif op == 'sadd' then
    redis.call('SADD', key, value)
  elseif op == 'srem' then
    redis.call('SREM', key, value)
  end
end
return -1
"#;

impl From<RedisError> for StoreError {
    fn from(e: RedisError) -> Self {
        if e.is_io_error() || e.is_timeout() || e.is_connection_dropped() || e.is_connection_refusal()
        {
            StoreError::Transport(e.to_string())
        } else {
            StoreError::Rejected(e.to_string())
        }
    }
}

/// A script the server refused to run (or that failed mid-way) aborts the
/// transaction; connection trouble stays a transport failure.
fn script_error(e: RedisError) -> StoreError {
    match StoreError::from(e) {
        StoreError::Rejected(msg) => StoreError::TransactionAborted(msg),
        other => other,
    }
}

fn encode_op(op: &TxOp) -> (&'static str, &str, &[u8]) {
    match op {
        TxOp::SetIfAbsent { key, value } => ("set_nx", key.as_str(), value.as_slice()),
        TxOp::SetIfPresent { key, value } => ("set_xx", key.as_str(), value.as_slice()),
        TxOp::Delete { key } => ("del", key.as_str(), b"".as_slice()),
        TxOp::AddToSet { set, member } => ("sadd", set.as_str(), member.as_bytes()),
        TxOp::RemoveFromSet { set, member } => ("srem", set.as_str(), member.as_bytes()),
    }
}

/// `KvStore` backed by a Redis server.
///
/// The multiplexed connection is cloned per call; clones share one socket.
/// Transactions are submitted as a single script invocation, so dropping the
/// caller's future can never leave half of a transaction applied.
pub struct RedisStore {
    conn: MultiplexedConnection,
    transaction: Script,
}

impl RedisStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let client = Client::open(url)?;
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            conn,
            transaction: Script::new(TRANSACTION_LUA),
        })
    }
}

#[async_trait]
impl KvStore for RedisStore {
    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let mut conn = self.conn.clone();
        let value: Option<Vec<u8>> = redis::cmd("GET")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(value)
    }

    async fn set_if_absent(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn set_if_present(&self, key: &str, value: &[u8]) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("XX")
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> Result<bool, StoreError> {
        let mut conn = self.conn.clone();
        let removed: u64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await?;
        Ok(removed > 0)
    }

    async fn add_to_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("SADD")
            .arg(set)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn remove_from_set(&self, set: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: u64 = redis::cmd("SREM")
            .arg(set)
            .arg(member)
            .query_async(&mut conn)
            .await?;
        Ok(())
    }

    async fn scan_set(
        &self,
        set: &str,
        cursor: u64,
        count: u64,
    ) -> Result<ScanBatch, StoreError> {
        let mut conn = self.conn.clone();
        let (cursor, members): (u64, Vec<String>) = redis::cmd("SSCAN")
            .arg(set)
            .arg(cursor)
            .arg("COUNT")
            .arg(count.max(1))
            .query_async(&mut conn)
            .await?;
        Ok(ScanBatch { members, cursor })
    }

    async fn multi_get(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>, StoreError> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn.clone();
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn execute(&self, tx: Transaction) -> Result<TxOutcome, StoreError> {
        let mut invocation = self.transaction.prepare_invoke();
        for op in tx.ops() {
            let (code, key, value) = encode_op(op);
            invocation.arg(code).arg(key).arg(value);
        }

        let mut conn = self.conn.clone();
        let failed_op: i64 = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(script_error)?;
        match usize::try_from(failed_op) {
            Ok(failed_op) => Ok(TxOutcome::Discarded { failed_op }),
            Err(_) => Ok(TxOutcome::Committed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_op_uses_script_opcodes() {
        let set = TxOp::SetIfAbsent {
            key: "order:1".to_string(),
            value: b"{}".to_vec(),
        };
        assert_eq!(encode_op(&set), ("set_nx", "order:1", &b"{}"[..]));

        let del = TxOp::Delete {
            key: "order:1".to_string(),
        };
        assert_eq!(encode_op(&del), ("del", "order:1", &b""[..]));

        let srem = TxOp::RemoveFromSet {
            set: "orders".to_string(),
            member: "order:1".to_string(),
        };
        assert_eq!(encode_op(&srem), ("srem", "orders", &b"order:1"[..]));
    }

    #[test]
    fn io_errors_map_to_transport() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "refused",
        ));
        assert!(matches!(StoreError::from(err), StoreError::Transport(_)));
    }

    #[test]
    fn response_errors_map_to_rejected() {
        let err = RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE"));
        assert!(matches!(StoreError::from(err), StoreError::Rejected(_)));

        let err = RedisError::from((redis::ErrorKind::TypeError, "unexpected reply"));
        assert!(matches!(StoreError::from(err), StoreError::Rejected(_)));
    }

    #[test]
    fn script_errors_map_to_transaction_aborted() {
        let err = RedisError::from((redis::ErrorKind::ResponseError, "WRONGTYPE"));
        assert!(matches!(
            script_error(err),
            StoreError::TransactionAborted(_)
        ));
    }

    #[test]
    fn script_io_errors_stay_transport() {
        let err = RedisError::from(std::io::Error::new(
            std::io::ErrorKind::BrokenPipe,
            "gone",
        ));
        assert!(matches!(script_error(err), StoreError::Transport(_)));
    }
}
