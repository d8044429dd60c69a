use snowflake::SnowflakeIdBucket;
use std::sync::Mutex;

static BUCKET: Mutex<Option<SnowflakeIdBucket>> = Mutex::new(None);

/// Configures the process-wide snowflake bucket.
///
/// `machine_id` and `node_id` must each be in `0..32`. Calling this more than
/// once replaces the bucket, which is harmless in tests.
pub fn init(machine_id: i32, node_id: i32) {
    let mut bucket = BUCKET.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    *bucket = Some(SnowflakeIdBucket::new(machine_id, node_id));
}

/// Returns a fresh record id as a decimal string.
///
/// Falls back to machine/node `1/1` when [`init`] was never called.
pub fn next_id() -> String {
    let mut bucket = BUCKET.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    bucket
        .get_or_insert_with(|| SnowflakeIdBucket::new(1, 1))
        .get_id()
        .to_string()
}
