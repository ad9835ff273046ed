use md5::{Digest, Md5};

pub fn md5_hex(input: &str) -> String {
    let mut hasher = Md5::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Request signature the exchange expects in `x-mxc-sign`:
/// `md5(ts || body || md5(token || ts)[7..])` with `ts` in milliseconds.
pub fn generate_signature(token: &str, timestamp_ms: i64, body: &str) -> String {
    let ts = timestamp_ms.to_string();
    let inner = md5_hex(&format!("{}{}", token, ts));
    md5_hex(&format!("{}{}{}", ts, body, &inner[7..]))
}
