//! Key layout and encoding for the repository partitions.

/// Encode a manifest key: manifest:{id}
pub fn manifest_key(manifest_id: &str) -> Vec<u8> {
    format!("manifest:{manifest_id}").into_bytes()
}

/// Encode an origin key: origin:{source_url}
pub fn origin_key(origin: &str) -> Vec<u8> {
    format!("origin:{origin}").into_bytes()
}

/// Encode an identifier key: ident:{external_id}
pub fn identifier_key(external_id: &str) -> Vec<u8> {
    format!("ident:{external_id}").into_bytes()
}

/// Encode an image key: image:{id}
pub fn image_key(image_id: &str) -> Vec<u8> {
    format!("image:{image_id}").into_bytes()
}

/// Encode a recency key so ascending key order yields newest-first
pub fn recency_key(seq: u64) -> [u8; 8] {
    (u64::MAX - seq).to_be_bytes()
}

/// Encode a subscription key: sub:{email}:{job_id}
pub fn subscription_key(email: &str, job_id: &str) -> Vec<u8> {
    format!("sub:{email}:{job_id}").into_bytes()
}

/// Prefix for all subscriptions of one email: sub:{email}:
pub fn subscription_prefix(email: &str) -> Vec<u8> {
    format!("sub:{email}:").into_bytes()
}

/// Decode the job ID out of a subscription key
pub fn decode_subscription_job(key: &[u8], email: &str) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str
        .strip_prefix(&format!("sub:{email}:"))
        .map(String::from)
}

/// Encode a recipient key: rcpt:{job_id}:{email}
pub fn recipient_key(job_id: &str, email: &str) -> Vec<u8> {
    format!("rcpt:{job_id}:{email}").into_bytes()
}

/// Prefix for all recipients of one job: rcpt:{job_id}:
pub fn recipient_prefix(job_id: &str) -> Vec<u8> {
    format!("rcpt:{job_id}:").into_bytes()
}

/// Decode the email out of a recipient key
pub fn decode_recipient_email(key: &[u8], job_id: &str) -> Option<String> {
    let key_str = std::str::from_utf8(key).ok()?;
    key_str
        .strip_prefix(&format!("rcpt:{job_id}:"))
        .map(String::from)
}
