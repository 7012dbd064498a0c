use regex::Regex;
use std::sync::LazyLock;

use crate::envelope::OpError;

/// `rad:` + multibase base58btc prefix `z` + 28 base58 characters.
static RID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^rad:z[1-9A-HJ-NP-Za-km-z]{28}$").unwrap());

pub fn is_valid_rid(rid: &str) -> bool {
    RID_RE.is_match(rid)
}

pub fn validate_rid(rid: &str) -> Result<&str, OpError> {
    if is_valid_rid(rid) {
        Ok(rid)
    } else {
        Err(OpError::InvalidRid(rid.to_string()))
    }
}
