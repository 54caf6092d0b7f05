//! Per-query session configuration for row-level security.
//!
//! A [`SessionSettings`] hook wired at store construction makes every data
//! query run inside a transaction that first applies each `(key, value)`
//! pair via `SELECT set_config(key, value, true)`. The `true` makes the
//! setting transaction-local, so pooled connections are clean on release.
//! When the extension also wants pre-query statements (pg_embedding's
//! `SET LOCAL enable_seqscan = off` under HNSW), they run in the same
//! transaction, after the session settings.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

#[async_trait]
pub trait SessionSettings: Send + Sync {
    /// Settings to apply for the duration of one query's transaction.
    /// Called once per query, so claims may be resolved per call.
    async fn settings(&self) -> Result<Vec<(String, String)>>;
}

/// Ready-made hook that exposes JWT claims to Postgres RLS policies as
/// `request.jwt.claims`.
#[derive(Debug, Clone)]
pub struct JwtClaims {
    claims: Value,
}

impl JwtClaims {
    pub fn new(claims: Value) -> Self {
        Self { claims }
    }
}

#[async_trait]
impl SessionSettings for JwtClaims {
    async fn settings(&self) -> Result<Vec<(String, String)>> {
        Ok(vec![(
            "request.jwt.claims".to_string(),
            self.claims.to_string(),
        )])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn jwt_claims_serialize_under_the_rls_key() {
        let hook = JwtClaims::new(json!({"sub": "user-1", "role": "tenant"}));
        let settings = hook.settings().await.unwrap();
        assert_eq!(settings.len(), 1);
        assert_eq!(settings[0].0, "request.jwt.claims");
        assert!(settings[0].1.contains("\"sub\":\"user-1\""));
    }
}
