//! Firebase RTDB-style backend — async `JobStore` over the REST surface.
//!
//! Every path maps to `{base_url}/{path}.json`; point reads GET, point
//! writes PUT, point deletes DELETE. A read of an absent path yields JSON
//! `null`, which materializes as an empty map.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::error::StoreError;
use crate::store::traits::{GuildSettings, JobStore, RemindJob};

/// REST client for a Firebase Realtime-Database-style store.
pub struct FirebaseStore {
    base_url: String,
    auth_token: Option<SecretString>,
    client: reqwest::Client,
}

impl FirebaseStore {
    /// Create a store rooted at `base_url` (no trailing slash), optionally
    /// authenticating with a database secret.
    pub fn new(base_url: impl Into<String>, auth_token: Option<SecretString>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            auth_token,
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        match &self.auth_token {
            Some(token) => format!(
                "{}/{path}.json?auth={}",
                self.base_url,
                token.expose_secret()
            ),
            None => format!("{}/{path}.json", self.base_url),
        }
    }

    /// GET a path and deserialize it, treating JSON `null` as `T::default()`.
    async fn get<T>(&self, path: &str) -> Result<T, StoreError>
    where
        T: DeserializeOwned + Default,
    {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StoreError::UnexpectedStatus {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let value: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;
        if value.is_null() {
            return Ok(T::default());
        }
        serde_json::from_value(value).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    async fn put(&self, path: &str, body: &serde_json::Value) -> Result<(), StoreError> {
        let resp = self
            .client
            .put(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StoreError::UnexpectedStatus {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }

    async fn delete(&self, path: &str) -> Result<(), StoreError> {
        let resp = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .map_err(|e| StoreError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(StoreError::UnexpectedStatus {
                path: path.to_string(),
                status: resp.status().as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl JobStore for FirebaseStore {
    async fn bans(&self) -> Result<HashMap<String, String>, StoreError> {
        self.get("banned").await
    }

    async fn set_ban(&self, id: &str, reason: &str) -> Result<(), StoreError> {
        self.put(&format!("banned/{id}"), &serde_json::json!(reason))
            .await
    }

    async fn all_settings(&self) -> Result<HashMap<String, GuildSettings>, StoreError> {
        self.get("settings").await
    }

    async fn remind_jobs(&self) -> Result<BTreeMap<String, RemindJob>, StoreError> {
        let raw: BTreeMap<String, serde_json::Value> = self.get("remindJobs").await?;

        let mut jobs = BTreeMap::new();
        for (job_id, value) in raw {
            if value.is_null() {
                continue;
            }
            match serde_json::from_value::<RemindJob>(value) {
                Ok(job) => {
                    jobs.insert(job_id, job);
                }
                Err(e) => {
                    // A malformed record must not poison the whole tick.
                    warn!(job_id = %job_id, error = %e, "Skipping malformed remind job");
                }
            }
        }
        Ok(jobs)
    }

    async fn set_retry_times(&self, job_id: &str, retry_times: u32) -> Result<(), StoreError> {
        self.put(
            &format!("remindJobs/{job_id}/retryTimes"),
            &serde_json::json!(retry_times),
        )
        .await
    }

    async fn delete_remind_job(&self, job_id: &str) -> Result<(), StoreError> {
        self.delete(&format!("remindJobs/{job_id}")).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_without_auth() {
        let store = FirebaseStore::new("https://example.firebaseio.com/", None);
        assert_eq!(
            store.url("banned/user-1"),
            "https://example.firebaseio.com/banned/user-1.json"
        );
    }

    #[test]
    fn url_with_auth() {
        let store = FirebaseStore::new(
            "https://example.firebaseio.com",
            Some(SecretString::from("s3cret")),
        );
        assert_eq!(
            store.url("settings"),
            "https://example.firebaseio.com/settings.json?auth=s3cret"
        );
    }
}
