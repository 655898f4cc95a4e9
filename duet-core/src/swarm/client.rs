//! Federated swarm transport: upload this client's packaged weight deltas,
//! download the global aggregate, and merge it back in — with an offline
//! queue so a network outage never blocks local learning.

use super::packet::{self, SignedPacket, WeightPacket};
use crate::cancel::CancellationSignal;
use crate::config::{SwarmConfig, SwarmSchedule};
use crate::error::{Error, Result};
use crate::fsutil;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_RETRIES: u32 = 3;
const INITIAL_BACKOFF: Duration = Duration::from_millis(250);

pub fn default_queue_path(root: &Path) -> PathBuf {
    root.join("learning").join("swarm-queue.jsonl")
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueuedUpload {
    pub signed: SignedPacket,
    pub queued_at: DateTime<Utc>,
}

/// Tracks the last time each schedule kind ran, so `is_due` can be checked
/// cheaply without a background timer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScheduleState {
    pub last_run: Option<DateTime<Utc>>,
}

impl ScheduleState {
    pub fn is_due(&self, schedule: SwarmSchedule, now: DateTime<Utc>) -> bool {
        let Some(last_run) = self.last_run else {
            return true;
        };
        let elapsed = now - last_run;
        match schedule {
            SwarmSchedule::Session => true,
            SwarmSchedule::Hourly => elapsed >= chrono::Duration::hours(1),
            SwarmSchedule::Daily => elapsed >= chrono::Duration::days(1),
        }
    }
}

pub struct SwarmClient {
    http: Client,
    config: SwarmConfig,
    root: PathBuf,
}

impl SwarmClient {
    pub fn new(config: SwarmConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            config,
            root: root.into(),
        }
    }

    fn endpoint(&self) -> Result<&str> {
        self.config
            .endpoint
            .as_deref()
            .ok_or_else(|| Error::network_unavailable("no swarm endpoint configured"))
    }

    /// Package `packet` (scrub, noise, checksum) and attempt upload with
    /// exponential backoff; on persistent failure, enqueue for offline
    /// retry instead of propagating the error. `cancel`, if given, is
    /// checked before each backoff retry, the natural step boundary of this
    /// suspension point.
    pub async fn upload(
        &self,
        packet: &WeightPacket,
        cancel: Option<&CancellationSignal>,
    ) -> Result<()> {
        let signed = packet::package(packet, self.config.noise_sigma)?;
        self.drain_queue().await;

        match self.try_upload(&signed, cancel).await {
            Ok(()) => Ok(()),
            Err(_) => self.enqueue(signed),
        }
    }

    async fn try_upload(
        &self,
        signed: &SignedPacket,
        cancel: Option<&CancellationSignal>,
    ) -> Result<()> {
        let endpoint = self.endpoint()?;
        let mut backoff = INITIAL_BACKOFF;
        let mut last_err = None;

        for attempt in 0..MAX_RETRIES {
            if cancel.is_some_and(|signal| signal.is_cancelled()) {
                return Err(Error::Internal("swarm upload cancelled".to_string()));
            }
            match self.http.post(endpoint).json(signed).send().await {
                Ok(response) if response.status().is_success() => return Ok(()),
                Ok(response) => {
                    last_err = Some(Error::network_unavailable(format!(
                        "swarm upload rejected with status {}",
                        response.status()
                    )));
                }
                Err(e) => last_err = Some(Error::from(e)),
            }

            if attempt + 1 < MAX_RETRIES {
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
        }

        Err(last_err.unwrap_or_else(|| Error::network_unavailable("swarm upload failed")))
    }

    fn enqueue(&self, signed: SignedPacket) -> Result<()> {
        fsutil::append_jsonl(
            &default_queue_path(&self.root),
            &QueuedUpload {
                signed,
                queued_at: Utc::now(),
            },
        )
    }

    /// Drain the offline queue FIFO, retrying the oldest entry first and
    /// stopping at the first failure (the queue stays intact for next time).
    pub async fn drain_queue(&self) {
        let path = default_queue_path(&self.root);
        let Ok(queued) = fsutil::read_jsonl::<QueuedUpload>(&path) else {
            return;
        };
        if queued.is_empty() {
            return;
        }

        let mut remaining = queued;
        while let Some(front) = remaining.first().cloned() {
            if self.try_upload(&front.signed, None).await.is_ok() {
                remaining.remove(0);
            } else {
                break;
            }
        }

        let _ = rewrite_queue(&path, &remaining);
    }

    /// Download the global aggregate — full or delta — verify its checksum,
    /// and merge it into `local` at the configured ratio. A delta response
    /// names which categories it actually carries (§4.7 Download); only
    /// those are merged, so categories the server omitted are left as
    /// `local` already had them rather than pulled toward zero. Aborts the
    /// merge (returning the error) on a checksum mismatch rather than
    /// trusting unverified data. `cancel`, if given, is checked before the
    /// request is sent.
    pub async fn download_and_merge(
        &self,
        local: &WeightPacket,
        cancel: Option<&CancellationSignal>,
    ) -> Result<WeightPacket> {
        if cancel.is_some_and(|signal| signal.is_cancelled()) {
            return Err(Error::Internal("swarm download cancelled".to_string()));
        }
        let endpoint = self.endpoint()?;
        let response = self.http.get(endpoint).send().await?;
        let delta: packet::DeltaPacket = response.json().await?;
        let signed = &delta.signed;

        if !packet::verify_checksum(signed)? {
            return Err(Error::checksum_mismatch(
                signed.checksum.clone(),
                packet::checksum(&signed.weights, &signed.version, signed.timestamp)?,
            ));
        }

        let local_ratio = 1.0 - self.config.merge_ratio;
        Ok(local.merge_categories(&signed.weights, local_ratio, &delta.categories()))
    }
}

fn rewrite_queue(path: &Path, remaining: &[QueuedUpload]) -> Result<()> {
    if remaining.is_empty() {
        if path.exists() {
            std::fs::remove_file(path)?;
        }
        return Ok(());
    }
    let mut content = String::new();
    for item in remaining {
        content.push_str(&serde_json::to_string(item)?);
        content.push('\n');
    }
    fsutil::atomic_write(path, content.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SwarmSchedule;

    #[test]
    fn session_schedule_is_always_due() {
        let state = ScheduleState { last_run: Some(Utc::now()) };
        assert!(state.is_due(SwarmSchedule::Session, Utc::now()));
    }

    #[test]
    fn hourly_schedule_waits_an_hour() {
        let state = ScheduleState { last_run: Some(Utc::now()) };
        assert!(!state.is_due(SwarmSchedule::Hourly, Utc::now() + chrono::Duration::minutes(30)));
        assert!(state.is_due(SwarmSchedule::Hourly, Utc::now() + chrono::Duration::hours(2)));
    }

    #[tokio::test]
    async fn upload_without_endpoint_enqueues_offline() {
        let dir = tempfile::tempdir().unwrap();
        let client = SwarmClient::new(SwarmConfig::default(), dir.path());
        let packet = WeightPacket::default();
        client.upload(&packet, None).await.unwrap();
        let queued: Vec<QueuedUpload> = fsutil::read_jsonl(&default_queue_path(dir.path())).unwrap();
        assert_eq!(queued.len(), 1);
    }

    #[tokio::test]
    async fn upload_aborts_immediately_once_cancelled() {
        let dir = tempfile::tempdir().unwrap();
        let client = SwarmClient::new(
            SwarmConfig {
                endpoint: Some("https://example.invalid/swarm".to_string()),
                ..SwarmConfig::default()
            },
            dir.path(),
        );
        let packet = WeightPacket::default();
        let (token, signal) = crate::cancel::CancellationToken::new();
        token.cancel();
        // cancelled before the first retry, so it enqueues rather than ever calling out
        client.upload(&packet, Some(&signal)).await.unwrap();
        let queued: Vec<QueuedUpload> = fsutil::read_jsonl(&default_queue_path(dir.path())).unwrap();
        assert_eq!(queued.len(), 1);
    }
}
