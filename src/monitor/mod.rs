// src/monitor/mod.rs

//! Client side of the hardware-monitor channel.
//!
//! A monitor process sits next to the device and serves register reads and
//! writes over a shared [`MessageStore`]. Requests are encoded as
//! `C {R|W|WW} <address> <len> [data...]`; a response is accepted once its
//! first token is the literal `R`. Completion is detected by polling with a
//! fixed backoff and an optional deadline, like every other long-running
//! collaborator in this crate.
//!
//! One client instance per device; construct it with its store and pass it by
//! reference. There is no process-wide connection state.

pub mod message_store;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, anyhow};
use chrono::{NaiveDateTime, Utc};
use tokio::time::{Instant, sleep};
use tracing::{debug, info};

use crate::errors::{HdlflowError, Result};

pub use message_store::{FileMessageStore, MemoryMessageStore, MessageStore};

/// Fixed poll interval while waiting for a response.
const RESPONSE_POLL: Duration = Duration::from_millis(100);

/// Poll interval while waiting for the monitor to die.
const KILL_POLL: Duration = Duration::from_secs(1);

/// Heartbeats older than this many seconds mean the monitor is gone.
const LIVENESS_WINDOW_SECS: i64 = 30;

/// Timestamp format used on the listened/heartbeat keys.
const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";

/// Request/response client for one monitored device.
pub struct MonitorClient {
    store: Arc<dyn MessageStore>,
    hwcode: String,
    comm_key: String,
    listened_key: String,
    kill_key: String,
    alive_key: String,
}

impl MonitorClient {
    pub fn new(store: Arc<dyn MessageStore>, hwcode: &str) -> Result<Self> {
        if hwcode.is_empty() {
            return Err(anyhow!("hardware code is empty").into());
        }
        info!(hwcode = %hwcode, "creating monitor client");
        Ok(Self {
            store,
            hwcode: hwcode.to_string(),
            comm_key: format!("{hwcode}_comm"),
            listened_key: format!("{hwcode}_last_B"),
            kill_key: format!("{hwcode}_kill"),
            alive_key: format!("{hwcode}_alive"),
        })
    }

    pub fn hwcode(&self) -> &str {
        &self.hwcode
    }

    /// Whether the monitor's heartbeat is within the liveness window.
    pub fn is_monitor_alive(&self) -> Result<bool> {
        let Some(stamp) = self.store.get(&self.alive_key)? else {
            return Ok(false);
        };
        let parsed = NaiveDateTime::parse_from_str(stamp.trim(), STAMP_FORMAT)
            .with_context(|| format!("parsing heartbeat stamp {stamp:?}"))?;
        let age = Utc::now().naive_utc() - parsed;
        Ok(age.num_seconds() < LIVENESS_WINDOW_SECS)
    }

    /// Stamp the heartbeat key. Called by the monitor side; exposed here so
    /// tests can stand in for a monitor.
    pub fn heartbeat(&self) -> Result<()> {
        self.store
            .set(&self.alive_key, &Utc::now().format(STAMP_FORMAT).to_string())
    }

    /// Ask the monitor to exit, polling liveness until `time_limit`.
    ///
    /// Fails loudly with `LivenessTimeout` if the monitor outlives its
    /// budget; no implicit retry.
    pub async fn kill_monitor(&self, time_limit: Duration) -> Result<()> {
        self.store.set(&self.kill_key, "1")?;
        let deadline = Instant::now() + time_limit;
        while Instant::now() < deadline && self.is_monitor_alive()? {
            sleep(KILL_POLL).await;
        }
        if self.is_monitor_alive()? {
            return Err(HdlflowError::LivenessTimeout(format!(
                "monitor {} still alive {:?} after kill request",
                self.hwcode, time_limit
            )));
        }
        Ok(())
    }

    /// Poll the channel until a response (first token `R`) appears or the
    /// deadline passes. Each poll stamps the listened key so the monitor can
    /// tell someone is still there.
    pub async fn wait_for_response(&self, timeout: Option<Duration>) -> Result<String> {
        let deadline = timeout.map(|t| Instant::now() + t);
        loop {
            let value = self.store.get(&self.comm_key)?;
            // Every poll stamps the listened key, the accepting one included.
            self.store.set(
                &self.listened_key,
                &Utc::now().format(STAMP_FORMAT).to_string(),
            )?;
            if let Some(value) = value {
                if value.split_whitespace().next() == Some("R") {
                    debug!(hwcode = %self.hwcode, "monitor response accepted");
                    return Ok(value);
                }
            }
            if let Some(deadline) = deadline {
                if Instant::now() >= deadline {
                    return Err(HdlflowError::LivenessTimeout(format!(
                        "no response from monitor {} within {:?}",
                        self.hwcode, timeout
                    )));
                }
            }
            sleep(RESPONSE_POLL).await;
        }
    }

    /// Write `data` to `address` on the device.
    pub async fn write(
        &self,
        address: u64,
        data: &[u32],
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.send_request(&encode_write("W", address, data))?;
        self.wait_for_response(timeout).await?;
        Ok(())
    }

    /// Write `data` to `address` repeatedly (burst to a single register).
    pub async fn write_repeat(
        &self,
        address: u64,
        data: &[u32],
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.send_request(&encode_write("WW", address, data))?;
        self.wait_for_response(timeout).await?;
        Ok(())
    }

    /// Read `length` words starting at `address`.
    pub async fn read(
        &self,
        address: u64,
        length: usize,
        timeout: Option<Duration>,
    ) -> Result<Vec<u32>> {
        self.send_request(&format!("C R {address} {length}"))?;
        let response = self.wait_for_response(timeout).await?;
        parse_read_response(&response)
    }

    fn send_request(&self, request: &str) -> Result<()> {
        debug!(hwcode = %self.hwcode, request = %request, "sending monitor request");
        self.store.set(&self.comm_key, request)
    }
}

fn encode_write(op: &str, address: u64, data: &[u32]) -> String {
    let words: Vec<String> = data.iter().map(|d| d.to_string()).collect();
    format!("C {op} {address} {} {}", data.len(), words.join(" "))
}

/// Data words of a read response: hex tokens after `R <op> <address>`.
fn parse_read_response(response: &str) -> Result<Vec<u32>> {
    response
        .split_whitespace()
        .skip(3)
        .map(|token| {
            u32::from_str_radix(token, 16)
                .with_context(|| format!("parsing response word {token:?}"))
                .map_err(Into::into)
        })
        .collect()
}
