//! Data orchestrator implementation.
//!
//! Read path: durable cache, then (on miss, expiry or checksum mismatch) one
//! coalesced fetch from the source of truth per key. Fresh records are
//! written through to the cache before they are returned.
//!
//! Each key carries an invalidation epoch. A flight records the epoch when it
//! starts and never persists its snapshot once the epoch has moved.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use crate::bus::{ChangeBus, ChangeEvent};
use crate::cache::DurableCache;
use crate::freshness::FreshnessPolicy;
use crate::metrics::{
    CACHE_INVALIDATIONS, CACHE_LOOKUPS, CHANGE_EVENTS_PUBLISHED, COLLABORATOR_UP,
    SINGLE_FLIGHT_JOINS, UPSTREAM_FETCHES, UPSTREAM_FETCH_DURATION,
};
use crate::source::{RecordFilter, SourceOfTruth};
use crate::ticket::{CachedTicket, TicketKey, TicketRecord, TicketTable};

use super::config::OrchestratorConfig;
use super::single_flight::SingleFlight;
use super::types::{
    hit_ratio, CacheStatsReport, HealthReport, LookupOutcome, OrchestratorError, TicketDetails,
};

/// Collaborators shared with in-flight refreshes.
struct Refresher {
    cache: Arc<dyn DurableCache>,
    source: Arc<dyn SourceOfTruth>,
    bus: Option<Arc<dyn ChangeBus>>,
    policy: FreshnessPolicy,
    config: OrchestratorConfig,
    invalidations: Mutex<HashMap<TicketKey, u64>>,
}

/// Single entry point for reading, invalidating and monitoring cached tickets.
pub struct DataOrchestrator {
    refresher: Arc<Refresher>,
    flights: SingleFlight<TicketKey, LookupOutcome>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl DataOrchestrator {
    pub fn new(
        cache: Arc<dyn DurableCache>,
        source: Arc<dyn SourceOfTruth>,
        bus: Option<Arc<dyn ChangeBus>>,
        policy: FreshnessPolicy,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            refresher: Arc::new(Refresher {
                cache,
                source,
                bus,
                policy,
                config,
                invalidations: Mutex::new(HashMap::new()),
            }),
            flights: SingleFlight::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.refresher.config
    }

    pub fn policy(&self) -> &FreshnessPolicy {
        &self.refresher.policy
    }

    /// Get a ticket, `None` if the source of truth has no such record.
    pub async fn get_ticket_details(
        &self,
        sys_id: &str,
        table: &TicketTable,
    ) -> Result<Option<TicketDetails>, OrchestratorError> {
        self.lookup(sys_id, table).await.into_result()
    }

    /// Look up a ticket and report how the result was obtained.
    pub async fn lookup(&self, sys_id: &str, table: &TicketTable) -> LookupOutcome {
        let key = TicketKey::new(sys_id, table.clone());

        match self.refresher.read_cached(&key).await {
            Some(ticket) if ticket.is_fresh_at(Utc::now()) => {
                debug!("Cache hit for {}", key);
                let outcome = LookupOutcome::Hit(TicketDetails::from_cache(ticket, false));
                self.record(&outcome);
                return outcome;
            }
            Some(ticket) => debug!(
                "Cached {} expired at {}, refreshing",
                key, ticket.metadata.expires_at
            ),
            None => debug!("Cache miss for {}", key),
        }

        let refresher = Arc::clone(&self.refresher);
        let flight_key = key.clone();
        let (outcome, leader) = self
            .flights
            .run(key, move || {
                let started = refresher.invalidation_epoch(&flight_key);
                async move { refresher.refresh(flight_key, started).await }
            })
            .await;

        if !leader {
            SINGLE_FLIGHT_JOINS.inc();
        }
        self.record(&outcome);

        outcome
    }

    fn record(&self, outcome: &LookupOutcome) {
        let counter = match outcome {
            LookupOutcome::Hit(_) => &self.hits,
            _ => &self.misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
        CACHE_LOOKUPS.with_label_values(&[outcome.label()]).inc();
    }

    /// Drop the cached copy of a ticket. Invalidating an uncached key is a no-op.
    ///
    /// A fetch already in flight for the key is detached, so later callers
    /// fetch again. Its callers still receive the record, but it is not persisted.
    pub async fn invalidate_ticket(
        &self,
        sys_id: &str,
        table: &TicketTable,
    ) -> Result<(), OrchestratorError> {
        let key = TicketKey::new(sys_id, table.clone());

        // Bump before deleting so a write-through racing the delete sees it.
        self.refresher.bump_invalidation(&key);

        self.refresher
            .cache
            .delete(table, sys_id)
            .await
            .map_err(|e| OrchestratorError::CacheUnavailable {
                reason: e.to_string(),
            })?;

        self.flights.forget(&key);
        CACHE_INVALIDATIONS.inc();
        info!("Invalidated cached {}", key);

        self.refresher
            .publish(ChangeEvent::invalidated(&key))
            .await;

        Ok(())
    }

    /// Probe every collaborator in parallel, each bounded by the probe timeout.
    pub async fn get_health_status(&self) -> HealthReport {
        let timeout = Duration::from_millis(self.refresher.config.health_probe_timeout_ms);
        let r = &self.refresher;

        let (cache_up, source_up, bus_up) = tokio::join!(
            probe("durable_cache", timeout, r.cache.health_check()),
            probe("source_of_truth", timeout, r.source.get_health_status()),
            async {
                match &r.bus {
                    Some(bus) => Some(probe("change_bus", timeout, bus.health_check()).await),
                    None => None,
                }
            }
        );

        HealthReport::from_probes(cache_up, source_up, bus_up)
    }

    /// Durable cache population plus the running hit ratio.
    pub async fn get_cache_stats(&self) -> Result<CacheStatsReport, OrchestratorError> {
        let durable_documents = self
            .refresher
            .cache
            .count_documents()
            .await
            .map_err(|e| OrchestratorError::CacheUnavailable {
                reason: e.to_string(),
            })?;

        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);

        Ok(CacheStatsReport {
            durable_documents,
            cache_hit_ratio: hit_ratio(hits, misses),
            hits,
            misses,
            in_flight: self.flights.in_flight(),
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Refresher {
    /// Read the cached copy, treating read errors and checksum mismatches as a miss.
    async fn read_cached(&self, key: &TicketKey) -> Option<CachedTicket> {
        match self.cache.find_by_key(&key.sys_id, &key.table).await {
            Ok(Some(ticket)) if !ticket.verify_checksum() => {
                warn!("Checksum mismatch for cached {}, treating as miss", key);
                None
            }
            Ok(found) => found,
            Err(e) => {
                warn!(
                    "Durable cache read failed for {}, reading through to source: {}",
                    key, e
                );
                None
            }
        }
    }

    fn invalidation_epoch(&self, key: &TicketKey) -> u64 {
        lock(&self.invalidations).get(key).copied().unwrap_or(0)
    }

    fn bump_invalidation(&self, key: &TicketKey) {
        *lock(&self.invalidations).entry(key.clone()).or_insert(0) += 1;
    }

    fn invalidated_since(&self, key: &TicketKey, started: u64) -> bool {
        self.invalidation_epoch(key) != started
    }

    /// Fetch, persist and announce one key. Runs once per flight.
    async fn refresh(&self, key: TicketKey, started: u64) -> LookupOutcome {
        // A flight that ended after the caller's cache read may already have stored the record.
        let previous = match self.read_cached(&key).await {
            Some(ticket) if ticket.is_fresh_at(Utc::now()) => {
                debug!("{} stored by an earlier flight, skipping fetch", key);
                return LookupOutcome::Hit(TicketDetails::from_cache(ticket, false));
            }
            other => other,
        };

        let timeout = Duration::from_millis(self.config.fetch_timeout_ms);
        let filter = RecordFilter::by_sys_id(key.sys_id.clone());

        let timer = UPSTREAM_FETCH_DURATION.start_timer();
        let fetched =
            tokio::time::timeout(timeout, self.source.fetch_full_record(&key.table, &filter)).await;
        timer.observe_duration();

        let failure = match fetched {
            Ok(Ok(result)) => {
                let record = result.result.into_iter().find(|r| r.sys_id == key.sys_id);
                return match record {
                    Some(record) => {
                        UPSTREAM_FETCHES.with_label_values(&["found"]).inc();
                        self.store(record, started).await
                    }
                    None => {
                        UPSTREAM_FETCHES.with_label_values(&["not_found"]).inc();
                        self.forget_missing(&key, previous.is_some()).await;
                        LookupOutcome::NotFound
                    }
                };
            }
            Ok(Err(e)) => {
                UPSTREAM_FETCHES.with_label_values(&["error"]).inc();
                e.to_string()
            }
            Err(_) => {
                UPSTREAM_FETCHES.with_label_values(&["timeout"]).inc();
                format!("fetch timed out after {}ms", self.config.fetch_timeout_ms)
            }
        };

        warn!("Upstream fetch failed for {}: {}", key, failure);
        let error = OrchestratorError::UpstreamUnavailable {
            key: key.to_string(),
            reason: failure,
        };

        match previous {
            Some(ticket) if self.config.serve_stale_on_upstream_error => {
                warn!(
                    "Serving stale {} (expired at {})",
                    key, ticket.metadata.expires_at
                );
                LookupOutcome::Stale {
                    details: TicketDetails::from_cache(ticket, true),
                    error,
                }
            }
            _ => LookupOutcome::UpstreamError(error),
        }
    }

    async fn store(&self, record: TicketRecord, started: u64) -> LookupOutcome {
        let decision = self.policy.decide(&record);
        let mut ticket = CachedTicket::new(record, &decision, Utc::now());
        let key = ticket.key();

        if self.invalidated_since(&key, started) {
            info!("{} invalidated during fetch, returning uncached", key);
            return LookupOutcome::Miss(TicketDetails::from_source(ticket, false));
        }

        let persisted = match self.cache.upsert(&ticket).await {
            Ok(_) if self.invalidated_since(&key, started) => {
                info!("{} invalidated while caching, dropping the write", key);
                if let Err(e) = self.cache.delete(&key.table, &key.sys_id).await {
                    warn!("Failed to drop superseded cache entry for {}: {}", key, e);
                }
                false
            }
            Ok(version) => {
                ticket.metadata.version = version;
                true
            }
            Err(e) => {
                warn!("Failed to cache {}, returning uncached: {}", key, e);
                false
            }
        };

        info!(
            "Fetched {} from source (ttl={}ms, refresh_priority={}, version={})",
            key,
            decision.ttl_ms,
            decision.refresh_priority.as_str(),
            ticket.metadata.version
        );

        if persisted {
            self.publish(ChangeEvent::refreshed(&ticket)).await;
        }

        LookupOutcome::Miss(TicketDetails::from_source(ticket, persisted))
    }

    /// The ticket is gone upstream; drop any expired copy we still hold.
    async fn forget_missing(&self, key: &TicketKey, had_copy: bool) {
        debug!("{} not found at source", key);
        if !had_copy {
            return;
        }

        match self.cache.delete(&key.table, &key.sys_id).await {
            Ok(()) => self.publish(ChangeEvent::invalidated(key)).await,
            Err(e) => warn!("Failed to drop cached {} after upstream miss: {}", key, e),
        }
    }

    /// Publish on the change bus, if any. Failures are logged, never returned.
    async fn publish(&self, event: ChangeEvent) {
        let Some(bus) = &self.bus else {
            return;
        };

        let timeout = Duration::from_millis(self.config.publish_timeout_ms);
        match tokio::time::timeout(timeout, bus.publish_change(&event)).await {
            Ok(Ok(id)) => {
                CHANGE_EVENTS_PUBLISHED.with_label_values(&["ok"]).inc();
                debug!("Published {:?} for {} as {}", event.kind, event.key(), id);
            }
            Ok(Err(e)) => {
                CHANGE_EVENTS_PUBLISHED.with_label_values(&["error"]).inc();
                warn!("Failed to publish change for {}: {}", event.key(), e);
            }
            Err(_) => {
                CHANGE_EVENTS_PUBLISHED.with_label_values(&["error"]).inc();
                warn!("Publishing change for {} timed out", event.key());
            }
        }
    }
}

/// Run one health probe, folding errors and timeouts into `false`.
async fn probe<F, E>(collaborator: &str, timeout: Duration, check: F) -> bool
where
    F: Future<Output = Result<(), E>>,
    E: Display,
{
    let up = match tokio::time::timeout(timeout, check).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            warn!("Health probe failed for {}: {}", collaborator, e);
            false
        }
        Err(_) => {
            warn!(
                "Health probe for {} timed out after {}ms",
                collaborator,
                timeout.as_millis()
            );
            false
        }
    };

    COLLABORATOR_UP
        .with_label_values(&[collaborator])
        .set(i64::from(up));
    up
}
