//! Per-user daily triggers and the loop that fires them.

use crate::core::clock::Clock;
use crate::core::delivery::Delivery;
use crate::core::rate::RateProvider;
use crate::core::settings::{UserId, UserSettings};
use crate::core::storage::Storage;
use crate::message::format_rate_message;
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tracing::{debug, info, instrument, warn};

/// Longest single sleep of the scheduling loop.
const MAX_IDLE: std::time::Duration = std::time::Duration::from_secs(60);

/// When and for whom a daily notification runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub user_id: UserId,
    pub utc_hour: u32,
    pub utc_minute: u32,
    pub currency_code: String,
}

impl Trigger {
    /// `None` unless the user is enabled and has a currency and a valid UTC time.
    pub fn from_settings(settings: &UserSettings) -> Option<Self> {
        if !settings.notifications_enabled {
            return None;
        }
        let utc_hour = settings.utc_hour?;
        let utc_minute = settings.utc_minute?;
        NaiveTime::from_hms_opt(utc_hour, utc_minute, 0)?;
        Some(Self {
            user_id: settings.user_id,
            utc_hour,
            utc_minute,
            currency_code: settings.currency_code.clone()?,
        })
    }

    /// The first `utc_hour:utc_minute` strictly after `now`.
    pub fn next_fire_after(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let time = NaiveTime::from_hms_opt(self.utc_hour, self.utc_minute, 0).unwrap_or_default();
        let mut candidate = now.date_naive().and_time(time).and_utc();
        while candidate <= now {
            candidate += Duration::days(1);
        }
        candidate
    }
}

struct Armed {
    trigger: Trigger,
    generation: u64,
    fire_at: DateTime<Utc>,
}

/// Live triggers plus a min-heap of fire times. Heap entries whose generation
/// no longer matches the live trigger are skipped when they surface.
#[derive(Default)]
struct TriggerSet {
    live: HashMap<UserId, Armed>,
    queue: BinaryHeap<Reverse<(DateTime<Utc>, u64, UserId)>>,
    generation: u64,
}

impl TriggerSet {
    fn insert(&mut self, trigger: Trigger, now: DateTime<Utc>) -> DateTime<Utc> {
        let fire_at = trigger.next_fire_after(now);
        self.generation += 1;
        let generation = self.generation;
        self.queue
            .push(Reverse((fire_at, generation, trigger.user_id)));
        self.live.insert(
            trigger.user_id,
            Armed {
                trigger,
                generation,
                fire_at,
            },
        );
        fire_at
    }

    fn remove(&mut self, user_id: UserId) -> bool {
        self.live.remove(&user_id).is_some()
    }

    fn clear(&mut self) {
        self.live.clear();
        self.queue.clear();
    }

    fn len(&self) -> usize {
        self.live.len()
    }

    fn next_fire(&mut self) -> Option<DateTime<Utc>> {
        while let Some(Reverse((fire_at, generation, user_id))) = self.queue.peek().copied() {
            if self
                .live
                .get(&user_id)
                .is_some_and(|armed| armed.generation == generation)
            {
                return Some(fire_at);
            }
            self.queue.pop();
        }
        None
    }

    /// Pops every trigger due at `now` and re-arms it for its next day.
    fn take_due(&mut self, now: DateTime<Utc>) -> Vec<Trigger> {
        let mut due = Vec::new();
        while let Some(fire_at) = self.next_fire() {
            if fire_at > now {
                break;
            }
            let Some(Reverse((_, _, user_id))) = self.queue.pop() else {
                break;
            };
            if let Some(armed) = self.live.get(&user_id) {
                let trigger = armed.trigger.clone();
                due.push(trigger.clone());
                self.insert(trigger, now);
            }
        }
        due
    }
}

/// What happened to a single fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireOutcome {
    Delivered,
    /// No rate could be acquired; the day's notification is dropped.
    Skipped,
    DeliveryFailed,
}

struct Inner {
    storage: Arc<dyn Storage>,
    rates: Arc<dyn RateProvider>,
    delivery: Arc<dyn Delivery>,
    clock: Arc<dyn Clock>,
    triggers: Mutex<TriggerSet>,
    // Serialises reload_all and reschedule against each other.
    rebuild: tokio::sync::Mutex<()>,
    wake: Notify,
}

/// Owns the trigger set. Cloning yields another handle to the same scheduler.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        rates: Arc<dyn RateProvider>,
        delivery: Arc<dyn Delivery>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                storage,
                rates,
                delivery,
                clock,
                triggers: Mutex::new(TriggerSet::default()),
                rebuild: tokio::sync::Mutex::new(()),
                wake: Notify::new(),
            }),
        }
    }

    fn triggers(&self) -> MutexGuard<'_, TriggerSet> {
        self.inner
            .triggers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    /// Rebuilds the whole trigger set from storage. On a storage error the
    /// current set is kept.
    #[instrument(skip(self))]
    pub async fn reload_all(&self) -> Result<usize> {
        let _guard = self.inner.rebuild.lock().await;
        let users = self
            .inner
            .storage
            .get_all_enabled_users()
            .await
            .context("Failed to load subscribed users")?;

        let now = self.inner.clock.now();
        let count = {
            let mut set = self.triggers();
            set.clear();
            for trigger in users.iter().filter_map(Trigger::from_settings) {
                set.insert(trigger, now);
            }
            set.len()
        };
        self.inner.wake.notify_one();
        info!("Scheduled {} daily notifications", count);
        Ok(count)
    }

    /// Drops the user's trigger and re-creates it from their stored settings
    /// if they still qualify. Returns whether a trigger is now scheduled.
    #[instrument(skip(self))]
    pub async fn reschedule(&self, user_id: UserId) -> Result<bool> {
        let _guard = self.inner.rebuild.lock().await;
        let removed = self.triggers().remove(user_id);

        let settings = self
            .inner
            .storage
            .get_user_settings(user_id)
            .await
            .with_context(|| format!("Failed to load settings for user {user_id}"))?;

        let scheduled = match settings.as_ref().and_then(Trigger::from_settings) {
            Some(trigger) => {
                let now = self.inner.clock.now();
                let fire_at = self.triggers().insert(trigger, now);
                debug!(user_id, %fire_at, "Trigger armed");
                true
            }
            None => {
                if removed {
                    debug!(user_id, "Trigger removed");
                }
                false
            }
        };
        self.inner.wake.notify_one();
        Ok(scheduled)
    }

    pub fn trigger_for(&self, user_id: UserId) -> Option<Trigger> {
        self.triggers()
            .live
            .get(&user_id)
            .map(|armed| armed.trigger.clone())
    }

    pub fn next_fire_for(&self, user_id: UserId) -> Option<DateTime<Utc>> {
        self.triggers().live.get(&user_id).map(|armed| armed.fire_at)
    }

    pub fn len(&self) -> usize {
        self.triggers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn take_due(&self, now: DateTime<Utc>) -> Vec<Trigger> {
        self.triggers().take_due(now)
    }

    /// Discards every trigger.
    pub fn shutdown(&self) {
        self.triggers().clear();
        self.inner.wake.notify_one();
    }

    /// Drives fires until `shutdown` resolves, then discards all triggers.
    /// Each fire runs in its own task.
    pub async fn run<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!("Scheduler started with {} triggers", self.len());
        loop {
            let now = self.inner.clock.now();
            for trigger in self.take_due(now) {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    scheduler.fire(trigger).await;
                });
            }

            let idle = self
                .triggers()
                .next_fire()
                .map(|at| (at - now).to_std().unwrap_or_default())
                .map_or(MAX_IDLE, |wait| wait.min(MAX_IDLE));

            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.inner.wake.notified() => {}
                _ = tokio::time::sleep(idle) => {}
            }
        }
        self.shutdown();
        info!("Scheduler stopped");
    }

    /// Fetches the trigger's currency and delivers it. Failures are logged
    /// and never propagate.
    #[instrument(
        name = "Fire",
        skip(self, trigger),
        fields(user_id = trigger.user_id, currency = %trigger.currency_code)
    )]
    pub async fn fire(&self, trigger: Trigger) -> FireOutcome {
        let quote = match self.inner.rates.fetch(&trigger.currency_code).await {
            Ok(quote) => quote,
            Err(e) => {
                warn!(error = %e, "Skipping today's notification");
                return FireOutcome::Skipped;
            }
        };

        let text = format_rate_message(&quote);
        match self.inner.delivery.send_text(trigger.user_id, &text).await {
            Ok(()) => {
                info!(rate = %quote.rate, stale = quote.stale, "Notification delivered");
                FireOutcome::Delivered
            }
            Err(e) => {
                warn!(error = %e, "Delivery failed");
                FireOutcome::DeliveryFailed
            }
        }
    }
}
