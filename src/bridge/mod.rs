//! Polling loop of the charger service
//!
//! One task owns the point set and does all the work in turn: the telemetry
//! refresh, the sign of life log and the writes coming in from the bus. Nothing
//! runs in parallel, so a write that arrives during a refresh waits until the
//! refresh is done.
//!
//! The heartbeat shares that queue. A charger that is slow to answer delays
//! the next sign of life by up to the HTTP timeout; ticks missed that way are
//! delayed, not fired in a burst.

use chrono::Local;
use log::{debug, error, info, warn};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::time::{interval, interval_at, Instant, Interval, MissedTickBehavior};
use crate::command::{accepted_value, CommandDispatcher, WriteOutcome};
use crate::config::{Config, ConfigProvider};
use crate::error::Result;
use crate::points::{paths, ExternalWrite, PointChange, PointService, PointValue, ValueKind, DATA_POINTS};
use crate::translate::translate;
use crate::trydan::TrydanClient;

pub mod heartbeat;

use heartbeat::Heartbeat;

const SIGN_OF_LIFE_MAX: Duration = Duration::from_secs(365 * 24 * 3600);

pub struct ChargerBridge {
    client: TrydanClient,
    dispatcher: CommandDispatcher,
    points: PointService,
    heartbeat: Heartbeat,
    publisher: Option<Sender<Vec<PointChange>>>,
    poll_interval: Duration,
    sign_of_life: Option<Duration>,
}

/// Register every path the service exposes, with its initial value
pub fn register_points(config: &Config) -> PointService {
    let mut points = PointService::new(config.service_name());
    let text = |s: &str| PointValue::Text(s.to_string());

    points.register_point("/Mgmt/ProcessName", text(env!("CARGO_PKG_NAME")), ValueKind::Raw, false);
    points.register_point("/Mgmt/ProcessVersion", text(env!("CARGO_PKG_VERSION")), ValueKind::Raw, false);
    points.register_point("/Mgmt/Connection", text("V2C JSON API"), ValueKind::Raw, false);

    points.register_point("/DeviceInstance", PointValue::Int(config.device.instance as i64), ValueKind::Raw, false);
    points.register_point("/ProductId", PointValue::Int(0xFFFF), ValueKind::Raw, false);
    points.register_point("/ProductName", text(&config.device.product_name), ValueKind::Raw, false);
    points.register_point("/CustomName", text(&config.device.product_name), ValueKind::Raw, false);
    points.register_point("/FirmwareVersion", text(&config.device.firmware_version), ValueKind::Raw, false);
    points.register_point("/HardwareVersion", PointValue::Int(config.device.hardware_version as i64), ValueKind::Raw, false);
    points.register_point("/Serial", text(&config.device.serial), ValueKind::Raw, false);
    points.register_point(paths::CONNECTED, PointValue::Int(1), ValueKind::Raw, false);
    points.register_point(paths::UPDATE_INDEX, PointValue::Int(0), ValueKind::Raw, false);

    points.register_point("/Status", PointValue::Empty, ValueKind::Raw, false);
    points.register_point("/Mode", PointValue::Empty, ValueKind::Raw, false);

    for def in DATA_POINTS.iter() {
        points.register_point(def.path, PointValue::Int(0), def.kind, def.writable);
    }

    points.register_point(paths::WRITE_FAULT, PointValue::Int(0), ValueKind::Raw, false);
    return points;
}

async fn tick_opt(interval: &mut Option<Interval>) {
    match interval {
        Some(i) => { i.tick().await; },
        None => std::future::pending::<()>().await,
    }
}

impl ChargerBridge {
    pub fn new(config: Arc<dyn ConfigProvider>) -> Result<Self> {
        let c = config.get()?;
        let client = TrydanClient::new(config.clone(), Duration::from_secs(c.bridge.http_timeout_secs))?;
        let dispatcher = CommandDispatcher::new(client.clone(), config);

        info!("Registering {} for charger at {}", c.service_name(), c.device.host);

        return Ok(ChargerBridge {
            client,
            dispatcher,
            points: register_points(&c),
            heartbeat: Heartbeat::new(),
            publisher: None,
            poll_interval: Duration::from_millis(c.bridge.poll_interval_ms.max(1)),
            sign_of_life: match c.bridge.sign_of_life_minutes {
                0 => None,
                m => Some(Duration::from_secs(m.saturating_mul(60)).min(SIGN_OF_LIFE_MAX)),
            },
        });
    }

    /// Hand changed points to the bus transport after every turn. The bridge
    /// never waits for the transport: a full queue keeps the changes for the
    /// next turn.
    pub fn with_publisher(mut self, publisher: Sender<Vec<PointChange>>) -> Self {
        self.publisher = Some(publisher);
        return self;
    }

    pub fn points(&self) -> &PointService {
        return &self.points;
    }

    pub fn heartbeat(&self) -> &Heartbeat {
        return &self.heartbeat;
    }

    fn flush(&mut self) {
        if !self.points.has_changes() {
            return;
        }

        let changes = self.points.take_changes();
        let publisher = match &self.publisher {
            Some(p) => p,
            None => return,
        };

        match publisher.try_send(changes) {
            Ok(()) => {},
            Err(TrySendError::Full(changes)) => {
                debug!("Bus transport is busy, {} changes wait for the next turn", changes.len());
                self.points.requeue(changes);
            },
            Err(TrySendError::Closed(_)) => {
                warn!("Bus transport is gone, changes are not published");
                self.publisher = None;
            }
        }
    }

    /// Fetch, translate and publish one snapshot. Returns the new update index.
    /// On any error no point is touched.
    pub async fn refresh(&mut self) -> Result<u8> {
        let doc = self.client.fetch().await?;
        let values = translate(&doc)?;

        for (path, value) in values {
            self.points.set_point(path, value);
        }

        let index = self.points.bump_update_index();
        let power = self.points.get_point(paths::CHARGE_POWER).cloned().unwrap_or_default();
        debug!("Trydan Consumption (/ChargePower): {power}");
        debug!("Trydan Current charging session Energy (/ChargeEnergy): {}",
               self.points.get_text("/ChargeEnergy").unwrap_or_default());

        self.heartbeat.record(Local::now(), power);
        self.flush();
        return Ok(index);
    }

    async fn on_refresh_tick(&mut self) {
        if let Err(e) = self.refresh().await {
            error!("Refresh failed, keeping the last values: {e}");
        }
    }

    /// Apply a write from another bus client
    pub async fn handle_write(&mut self, write: ExternalWrite) -> WriteOutcome {
        let outcome = match PointValue::from_json(&write.value) {
            None => {
                warn!("Write to {} with unusable value {} ignored", write.path, write.value);
                WriteOutcome::InvalidValue
            },
            Some(_) if !self.points.is_writable(&write.path) => {
                warn!("Write to read-only or unknown point {} ignored", write.path);
                WriteOutcome::Unrouted
            },
            Some(value) => {
                let outcome = self.dispatcher.handle_write(&write.path, &value).await;
                if let Some(stored) = accepted_value(&write.path, &value).filter(|_| outcome.is_accepted()) {
                    self.points.set_point(&write.path, stored);
                }
                outcome
            }
        };

        self.points.set_point(paths::WRITE_FAULT, PointValue::Int(outcome.fault_code()));
        self.flush();
        return outcome;
    }

    /// Run until `shutdown` resolves. Writes are taken from `writes` between
    /// the periodic tasks.
    pub async fn run<F: Future>(mut self, mut writes: Receiver<ExternalWrite>, shutdown: F) -> Self {
        self.flush();

        let mut refresh = interval(self.poll_interval);
        refresh.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut sign_of_life = self.sign_of_life.map(|period| {
            let mut i = interval_at(Instant::now() + period, period);
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            i
        });

        let mut writes_open = true;
        tokio::pin!(shutdown);

        info!("Polling charger every {:?}", self.poll_interval);
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, leaving the polling loop");
                    break;
                },
                _ = refresh.tick() => self.on_refresh_tick().await,
                _ = tick_opt(&mut sign_of_life) => self.heartbeat.log(),
                write = writes.recv(), if writes_open => match write {
                    Some(w) => { self.handle_write(w).await; },
                    None => {
                        debug!("No more bus writes to expect");
                        writes_open = false;
                    }
                },
            }
        }

        return self;
    }
}
