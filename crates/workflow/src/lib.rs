//! Scheduling for recurring triage runs.
//!
//! Includes a zero-dependency cron expression parser supporting standard 5-field
//! expressions: `minute hour day-of-month month day-of-week`, with day names
//! (`sun`..`sat`) accepted in the last field. Times are local wall-clock time.

use std::fmt::Display;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime, Timelike};
use papertriage_config::ScheduleConfig;
use tracing::{debug, info, warn};

/// Day names accepted in the day-of-week field, indexed from Sunday = 0.
const DAY_NAMES: [&str; 7] = ["sun", "mon", "tue", "wed", "thu", "fri", "sat"];

/// How often the scheduler checks the clock. Twice a minute so no minute
/// is skipped when a tick is delayed.
const DEFAULT_TICK: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ScheduleError {
    #[error("Invalid cron expression '{expr}': {reason}")]
    InvalidExpression { expr: String, reason: String },
}

// ── Cron expression parser ──────────────────────────────────────────────────

/// A parsed 5-field cron expression: minute hour dom month dow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CronExpr {
    source: String,
    minutes: Vec<u32>,
    hours: Vec<u32>,
    days_of_month: Vec<u32>,
    months: Vec<u32>,
    days_of_week: Vec<u32>, // 0=Sun, 6=Sat
}

impl CronExpr {
    /// Parse a standard 5-field cron expression.
    ///
    /// Supports: `*`, `*/N` (step), `N` (literal), `N-M` (range), `N,M` (list),
    /// and `sun`..`sat` wherever a day-of-week number is allowed.
    pub fn parse(expr: &str) -> Result<Self, ScheduleError> {
        Self::parse_inner(expr).map_err(|reason| ScheduleError::InvalidExpression {
            expr: expr.to_string(),
            reason,
        })
    }

    fn parse_inner(expr: &str) -> Result<Self, String> {
        let fields: Vec<&str> = expr.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(format!(
                "Expected 5 fields (minute hour dom month dow), got {}",
                fields.len()
            ));
        }

        let dow = replace_day_names(fields[4])?;
        Ok(CronExpr {
            source: fields.join(" "),
            minutes: Self::parse_field(fields[0], 0, 59)?,
            hours: Self::parse_field(fields[1], 0, 23)?,
            days_of_month: Self::parse_field(fields[2], 1, 31)?,
            months: Self::parse_field(fields[3], 1, 12)?,
            days_of_week: Self::parse_field(&dow, 0, 6)?,
        })
    }

    fn parse_field(field: &str, min: u32, max: u32) -> Result<Vec<u32>, String> {
        let mut values = Vec::new();

        for part in field.split(',') {
            let part = part.trim();

            if let Some((base, step)) = part.split_once('/') {
                // Step: */N or M-N/S
                let step: u32 = step
                    .parse()
                    .map_err(|_| format!("Invalid step: {step}"))?;
                if step == 0 {
                    return Err("Step cannot be zero".into());
                }
                let (start, end) = if base == "*" {
                    (min, max)
                } else if base.contains('-') {
                    Self::parse_range(base, min, max)?
                } else {
                    (Self::parse_value(base, min, max)?, max)
                };
                values.extend((start..=end).step_by(step as usize));
            } else if part.contains('-') {
                // Range: M-N
                let (start, end) = Self::parse_range(part, min, max)?;
                values.extend(start..=end);
            } else if part == "*" {
                values.extend(min..=max);
            } else {
                values.push(Self::parse_value(part, min, max)?);
            }
        }

        values.sort_unstable();
        values.dedup();
        if values.is_empty() {
            return Err("Field produced no values".into());
        }
        Ok(values)
    }

    fn parse_value(s: &str, min: u32, max: u32) -> Result<u32, String> {
        let v: u32 = s.parse().map_err(|_| format!("Invalid number: {s}"))?;
        if v < min || v > max {
            return Err(format!("{v} out of range {min}-{max}"));
        }
        Ok(v)
    }

    fn parse_range(s: &str, min: u32, max: u32) -> Result<(u32, u32), String> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid range: {s}"))?;
        let start: u32 = start
            .parse()
            .map_err(|_| format!("Invalid range start: {start}"))?;
        let end: u32 = end
            .parse()
            .map_err(|_| format!("Invalid range end: {end}"))?;
        if start < min || end > max || start > end {
            return Err(format!("Range {start}-{end} invalid for {min}-{max}"));
        }
        Ok((start, end))
    }

    /// Check if the given time matches this cron expression.
    pub fn matches(&self, dt: &NaiveDateTime) -> bool {
        let dow = dt.weekday().num_days_from_sunday(); // 0=Sun

        self.minutes.contains(&dt.minute())
            && self.hours.contains(&dt.hour())
            && self.days_of_month.contains(&dt.day())
            && self.months.contains(&dt.month())
            && self.days_of_week.contains(&dow)
    }

    /// The first matching minute strictly after `after`, searching up to a
    /// year ahead.
    pub fn next_after(&self, after: &NaiveDateTime) -> Option<NaiveDateTime> {
        let mut candidate = truncate_to_minute(after) + chrono::Duration::minutes(1);
        for _ in 0..(366 * 24 * 60) {
            if self.matches(&candidate) {
                return Some(candidate);
            }
            candidate += chrono::Duration::minutes(1);
        }
        None
    }
}

impl Display for CronExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

/// Turn `mon-fri` into `1-5` so the numeric parser can handle it.
fn replace_day_names(field: &str) -> Result<String, String> {
    let lower = field.to_lowercase();
    let mut out = String::with_capacity(lower.len());
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| -> Result<(), String> {
        if word.is_empty() {
            return Ok(());
        }
        let idx = DAY_NAMES
            .iter()
            .position(|d| *d == word.as_str())
            .ok_or_else(|| format!("Unknown day name: {word}"))?;
        out.push_str(&idx.to_string());
        word.clear();
        Ok(())
    };

    for c in lower.chars() {
        if c.is_ascii_alphabetic() {
            word.push(c);
        } else {
            flush(&mut word, &mut out)?;
            out.push(c);
        }
    }
    flush(&mut word, &mut out)?;
    Ok(out)
}

fn truncate_to_minute(dt: &NaiveDateTime) -> NaiveDateTime {
    dt.with_second(0)
        .and_then(|d| d.with_nanosecond(0))
        .unwrap_or(*dt)
}

// ── Scheduler ───────────────────────────────────────────────────────────────

type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Runs a job every time the cron expression matches.
pub struct Scheduler {
    expr: CronExpr,
    tick: Duration,
    clock: Clock,
}

impl Scheduler {
    pub fn new(expr: CronExpr) -> Self {
        Self {
            expr,
            tick: DEFAULT_TICK,
            clock: Arc::new(|| Local::now().naive_local()),
        }
    }

    /// Build from `[schedule]`: an explicit `cron` wins over day/hour/minute.
    pub fn from_config(config: &ScheduleConfig) -> Result<Self, ScheduleError> {
        Ok(Self::new(CronExpr::parse(&config.cron_expression())?))
    }

    /// Replace the wall clock (used by tests).
    pub fn with_clock(mut self, clock: impl Fn() -> NaiveDateTime + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    pub fn expression(&self) -> &CronExpr {
        &self.expr
    }

    /// Next time the job will fire.
    pub fn next_run(&self) -> Option<NaiveDateTime> {
        self.expr.next_after(&(self.clock)())
    }

    /// Run `job` on schedule until Ctrl-C.
    pub async fn run<F, Fut, T, E>(&self, job: F) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Display,
        E: Display,
    {
        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "Could not listen for Ctrl-C; scheduler runs until killed");
                std::future::pending::<()>().await;
            }
        };
        self.run_until(job, shutdown).await
    }

    /// Run `job` on schedule until `shutdown` completes. Returns how many
    /// times the job ran.
    ///
    /// The job fires at most once per matching minute. A failed run is
    /// logged and the schedule continues.
    pub async fn run_until<F, Fut, T, E, S>(&self, mut job: F, shutdown: S) -> usize
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Display,
        E: Display,
        S: Future<Output = ()>,
    {
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let mut last_fired: Option<NaiveDateTime> = None;
        let mut runs = 0;

        info!(
            cron = %self.expr,
            next = ?self.next_run(),
            "Scheduler started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(runs, "Scheduler stopping");
                    return runs;
                }
                _ = interval.tick() => {}
            }

            let now = truncate_to_minute(&(self.clock)());
            if !self.expr.matches(&now) || last_fired == Some(now) {
                continue;
            }
            last_fired = Some(now);
            runs += 1;

            info!(at = %now, "Scheduled run starting");
            match job().await {
                Ok(result) => info!(%result, "Scheduled run finished"),
                Err(e) => warn!(error = %e, "Scheduled run failed; waiting for next slot"),
            }
            debug!(next = ?self.next_run(), "Next scheduled run");
        }
    }
}
