//! Time source for timestamps, sale windows and the daily backup slot

use std::cell::Cell;
use std::rc::Rc;

use chrono::{DateTime, Local, NaiveDate, Utc};

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;

    /// The vendor's current calendar day
    fn today(&self) -> NaiveDate;
}

/// Wall clock; calendar days follow the local timezone
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Settable clock for tests and replays; calendar days are UTC
#[derive(Debug)]
pub struct ManualClock {
    now: Cell<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Cell::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        self.now.set(now);
    }

    pub fn advance(&self, by: chrono::Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        self.now.get()
    }

    fn today(&self) -> NaiveDate {
        self.now.get().date_naive()
    }
}

impl<C: Clock + ?Sized> Clock for Rc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }

    fn today(&self) -> NaiveDate {
        (**self).today()
    }
}
