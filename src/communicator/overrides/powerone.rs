//! Power-One DC plant controllers (ACC and PCC).
//!
//! Both controllers report readings as fixed-point integers and pack their
//! alarms into one bitmap; they differ in OIDs and scale.

use futures::future::BoxFuture;

use super::{Parent, get, scaled};
use crate::communicator::{Communicator, optional};
use crate::device::UpsComponent;
use crate::env::RequestEnv;
use crate::error::{Error, Result};

struct Layout {
    system_voltage: (&'static str, f64),
    rectifier_current: (&'static str, f64),
    battery_current: (&'static str, f64),
    battery_temperature: (&'static str, f64),
    battery_capacity: (&'static str, f64),
    battery_remaining_time: (&'static str, f64),
    alarms: &'static str,
}

/// Alarm bits shared by both controllers.
const ALARM_AC_FAIL: u64 = 1 << 0;
const ALARM_LVD: u64 = 1 << 4;

static ACC: Layout = Layout {
    system_voltage: (".1.3.6.1.4.1.5961.4.3.2.0", 100.0),
    rectifier_current: (".1.3.6.1.4.1.5961.4.3.1.0", 10.0),
    battery_current: (".1.3.6.1.4.1.5961.4.3.3.0", 10.0),
    battery_temperature: (".1.3.6.1.4.1.5961.4.3.4.0", 1.0),
    battery_capacity: (".1.3.6.1.4.1.5961.4.3.6.0", 1.0),
    battery_remaining_time: (".1.3.6.1.4.1.5961.4.3.7.0", 1.0),
    alarms: ".1.3.6.1.4.1.5961.4.2.1.0",
};

static PCC: Layout = Layout {
    system_voltage: (".1.3.6.1.4.1.5961.5.3.2.0", 10.0),
    rectifier_current: (".1.3.6.1.4.1.5961.5.3.1.0", 1.0),
    battery_current: (".1.3.6.1.4.1.5961.5.3.3.0", 1.0),
    battery_temperature: (".1.3.6.1.4.1.5961.5.3.4.0", 10.0),
    battery_capacity: (".1.3.6.1.4.1.5961.5.3.6.0", 1.0),
    battery_remaining_time: (".1.3.6.1.4.1.5961.5.3.7.0", 1.0),
    alarms: ".1.3.6.1.4.1.5961.5.2.1.0",
};

pub(super) fn acc(parent: Parent) -> Box<dyn Communicator> {
    Box::new(PowerOne {
        parent,
        layout: &ACC,
    })
}

pub(super) fn pcc(parent: Parent) -> Box<dyn Communicator> {
    Box::new(PowerOne {
        parent,
        layout: &PCC,
    })
}

struct PowerOne {
    parent: Parent,
    layout: &'static Layout,
}

impl PowerOne {
    async fn reading(&self, env: &RequestEnv, (oid, divisor): (&str, f64)) -> Result<Option<f64>> {
        Ok(optional(get(env, oid).await)?.and_then(|v| scaled(&v, divisor)))
    }
}

impl Communicator for PowerOne {
    fn ups<'a>(&'a self, env: &'a RequestEnv) -> BoxFuture<'a, Result<UpsComponent>> {
        Box::pin(async move {
            let l = self.layout;
            let mut ups = optional(self.parent.ups(env).await)?.unwrap_or_default();
            let system_voltage = self.reading(env, l.system_voltage).await?;
            let rectifier_current = self.reading(env, l.rectifier_current).await?;
            let battery_current = self.reading(env, l.battery_current).await?;
            if system_voltage.is_none() && rectifier_current.is_none() && battery_current.is_none()
            {
                return Err(Error::not_found("power plant readings"));
            }
            ups.system_voltage = system_voltage.or(ups.system_voltage);
            ups.rectifier_current = rectifier_current.or(ups.rectifier_current);
            ups.battery_current = battery_current.or(ups.battery_current);
            ups.battery_temperature = self
                .reading(env, l.battery_temperature)
                .await?
                .or(ups.battery_temperature);
            ups.battery_capacity = self
                .reading(env, l.battery_capacity)
                .await?
                .or(ups.battery_capacity);
            ups.battery_remaining_time = self
                .reading(env, l.battery_remaining_time)
                .await?
                .or(ups.battery_remaining_time);
            ups.current_load = plant_load(ups.rectifier_current, ups.battery_current);

            if let Some(bits) = optional(get(env, l.alarms).await)?.and_then(|v| v.as_uint().ok()) {
                let (mains, lvd) = decode_alarms(bits);
                ups.mains_voltage_applied = Some(mains);
                ups.alarm_low_voltage_disconnect = Some(lvd);
            }
            Ok(ups)
        })
    }
}

/// Load current: rectifier output minus what flows into the battery.
fn plant_load(rectifier: Option<f64>, battery: Option<f64>) -> Option<f64> {
    match (rectifier, battery) {
        (Some(r), Some(b)) => Some(r - b),
        (Some(r), None) => Some(r),
        _ => None,
    }
}

/// `(mains applied, low-voltage disconnect as 0/1)`.
fn decode_alarms(bits: u64) -> (bool, i64) {
    (bits & ALARM_AC_FAIL == 0, i64::from(bits & ALARM_LVD != 0))
}
