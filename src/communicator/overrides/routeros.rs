//! MikroTik RouterOS.

use futures::future::BoxFuture;

use super::{Parent, column, column_map, get, scaled};
use crate::codec::RawValue;
use crate::communicator::{Communicator, optional};
use crate::device::{HardwareHealthComponent, HealthState, Temperature, Voltage};
use crate::env::RequestEnv;
use crate::error::{Error, Result};

/// MIKROTIK-MIB mtxrHealth scalars, tenths.
const HEALTH_VOLTAGE: &str = ".1.3.6.1.4.1.14988.1.1.3.8.0";
const HEALTH_TEMPERATURE: &str = ".1.3.6.1.4.1.14988.1.1.3.10.0";
/// mtxrGaugeTable on RouterOS 6.47 and later.
const GAUGE_NAME: &str = ".1.3.6.1.4.1.14988.1.1.3.100.1.2";
const GAUGE_VALUE: &str = ".1.3.6.1.4.1.14988.1.1.3.100.1.3";
const GAUGE_UNIT: &str = ".1.3.6.1.4.1.14988.1.1.3.100.1.4";

/// mtxrGaugeUnit values.
const UNIT_CELSIUS: i64 = 1;
const UNIT_DECI_VOLT: i64 = 4;

pub(super) fn routeros(parent: Parent) -> Box<dyn Communicator> {
    Box::new(RouterOs { parent })
}

struct RouterOs {
    parent: Parent,
}

impl Communicator for RouterOs {
    fn hardware_health<'a>(
        &'a self,
        env: &'a RequestEnv,
    ) -> BoxFuture<'a, Result<HardwareHealthComponent>> {
        Box::pin(async move {
            let mut health = optional(self.parent.hardware_health(env).await)?.unwrap_or_default();
            let names = column(env, GAUGE_NAME).await?;
            if names.is_empty() {
                let temperature = optional(get(env, HEALTH_TEMPERATURE).await)?;
                let voltage = optional(get(env, HEALTH_VOLTAGE).await)?;
                if temperature.is_none() && voltage.is_none() {
                    return Err(Error::not_implemented("mtxrHealth"));
                }
                if let Some(t) = temperature {
                    health.temperature.push(Temperature {
                        description: Some("board".into()),
                        temperature: scaled(&t, 10.0),
                        state: None,
                    });
                }
                if let Some(v) = voltage {
                    health.voltage.push(Voltage {
                        description: Some("supply".into()),
                        voltage: scaled(&v, 10.0),
                        state: None,
                    });
                }
                return Ok(health);
            }
            let values = column_map(env, GAUGE_VALUE).await?;
            let units = column_map(env, GAUGE_UNIT).await?;
            for (index, name) in names {
                let (Some(value), Some(unit)) = (values.get(&index), units.get(&index)) else {
                    continue;
                };
                apply_gauge(&mut health, name.as_string(), value, unit);
            }
            Ok(health)
        })
    }
}

fn apply_gauge(health: &mut HardwareHealthComponent, name: String, value: &RawValue, unit: &RawValue) {
    match unit.as_int() {
        Ok(UNIT_CELSIUS) => health.temperature.push(Temperature {
            description: Some(name),
            temperature: scaled(value, 1.0),
            state: None,
        }),
        Ok(UNIT_DECI_VOLT) => health.voltage.push(Voltage {
            description: Some(name),
            voltage: scaled(value, 10.0),
            state: None,
        }),
        // Status gauges such as PSU state: 0 means ok.
        Ok(_) if name.contains("state") => {
            let state = match value.as_int() {
                Ok(0) => HealthState::Normal,
                Ok(_) => HealthState::Critical,
                Err(_) => HealthState::Unknown,
            };
            health.power_supply.push(crate::device::PowerSupply {
                description: Some(name),
                state: Some(state),
            });
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gauges_sort_by_unit() {
        let mut health = HardwareHealthComponent::default();
        apply_gauge(&mut health, "cpu-temperature".into(), &RawValue::Int(47), &RawValue::Int(1));
        apply_gauge(&mut health, "psu1-voltage".into(), &RawValue::Int(243), &RawValue::Int(4));
        apply_gauge(&mut health, "psu2-state".into(), &RawValue::Int(1), &RawValue::Int(5));
        apply_gauge(&mut health, "fan1-speed".into(), &RawValue::Int(5000), &RawValue::Int(2));
        assert_eq!(health.temperature[0].temperature, Some(47.0));
        assert_eq!(health.voltage[0].voltage, Some(24.3));
        assert_eq!(health.power_supply[0].state, Some(HealthState::Critical));
        assert!(health.fans.is_empty());
    }
}
