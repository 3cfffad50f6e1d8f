use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uom::si::{
    angular_velocity::radian_per_second,
    electric_current::ampere,
    f64::{AngularVelocity, ElectricCurrent, ThermodynamicTemperature},
    thermodynamic_temperature::degree_celsius,
};

use crate::Value;

/// The operating point every step in one evaluation run shares.
///
/// Settings are independent of the design and fixed for the whole run. The
/// common quantities are typed; anything else an analysis needs (a duty cycle,
/// a coolant flow rate, a mesh density) goes in the named `parameters`.
///
/// When deserialized, typed quantities are read in SI base units (rad/s, A, K)
/// and any omitted entry takes its default.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    speed: AngularVelocity,
    current: ElectricCurrent,
    ambient_temperature: ThermodynamicTemperature,
    parameters: BTreeMap<String, Value>,
}

impl Default for Settings {
    /// A machine at standstill with no current in a 20 °C ambient.
    fn default() -> Self {
        Self {
            speed: AngularVelocity::new::<radian_per_second>(0.0),
            current: ElectricCurrent::new::<ampere>(0.0),
            ambient_temperature: ThermodynamicTemperature::new::<degree_celsius>(20.0),
            parameters: BTreeMap::new(),
        }
    }
}

impl Settings {
    #[must_use]
    pub fn with_speed(mut self, speed: AngularVelocity) -> Self {
        self.speed = speed;
        self
    }

    #[must_use]
    pub fn with_current(mut self, current: ElectricCurrent) -> Self {
        self.current = current;
        self
    }

    #[must_use]
    pub fn with_ambient_temperature(mut self, temperature: ThermodynamicTemperature) -> Self {
        self.ambient_temperature = temperature;
        self
    }

    /// Sets a named parameter, replacing any previous value.
    #[must_use]
    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn speed(&self) -> AngularVelocity {
        self.speed
    }

    #[must_use]
    pub fn current(&self) -> ElectricCurrent {
        self.current
    }

    #[must_use]
    pub fn ambient_temperature(&self) -> ThermodynamicTemperature {
        self.ambient_temperature
    }

    #[must_use]
    pub fn parameter(&self, name: &str) -> Option<&Value> {
        self.parameters.get(name)
    }

    #[must_use]
    pub fn parameters(&self) -> &BTreeMap<String, Value> {
        &self.parameters
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use uom::si::{angular_velocity::revolution_per_minute, thermodynamic_temperature::kelvin};

    #[test]
    fn default_ambient_is_twenty_celsius() {
        let settings = Settings::default();
        assert_relative_eq!(
            settings.ambient_temperature().get::<kelvin>(),
            293.15,
            epsilon = 1e-9
        );
    }

    #[test]
    fn reads_base_units_from_toml() {
        let settings: Settings = toml::from_str(
            r"
            speed = 314.159
            current = 120.0

            [parameters]
            coolant_flow = 0.004
            ",
        )
        .unwrap();

        assert_relative_eq!(
            settings.speed().get::<revolution_per_minute>(),
            3000.0,
            epsilon = 1e-2
        );
        assert_relative_eq!(settings.current().get::<ampere>(), 120.0);
        assert_eq!(settings.parameter("coolant_flow"), Some(&Value::Number(0.004)));
        assert_eq!(settings.ambient_temperature(), Settings::default().ambient_temperature());
    }
}
