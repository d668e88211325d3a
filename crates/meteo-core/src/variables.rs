//! Catalogue of queryable weather variables and their units

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Variable lookup error
#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    #[error("Unknown weather variable: {0}")]
    UnknownVariable(String),
}

/// Unit group for a weather variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitGroup {
    Temperature,
    Humidity,
    Precipitation,
    Cover,
}

impl UnitGroup {
    pub fn symbol(self) -> &'static str {
        match self {
            UnitGroup::Temperature => "°C",
            UnitGroup::Humidity | UnitGroup::Cover => "%",
            UnitGroup::Precipitation => "mm",
        }
    }
}

/// Hourly variables offered as polygon data sources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    #[serde(rename = "temperature_2m")]
    Temperature2m,
    #[serde(rename = "relative_humidity_2m")]
    RelativeHumidity2m,
    Precipitation,
    CloudCover,
}

impl Variable {
    pub const ALL: [Variable; 4] = [
        Variable::Temperature2m,
        Variable::RelativeHumidity2m,
        Variable::Precipitation,
        Variable::CloudCover,
    ];

    /// Identifier used by the archive API
    pub fn as_str(self) -> &'static str {
        match self {
            Variable::Temperature2m => "temperature_2m",
            Variable::RelativeHumidity2m => "relative_humidity_2m",
            Variable::Precipitation => "precipitation",
            Variable::CloudCover => "cloud_cover",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Variable::Temperature2m => "Temperature (2m)",
            Variable::RelativeHumidity2m => "Relative Humidity (2m)",
            Variable::Precipitation => "Precipitation",
            Variable::CloudCover => "Cloud Cover",
        }
    }

    pub fn unit_group(self) -> UnitGroup {
        match self {
            Variable::Temperature2m => UnitGroup::Temperature,
            Variable::RelativeHumidity2m => UnitGroup::Humidity,
            Variable::Precipitation => UnitGroup::Precipitation,
            Variable::CloudCover => UnitGroup::Cover,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Variable {
    type Err = VariableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        get_variable(s).ok_or_else(|| VariableError::UnknownVariable(s.to_string()))
    }
}

/// Get the catalogued variable for a data source identifier
pub fn get_variable(id: &str) -> Option<Variable> {
    Variable::ALL.into_iter().find(|v| v.as_str() == id)
}

/// Human-readable average, e.g. `12.30 °C`; `N/A` when absent
pub fn format_value(value: Option<f64>, variable: Option<Variable>) -> String {
    match (value, variable) {
        (None, _) => "N/A".to_string(),
        (Some(v), Some(var)) => format!("{:.2} {}", v, var.unit_group().symbol()),
        (Some(v), None) => format!("{:.2}", v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_lookup() {
        assert_eq!(get_variable("temperature_2m"), Some(Variable::Temperature2m));
        assert_eq!(get_variable("cloud_cover"), Some(Variable::CloudCover));
        assert_eq!(get_variable("wind_speed_10m"), None);
        assert!("snowfall".parse::<Variable>().is_err());
    }

    #[test]
    fn test_identifiers_round_trip_through_serde() {
        for var in Variable::ALL {
            let json = serde_json::to_string(&var).unwrap();
            assert_eq!(json, format!("\"{}\"", var.as_str()));
        }
    }

    #[test]
    fn test_format_value() {
        assert_eq!(
            format_value(Some(12.3), Some(Variable::Temperature2m)),
            "12.30 °C"
        );
        assert_eq!(format_value(Some(0.5), Some(Variable::Precipitation)), "0.50 mm");
        assert_eq!(format_value(Some(7.0), None), "7.00");
        assert_eq!(format_value(None, Some(Variable::CloudCover)), "N/A");
    }
}
