//! Sensor store data models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five measured environmental quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Temperature,
    Humidity,
    Flammable,
    Tvoc,
    Co,
}

impl Channel {
    /// All channels in row order
    pub const ALL: [Channel; 5] = [
        Channel::Temperature,
        Channel::Humidity,
        Channel::Flammable,
        Channel::Tvoc,
        Channel::Co,
    ];

    /// Name used in forecast payloads and artifact file names
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Flammable => "flammable",
            Channel::Tvoc => "tvoc",
            Channel::Co => "co",
        }
    }

    /// Column holding this channel in the store tables
    pub fn column(&self) -> &'static str {
        match self {
            Channel::Temperature => "temperature",
            Channel::Humidity => "humidity",
            Channel::Flammable => "flammable_gases",
            Channel::Tvoc => "tvoc",
            Channel::Co => "co",
        }
    }

    fn index(&self) -> usize {
        match self {
            Channel::Temperature => 0,
            Channel::Humidity => 1,
            Channel::Flammable => 2,
            Channel::Tvoc => 3,
            Channel::Co => 4,
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One sensor row; order comes from the enqueue time column, never from the struct
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub temperature: f64,
    pub humidity: f64,
    pub flammable_gases: f64,
    pub tvoc: f64,
    pub co: f64,
}

impl SensorReading {
    pub fn new(temperature: f64, humidity: f64, flammable_gases: f64, tvoc: f64, co: f64) -> Self {
        Self {
            temperature,
            humidity,
            flammable_gases,
            tvoc,
            co,
        }
    }

    /// Value for a single channel
    pub fn value(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Temperature => self.temperature,
            Channel::Humidity => self.humidity,
            Channel::Flammable => self.flammable_gases,
            Channel::Tvoc => self.tvoc,
            Channel::Co => self.co,
        }
    }
}

/// Chronological observations for one channel
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub channel: Channel,
    pub values: Vec<f64>,
}

impl ChannelSeries {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn last(&self) -> Option<f64> {
        self.values.last().copied()
    }
}

/// The five channel series projected from a single fetch; lengths are always equal
#[derive(Debug, Clone, PartialEq)]
pub struct SensorSeries {
    channels: [ChannelSeries; 5],
}

impl SensorSeries {
    /// Project chronologically ordered readings into per-channel series
    pub fn from_readings(readings: &[SensorReading]) -> Self {
        let project = |channel: Channel| ChannelSeries {
            channel,
            values: readings.iter().map(|r| r.value(channel)).collect(),
        };

        Self {
            channels: Channel::ALL.map(project),
        }
    }

    pub fn get(&self, channel: Channel) -> &ChannelSeries {
        &self.channels[channel.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelSeries> {
        self.channels.iter()
    }

    /// Number of observations per channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A reading together with its arrival time, as written by ingestion
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedReading {
    pub enqueued_time: DateTime<Utc>,
    pub reading: SensorReading,
    pub battery_life: Option<f64>,
}

/// Recent sensor row as exposed by the data pull endpoint (no timestamp)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalRow {
    #[serde(rename = "Temperature")]
    pub temperature: Option<f64>,
    #[serde(rename = "Humidity")]
    pub humidity: Option<f64>,
    #[serde(rename = "FlammableGases")]
    pub flammable_gases: Option<f64>,
    #[serde(rename = "TVOC")]
    pub tvoc: Option<f64>,
    #[serde(rename = "CO")]
    pub co: Option<f64>,
    #[serde(rename = "BatteryLife")]
    pub battery_life: Option<f64>,
}

/// One future time step of the cached batch forecast
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastCacheRow {
    pub step: i64,
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
    pub flammable_gases: Option<f64>,
    pub tvoc: Option<f64>,
    pub co: Option<f64>,
}

impl ForecastCacheRow {
    /// Build a row from per-channel values; non-finite values are stored as NULL
    pub fn from_values(step: i64, values: [f64; 5]) -> Self {
        let finite = |v: f64| if v.is_finite() { Some(v) } else { None };
        Self {
            step,
            temperature: finite(values[0]),
            humidity: finite(values[1]),
            flammable_gases: finite(values[2]),
            tvoc: finite(values[3]),
            co: finite(values[4]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projection_keeps_order_and_length() {
        let readings = vec![
            SensorReading::new(20.0, 40.0, 1.0, 100.0, 0.5),
            SensorReading::new(21.0, 41.0, 2.0, 110.0, 0.6),
            SensorReading::new(22.0, 42.0, 3.0, 120.0, 0.7),
        ];
        let series = SensorSeries::from_readings(&readings);

        assert_eq!(series.len(), 3);
        for channel in series.iter() {
            assert_eq!(channel.len(), 3);
        }
        assert_eq!(series.get(Channel::Temperature).values, vec![20.0, 21.0, 22.0]);
        assert_eq!(series.get(Channel::Co).last(), Some(0.7));
    }

    #[test]
    fn test_empty_projection() {
        let series = SensorSeries::from_readings(&[]);
        assert!(series.is_empty());
        assert!(series.get(Channel::Humidity).last().is_none());
    }

    #[test]
    fn test_cache_row_nulls_non_finite() {
        let row = ForecastCacheRow::from_values(0, [1.0, f64::NAN, 3.0, f64::INFINITY, 5.0]);
        assert_eq!(row.temperature, Some(1.0));
        assert_eq!(row.humidity, None);
        assert_eq!(row.tvoc, None);
        assert_eq!(row.co, Some(5.0));
    }

    #[test]
    fn test_historical_row_field_names() {
        let row = HistoricalRow {
            temperature: Some(1.0),
            humidity: Some(2.0),
            flammable_gases: Some(3.0),
            tvoc: None,
            co: Some(5.0),
            battery_life: None,
        };
        let json = serde_json::to_value(&row).unwrap();
        assert_eq!(json["FlammableGases"], 3.0);
        assert!(json["BatteryLife"].is_null());
    }
}
