use std::fmt;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum StorageTemperature {
    TwoToTen,
    MinusEighteenToMinusThirtyFive,
    MinusSixtyToMinusEightyFive,
    GaseousNitrogen,
    LiquidNitrogen,
    Room,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct TemperatureRange {
    pub high: Option<i64>,
    pub low: Option<i64>,
}

impl TemperatureRange {
    pub fn new(high: i64, low: i64) -> Self {
        Self {
            high: Some(high),
            low: Some(low),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_none() && self.low.is_none()
    }
}

/// Containment test order; the first bucket that contains a range wins.
const PRIORITY: [StorageTemperature; 6] = [
    StorageTemperature::TwoToTen,
    StorageTemperature::MinusEighteenToMinusThirtyFive,
    StorageTemperature::MinusSixtyToMinusEightyFive,
    StorageTemperature::LiquidNitrogen,
    StorageTemperature::GaseousNitrogen,
    StorageTemperature::Room,
];

impl StorageTemperature {
    pub fn code(&self) -> &'static str {
        match self {
            StorageTemperature::TwoToTen => "temperature2to10",
            StorageTemperature::MinusEighteenToMinusThirtyFive => "temperature-18to-35",
            StorageTemperature::MinusSixtyToMinusEightyFive => "temperature-60to-85",
            StorageTemperature::GaseousNitrogen => "temperatureGN",
            StorageTemperature::LiquidNitrogen => "temperatureLN",
            StorageTemperature::Room => "temperatureRoom",
            StorageTemperature::Other => "temperatureOther",
        }
    }

    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "temperature2to10" => StorageTemperature::TwoToTen,
            "temperature-18to-35" => StorageTemperature::MinusEighteenToMinusThirtyFive,
            "temperature-60to-85" => StorageTemperature::MinusSixtyToMinusEightyFive,
            "temperatureGN" => StorageTemperature::GaseousNitrogen,
            "temperatureLN" => StorageTemperature::LiquidNitrogen,
            "temperatureRoom" => StorageTemperature::Room,
            _ => StorageTemperature::Other,
        }
    }

    pub fn range(&self) -> TemperatureRange {
        match self {
            StorageTemperature::TwoToTen => TemperatureRange::new(10, 2),
            StorageTemperature::MinusEighteenToMinusThirtyFive => TemperatureRange::new(-18, -35),
            StorageTemperature::MinusSixtyToMinusEightyFive => TemperatureRange::new(-60, -85),
            StorageTemperature::GaseousNitrogen => TemperatureRange::new(-160, -195),
            StorageTemperature::LiquidNitrogen => TemperatureRange::new(-196, -209),
            StorageTemperature::Room => TemperatureRange::new(30, 11),
            StorageTemperature::Other => TemperatureRange::default(),
        }
    }

    fn contains(&self, high: i64, low: i64) -> bool {
        match (self.range().high, self.range().low) {
            (Some(upper), Some(lower)) => high <= upper && low >= lower,
            _ => false,
        }
    }

    pub fn from_range(high: i64, low: i64) -> Self {
        PRIORITY
            .into_iter()
            .find(|bucket| bucket.contains(high, low))
            .unwrap_or(StorageTemperature::Other)
    }
}

impl fmt::Display for StorageTemperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

pub fn from_bbmri_to_mii(code: &str) -> TemperatureRange {
    StorageTemperature::from_code(code).range()
}

pub fn from_mii_to_bbmri(high: i64, low: i64) -> &'static str {
    StorageTemperature::from_range(high, low).code()
}
