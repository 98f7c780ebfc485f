// src/application/pricing/affinity.rs
// Sector -> factor sensitivity lookup

use std::collections::HashMap;

use crate::domain::influence::factor_names::*;
use crate::domain::models::Sector;

/// How strongly each sector reacts to each macro factor.
///
/// Pairs that are not listed react with a neutral multiplier of 1.0.
#[derive(Debug, Clone, Default)]
pub struct SectorAffinityTable {
    multipliers: HashMap<Sector, HashMap<String, f64>>,
}

impl SectorAffinityTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table covering the standard factor catalog
    pub fn standard() -> Self {
        Self::new()
            .with_multiplier(Sector::Technology, TECH_INNOVATION, 1.5)
            .with_multiplier(Sector::Technology, INTEREST_RATES, 1.3)
            .with_multiplier(Sector::Energy, OIL_PRICES, 1.5)
            .with_multiplier(Sector::Energy, GEOPOLITICAL_TENSION, 1.3)
            .with_multiplier(Sector::Finance, INTEREST_RATES, 1.5)
            .with_multiplier(Sector::Finance, INFLATION, 1.3)
            .with_multiplier(Sector::RealEstate, HOUSING_DEMAND, 1.5)
            .with_multiplier(Sector::RealEstate, INTEREST_RATES, 1.4)
            .with_multiplier(Sector::Consumer, CONSUMER_CONFIDENCE, 1.5)
            .with_multiplier(Sector::Consumer, UNEMPLOYMENT, 1.3)
            .with_multiplier(Sector::Healthcare, HEALTH_POLICY, 1.5)
            .with_multiplier(Sector::Industrial, GDP_GROWTH, 1.4)
            .with_multiplier(Sector::Materials, GDP_GROWTH, 1.3)
            .with_multiplier(Sector::Utilities, INTEREST_RATES, 1.3)
    }

    pub fn with_multiplier(mut self, sector: Sector, factor: &str, multiplier: f64) -> Self {
        self.set_multiplier(sector, factor, multiplier);
        self
    }

    pub fn set_multiplier(&mut self, sector: Sector, factor: &str, multiplier: f64) {
        self.multipliers
            .entry(sector)
            .or_default()
            .insert(factor.to_string(), multiplier);
    }

    pub fn multiplier(&self, sector: Sector, factor: &str) -> f64 {
        self.multipliers
            .get(&sector)
            .and_then(|factors| factors.get(factor))
            .copied()
            .unwrap_or(1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unlisted_pair_is_neutral() {
        let table = SectorAffinityTable::standard();
        assert_eq!(table.multiplier(Sector::Other, INTEREST_RATES), 1.0);
        assert_eq!(table.multiplier(Sector::Technology, OIL_PRICES), 1.0);
    }

    #[test]
    fn test_matched_pairs_are_amplified() {
        let table = SectorAffinityTable::standard();
        assert_eq!(table.multiplier(Sector::Technology, TECH_INNOVATION), 1.5);
        assert_eq!(table.multiplier(Sector::RealEstate, INTEREST_RATES), 1.4);
    }

    #[test]
    fn test_override() {
        let table = SectorAffinityTable::standard().with_multiplier(Sector::Energy, OIL_PRICES, 2.0);
        assert_eq!(table.multiplier(Sector::Energy, OIL_PRICES), 2.0);
    }
}
