// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

//! Carrier table for the lowering pass.

use crate::core::instruction::YarnId;
use crate::core::needle::{Direction, Needle};

use super::error::LowerError;

/// A needle plus the side a feeder sits on after passing it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Location {
    pub needle: Needle,
    pub direction: Direction,
}

impl Location {
    pub fn new(needle: Needle, direction: Direction) -> Self {
        Self { needle, direction }
    }

    /// Physical feeder column at `rack`, matching the validator's carrier positions.
    pub fn column(self, rack: i64) -> i64 {
        self.needle.column(rack) + self.direction.feeder_offset()
    }
}

/// Where a carrier is in its in/use/out life cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierState {
    Absent,
    /// `in` requested; `slot` is the output placeholder to patch on first use.
    Pending { slot: usize },
    /// `parked` is where the feeder is, `attached` the last loop it formed.
    Active { parked: Location, attached: Location },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Carrier {
    pub name: String,
    pub yarn: YarnId,
    pub state: CarrierState,
}

/// Carriers named by the `Carriers` header, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CarrierTable {
    carriers: Vec<Carrier>,
    remapped: bool,
}

impl CarrierTable {
    /// Assigns yarn numbers: names that are increasing positive integers keep their
    /// value, otherwise every carrier is numbered by position starting at 1.
    pub fn from_names(names: &[String]) -> Result<Self, LowerError> {
        let mut previous = 0;
        let mut in_order = true;
        let mut yarns = Vec::with_capacity(names.len());
        for (pos, name) in names.iter().enumerate() {
            if names[..pos].contains(name) {
                return Err(LowerError::DuplicateCarrierName(name.clone()));
            }
            match name.parse::<YarnId>() {
                Ok(value)
                    if in_order && name.bytes().all(|b| b.is_ascii_digit()) && value > previous =>
                {
                    previous = value;
                    yarns.push(value);
                }
                _ => in_order = false,
            }
        }

        let remapped = !in_order;
        let carriers = names
            .iter()
            .enumerate()
            .map(|(pos, name)| Carrier {
                name: name.clone(),
                yarn: if remapped { pos as YarnId + 1 } else { yarns[pos] },
                state: CarrierState::Absent,
            })
            .collect();
        Ok(Self { carriers, remapped })
    }

    pub fn remapped(&self) -> bool {
        self.remapped
    }

    pub fn is_empty(&self) -> bool {
        self.carriers.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.carriers.iter().position(|c| c.name == name)
    }

    pub fn get(&self, idx: usize) -> &Carrier {
        &self.carriers[idx]
    }

    pub fn get_mut(&mut self, idx: usize) -> &mut Carrier {
        &mut self.carriers[idx]
    }

    pub fn by_name(&self, name: &str) -> Option<&Carrier> {
        self.carriers.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Carrier> {
        self.carriers.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Carrier> {
        self.carriers.iter_mut()
    }

    /// Resolves the carrier names of one operation, rejecting unknown or repeated names.
    pub fn resolve(&self, names: &[&str]) -> Result<Vec<usize>, LowerError> {
        let mut indices = Vec::with_capacity(names.len());
        for name in names {
            let idx = self
                .index_of(name)
                .ok_or_else(|| LowerError::UnknownCarrier(name.to_string()))?;
            if indices.contains(&idx) {
                return Err(LowerError::RepeatedCarrier(name.to_string()));
            }
            indices.push(idx);
        }
        Ok(indices)
    }

    /// Human-readable name to yarn mapping for the log.
    pub fn describe_mapping(&self) -> String {
        self.carriers
            .iter()
            .map(|c| format!("'{}' -> {}", c.name, c.yarn))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn ordered_integer_names_are_kept() {
        let table = CarrierTable::from_names(&names(&["1", "2", "3"])).expect("table");
        assert!(!table.remapped());
        assert_eq!(table.by_name("3").map(|c| c.yarn), Some(3));

        let sparse = CarrierTable::from_names(&names(&["2", "5", "9"])).expect("table");
        assert!(!sparse.remapped());
        assert_eq!(sparse.by_name("5").map(|c| c.yarn), Some(5));
    }

    #[test]
    fn other_names_are_numbered_by_position() {
        let table = CarrierTable::from_names(&names(&["A", "B", "C"])).expect("table");
        assert!(table.remapped());
        assert_eq!(table.by_name("A").map(|c| c.yarn), Some(1));
        assert_eq!(table.by_name("C").map(|c| c.yarn), Some(3));
        assert_eq!(table.describe_mapping(), "'A' -> 1, 'B' -> 2, 'C' -> 3");

        let unordered = CarrierTable::from_names(&names(&["3", "1"])).expect("table");
        assert!(unordered.remapped());
        assert_eq!(unordered.by_name("3").map(|c| c.yarn), Some(1));
        assert_eq!(unordered.by_name("1").map(|c| c.yarn), Some(2));

        let zero = CarrierTable::from_names(&names(&["0", "1"])).expect("table");
        assert!(zero.remapped());
        assert_eq!(zero.by_name("0").map(|c| c.yarn), Some(1));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        assert_eq!(
            CarrierTable::from_names(&names(&["A", "B", "A"])),
            Err(LowerError::DuplicateCarrierName("A".to_string()))
        );
    }

    #[test]
    fn resolve_checks_names() {
        let table = CarrierTable::from_names(&names(&["A", "B"])).expect("table");
        assert_eq!(table.resolve(&["B", "A"]), Ok(vec![1, 0]));
        assert_eq!(
            table.resolve(&["C"]),
            Err(LowerError::UnknownCarrier("C".to_string()))
        );
        assert_eq!(
            table.resolve(&["A", "A"]),
            Err(LowerError::RepeatedCarrier("A".to_string()))
        );
    }

    #[test]
    fn location_column_matches_feeder_side() {
        let loc = Location::new(Needle::back(2), Direction::Increasing);
        assert_eq!(loc.column(0), 3);
        assert_eq!(loc.column(-2), 1);
        let loc = Location::new(Needle::front(2), Direction::Decreasing);
        assert_eq!(loc.column(5), 2);
    }
}
