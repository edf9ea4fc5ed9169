use std::fmt;

use serde::{Serialize, Serializer};

use crate::models::candidate::{Availability, Candidate};
use crate::models::offer::Offer;

/// Reason a candidate failed a hard eligibility gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HardBlock {
    Offline,
    MissingEquipment(Vec<String>),
}

impl fmt::Display for HardBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HardBlock::Offline => f.write_str("OFFLINE"),
            HardBlock::MissingEquipment(tags) => write!(f, "MISSING_{}", tags.join("_")),
        }
    }
}

impl Serialize for HardBlock {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Gates run in a fixed order; the first failure wins.
pub fn check(candidate: &Candidate, offer: &Offer) -> Option<HardBlock> {
    if candidate.status == Availability::Offline {
        return Some(HardBlock::Offline);
    }

    let missing: Vec<String> = offer
        .required_tags
        .iter()
        .filter(|tag| !candidate.has_tag(tag))
        .cloned()
        .collect();

    if missing.is_empty() {
        None
    } else {
        Some(HardBlock::MissingEquipment(missing))
    }
}

#[cfg(test)]
mod tests {
    use super::{check, HardBlock};
    use crate::engine::testing::{candidate, offer_requiring};
    use crate::models::candidate::Availability;

    #[test]
    fn offline_is_checked_before_equipment() {
        let mut c = candidate("op-1");
        c.status = Availability::Offline;
        let offer = offer_requiring(&["high_pole"]);

        assert_eq!(check(&c, &offer), Some(HardBlock::Offline));
        assert_eq!(HardBlock::Offline.to_string(), "OFFLINE");
    }

    #[test]
    fn every_missing_tag_is_listed() {
        let mut c = candidate("op-1");
        c.equipment_tags.insert("chase".to_string());
        let offer = offer_requiring(&["high_pole", "chase", "superload_ready"]);

        let block = check(&c, &offer).unwrap();
        assert_eq!(block.to_string(), "MISSING_high_pole_superload_ready");
    }

    #[test]
    fn busy_candidate_with_all_tags_passes() {
        let mut c = candidate("op-1");
        c.status = Availability::Busy;
        c.equipment_tags.insert("high_pole".to_string());
        let offer = offer_requiring(&["high_pole"]);

        assert_eq!(check(&c, &offer), None);
    }
}
