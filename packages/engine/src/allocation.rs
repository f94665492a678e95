//! Phase one of a calculation: credit watch time to sections and build the
//! per-section pools every payment is measured against.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::model::{Assignment, LibraryId, ShareKind};

/// Watch time credited to one assignment inside one section.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, PartialEq)]
pub struct Allocation {
    pub assignment_id: i32,
    pub library_id: LibraryId,
    pub section_id: i32,
    pub kind: ShareKind,
    pub raw_seconds: i64,
    pub allocated_seconds: f64,
    /// Order share used for the split; `1.0` for section-specific subjects.
    pub order_share: f64,
}

/// A common-subject library serves every section at once, so its total is
/// split by each section's share of orders.
pub fn allocate_common(
    assignment: &Assignment,
    section_id: i32,
    raw_seconds: i64,
    order_share: f64,
) -> Allocation {
    Allocation {
        assignment_id: assignment.id,
        library_id: assignment.library_id,
        section_id,
        kind: ShareKind::Common,
        raw_seconds,
        allocated_seconds: raw_seconds as f64 * order_share,
        order_share,
    }
}

pub fn allocate_section_specific(
    assignment: &Assignment,
    section_id: i32,
    raw_seconds: i64,
) -> Allocation {
    Allocation {
        assignment_id: assignment.id,
        library_id: assignment.library_id,
        section_id,
        kind: ShareKind::SectionSpecific,
        raw_seconds,
        allocated_seconds: raw_seconds as f64,
        order_share: 1.0,
    }
}

#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct SectionAllocations {
    pub common: Vec<Allocation>,
    pub specific: Vec<Allocation>,
}

impl SectionAllocations {
    pub fn push(&mut self, allocation: Allocation) {
        match allocation.kind {
            ShareKind::Common => self.common.push(allocation),
            ShareKind::SectionSpecific => self.specific.push(allocation),
        }
    }

    /// Allocated common watch time plus raw section-specific watch time.
    pub fn pool(&self) -> f64 {
        self.common
            .iter()
            .chain(self.specific.iter())
            .map(|allocation| allocation.allocated_seconds)
            .sum()
    }

    /// Common allocations first, then section-specific, each by assignment id.
    pub fn in_payment_order(&self) -> impl Iterator<Item = &Allocation> {
        self.common.iter().chain(self.specific.iter())
    }

    fn sort(&mut self) {
        self.common.sort_by_key(|allocation| allocation.assignment_id);
        self.specific.sort_by_key(|allocation| allocation.assignment_id);
    }
}

/// Frozen output of phase one. Pools are computed once, when the plan is
/// built, and never change while payments are priced.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Default, PartialEq)]
pub struct AllocationPlan {
    sections: BTreeMap<i32, SectionAllocations>,
    pools: BTreeMap<i32, f64>,
}

impl AllocationPlan {
    pub fn new(mut sections: BTreeMap<i32, SectionAllocations>) -> Self {
        let pools = sections
            .iter_mut()
            .map(|(section_id, allocations)| {
                allocations.sort();
                (*section_id, allocations.pool())
            })
            .collect();
        Self { sections, pools }
    }

    pub fn pool(&self, section_id: i32) -> f64 {
        self.pools.get(&section_id).copied().unwrap_or(0.0)
    }

    pub fn pools(&self) -> &BTreeMap<i32, f64> {
        &self.pools
    }

    pub fn sections(&self) -> impl Iterator<Item = (&i32, &SectionAllocations)> {
        self.sections.iter()
    }

    pub fn section(&self, section_id: i32) -> Option<&SectionAllocations> {
        self.sections.get(&section_id)
    }
}
