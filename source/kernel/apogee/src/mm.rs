// Copyright 2026 Corvus OS Contributors
// SPDX-License-Identifier: Apache-2.0

//! Owner-keyed region table emulating memory isolation.
//!
//! Allocation is bump-style: each region starts at `count * 0x1000`
//! regardless of the sizes handed out before it, so regions are spaced one
//! stride apart. Access checks are advisory; a denial is logged and reported,
//! nothing faults for real.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Distance between consecutive region bases.
pub const REGION_STRIDE: u64 = 0x1000;

/// One allocated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Region {
    /// First address of the region.
    pub base: u64,
    /// Region length in bytes.
    pub size: u64,
}

impl Region {
    /// Whether `addr` falls inside the region.
    pub fn contains(&self, addr: u64) -> bool {
        addr >= self.base && addr < self.base + self.size
    }
}

/// Per-owner region registry.
#[derive(Default)]
pub struct RegionTable {
    regions: Mutex<HashMap<String, Region>>,
}

impl RegionTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        RegionTable::default()
    }

    /// Allocates a region for `owner` at the next stride boundary.
    ///
    /// An owner that already holds a region gets it replaced; the base is
    /// still derived from the current entry count.
    pub fn allocate(&self, owner: impl Into<String>, size: u64) -> Region {
        let owner = owner.into();
        let mut regions = self.regions.lock();
        let base = regions.len() as u64 * REGION_STRIDE;
        let region = Region { base, size };
        log::info!("mm: '{owner}' allocated {size:#x} bytes at {base:#x}");
        regions.insert(owner, region);
        region
    }

    /// Whether `owner` may touch `addr`. Unknown owners are always denied.
    #[must_use]
    pub fn check_access(&self, owner: &str, addr: u64) -> bool {
        let region = self.regions.lock().get(owner).copied();
        match region {
            None => {
                log::warn!("mm: access violation, unknown owner '{owner}'");
                false
            }
            Some(region) if region.contains(addr) => true,
            Some(_) => {
                log::warn!("mm: segmentation fault, '{owner}' touched {addr:#x}");
                false
            }
        }
    }

    /// Region held by `owner`, if any.
    pub fn region(&self, owner: &str) -> Option<Region> {
        self.regions.lock().get(owner).copied()
    }

    /// All regions with their owners, sorted by base address.
    pub fn regions(&self) -> Vec<(String, Region)> {
        let mut all: Vec<(String, Region)> = self
            .regions
            .lock()
            .iter()
            .map(|(owner, region)| (owner.clone(), *region))
            .collect();
        all.sort_by_key(|(_, region)| region.base);
        all
    }
}
