use std::collections::{HashMap, HashSet};

use crate::config::FallbackConfig;
use crate::region::Region;
use crate::resilience::circuit_breaker::BreakerRegistry;

/// Fixed region-to-fallback table
#[derive(Debug, Clone)]
pub struct FallbackTopology {
    mapping: HashMap<Region, Region>,
}

impl FallbackTopology {
    pub fn new(mapping: HashMap<Region, Region>) -> Self {
        Self { mapping }
    }

    pub fn from_config(config: &FallbackConfig) -> Self {
        Self::new(config.mapping.clone())
    }

    /// The designated fallback for `region`, if one is configured
    pub fn fallback_of(&self, region: Region) -> Option<Region> {
        self.mapping.get(&region).copied()
    }

    /// Regions to try for `preferred`, in fallback order, keeping only available ones.
    ///
    /// The walk follows the mapping from `preferred` and stops at the first region it has
    /// already visited or at a region with no mapping, so cycles (including a region mapped
    /// to itself) terminate after at most one pass over the regions.
    pub async fn available_chain(&self, preferred: Region, breakers: &BreakerRegistry) -> Vec<Region> {
        let mut visited = HashSet::from([preferred]);
        let mut chain = Vec::new();

        if breakers.is_available(preferred).await {
            chain.push(preferred);
        }

        let mut next = self.fallback_of(preferred);
        while let Some(region) = next {
            if !visited.insert(region) {
                break;
            }
            if breakers.is_available(region).await {
                chain.push(region);
            }
            next = self.fallback_of(region);
        }

        chain
    }
}
