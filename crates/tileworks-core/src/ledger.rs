//! Global storage: resource quantities bounded by a shared volumetric
//! capacity.
//!
//! Every resource kind takes `volume_per_unit` of space (from the
//! [`ResourceCatalog`]). The ledger keeps
//! `current_volume == Σ quantity(t) * volume_per_unit(t)` exactly (fixed
//! point) and refuses any add that would push the volume past the total
//! capacity.

use std::collections::BTreeMap;

use crate::catalog::ResourceCatalog;
use crate::event::Event;
use crate::fixed::Fixed64;
use crate::id::ResourceType;

#[derive(Debug, Clone)]
pub struct ResourceLedger {
    /// Volume per unit for every resource the ledger accepts.
    volumes: BTreeMap<ResourceType, Fixed64>,
    inventory: BTreeMap<ResourceType, u32>,
    current_volume: Fixed64,
    total_capacity: Fixed64,
    outbox: Vec<Event>,
}

impl ResourceLedger {
    /// Create an empty ledger accepting every resource in `catalog`.
    pub fn new(catalog: &ResourceCatalog, capacity: Fixed64) -> Self {
        let volumes = catalog
            .ids()
            .filter_map(|id| catalog.volume_per_unit(id).map(|v| (id, v)))
            .collect::<BTreeMap<_, _>>();
        let inventory = volumes.keys().map(|&id| (id, 0)).collect();
        Self {
            volumes,
            inventory,
            current_volume: Fixed64::ZERO,
            total_capacity: capacity.max(Fixed64::ZERO),
            outbox: Vec::new(),
        }
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Store `amount` of `resource`. Returns false and changes nothing if the
    /// resource is unknown or the volume would exceed capacity.
    pub fn add_resource(&mut self, resource: ResourceType, amount: u32) -> bool {
        let Some(&volume) = self.volumes.get(&resource) else {
            return false;
        };
        let Some(added) = volume_of(volume, amount) else {
            return false;
        };
        let Some(new_volume) = self.current_volume.checked_add(added) else {
            return false;
        };
        if new_volume > self.total_capacity {
            return false;
        }
        let Some(quantity) = self.inventory.get_mut(&resource) else {
            return false;
        };
        let Some(new_quantity) = quantity.checked_add(amount) else {
            return false;
        };

        *quantity = new_quantity;
        self.current_volume = new_volume;
        self.outbox.push(Event::ResourceChanged {
            resource,
            quantity: new_quantity,
        });
        true
    }

    /// Take up to `amount` of `resource`. Returns how much was actually
    /// taken, `min(available, amount)`.
    pub fn consume_resource(&mut self, resource: ResourceType, amount: u32) -> u32 {
        let Some(quantity) = self.inventory.get_mut(&resource) else {
            return 0;
        };
        let taken = (*quantity).min(amount);
        if taken == 0 {
            return 0;
        }

        *quantity -= taken;
        let new_quantity = *quantity;
        let volume = self.volumes.get(&resource).copied().unwrap_or(Fixed64::ZERO);
        let freed = volume_of(volume, taken).unwrap_or(self.current_volume);
        self.current_volume = self.current_volume.saturating_sub(freed).max(Fixed64::ZERO);
        self.outbox.push(Event::ResourceChanged {
            resource,
            quantity: new_quantity,
        });
        taken
    }

    /// Apply a storage construction (+) or demolition (-) delta. The total
    /// never drops below zero.
    ///
    /// A shrink below the stored volume is applied anyway; the ledger then
    /// rejects every add until consumption drains it. Gate demolition with
    /// [`can_shrink_capacity`](Self::can_shrink_capacity) to avoid that.
    pub fn adjust_capacity(&mut self, delta: Fixed64) {
        let total = self
            .total_capacity
            .saturating_add(delta)
            .max(Fixed64::ZERO);
        if total < self.current_volume {
            tracing::warn!(
                capacity = %total,
                volume = %self.current_volume,
                "storage capacity reduced below stored volume"
            );
        }
        self.total_capacity = total;
        self.outbox.push(Event::CapacityChanged {
            total_capacity: total,
        });
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    pub fn has_resource(&self, resource: ResourceType, amount: u32) -> bool {
        self.quantity(resource) >= amount
    }

    /// Whether removing `amount` of capacity keeps stored volume in bounds.
    pub fn can_shrink_capacity(&self, amount: Fixed64) -> bool {
        (self.total_capacity.saturating_sub(amount)).max(Fixed64::ZERO) >= self.current_volume
    }

    pub fn quantity(&self, resource: ResourceType) -> u32 {
        self.inventory.get(&resource).copied().unwrap_or(0)
    }

    pub fn current_volume(&self) -> Fixed64 {
        self.current_volume
    }

    pub fn total_capacity(&self) -> Fixed64 {
        self.total_capacity
    }

    pub fn free_volume(&self) -> Fixed64 {
        (self.total_capacity - self.current_volume).max(Fixed64::ZERO)
    }

    /// Largest amount of `resource` that [`add_resource`](Self::add_resource)
    /// would accept right now. Zero for unknown resources.
    pub fn room_for(&self, resource: ResourceType) -> u32 {
        let (Some(&volume), Some(&held)) =
            (self.volumes.get(&resource), self.inventory.get(&resource))
        else {
            return 0;
        };
        let headroom = u32::MAX - held;
        if volume == Fixed64::ZERO {
            return headroom;
        }
        self.free_volume()
            .checked_div(volume)
            .and_then(|units| units.checked_to_num::<u32>())
            .unwrap_or(u32::MAX)
            .min(headroom)
    }

    pub fn volume_per_unit(&self, resource: ResourceType) -> Option<Fixed64> {
        self.volumes.get(&resource).copied()
    }

    /// Non-zero stock in resource id order.
    pub fn stock(&self) -> impl Iterator<Item = (ResourceType, u32)> + '_ {
        self.inventory
            .iter()
            .filter(|(_, q)| **q > 0)
            .map(|(&id, &q)| (id, q))
    }

    /// Recompute the stored volume from the inventory. Equal to
    /// [`current_volume`](Self::current_volume) at all times.
    pub fn recomputed_volume(&self) -> Fixed64 {
        self.inventory
            .iter()
            .map(|(id, &q)| {
                let volume = self.volumes.get(id).copied().unwrap_or(Fixed64::ZERO);
                volume_of(volume, q).unwrap_or(Fixed64::MAX)
            })
            .fold(Fixed64::ZERO, |acc, v| acc.saturating_add(v))
    }

    /// Take the events recorded since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.outbox)
    }
}

/// Space taken by `amount` units at `volume` each. `None` when the product
/// does not fit a [`Fixed64`].
fn volume_of(volume: Fixed64, amount: u32) -> Option<Fixed64> {
    if volume == Fixed64::ZERO {
        return Some(Fixed64::ZERO);
    }
    Fixed64::checked_from_num(amount).and_then(|n| volume.checked_mul(n))
}
