use serde::{Deserialize, Serialize};
use slotmap::new_key_type;

new_key_type! {
    /// Identifies a production unit (placed factory) in the scheduler.
    pub struct UnitId;
}

/// Identifies a kind of resource. Cheap to copy and compare.
///
/// Ids are handed out by the [`ResourceCatalog`](crate::catalog::ResourceCatalog)
/// starting at 1; id 0 is reserved for [`ResourceType::NONE`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ResourceType(pub u32);

impl ResourceType {
    /// Sentinel for "no resource" (empty terrain cell, unset output).
    pub const NONE: ResourceType = ResourceType(0);

    pub fn is_none(self) -> bool {
        self == Self::NONE
    }
}

impl Default for ResourceType {
    fn default() -> Self {
        Self::NONE
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_type_equality() {
        let a = ResourceType(1);
        let b = ResourceType(1);
        let c = ResourceType(2);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn none_sentinel_is_default() {
        assert_eq!(ResourceType::default(), ResourceType::NONE);
        assert!(ResourceType::NONE.is_none());
        assert!(!ResourceType(3).is_none());
    }

    #[test]
    fn unit_ids_are_distinct() {
        use slotmap::SlotMap;
        let mut sm = SlotMap::<UnitId, ()>::with_key();
        let a = sm.insert(());
        let b = sm.insert(());
        assert_ne!(a, b);
    }

    #[test]
    fn ids_are_hashable() {
        use std::collections::HashMap;
        let mut map = HashMap::new();
        map.insert(ResourceType(1), "wood");
        map.insert(ResourceType(2), "stone");
        assert_eq!(map[&ResourceType(1)], "wood");
    }
}
