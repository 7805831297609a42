use bitflags::bitflags;

bitflags! {
    /// Flags carried in IPSET_ATTR_CADT_FLAGS, by both set headers and entries.
    pub struct CadtFlags: u32 {
        /// insert before the referenced member (list:set)
        const BEFORE        = 1 << 0;
        /// match the bridge physical device (hash:net,iface)
        const PHYSDEV       = 1 << 1;
        /// entry is an exception to the set
        const NOMATCH       = 1 << 2;
        /// set keeps per-entry packet and byte counters
        const WITH_COUNTERS = 1 << 3;
        /// set keeps per-entry comments
        const WITH_COMMENT  = 1 << 4;
        /// set evicts a random entry when full
        const WITH_FORCEADD = 1 << 5;
        /// set keeps per-entry skb mark, priority and queue
        const WITH_SKBINFO  = 1 << 6;
        /// interface name is a prefix match
        const IFACE_WILDCARD = 1 << 7;
    }
}

impl std::default::Default for CadtFlags {
    fn default() -> Self {
        CadtFlags::empty()
    }
}
