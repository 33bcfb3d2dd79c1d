//! Opaque identities for engine-owned objects.
//!
//! The engine owns every object behind these values; this crate never
//! dereferences them. They exist so registrations and payload arguments can
//! carry an identity across the runtime boundary without claiming ownership.

use std::fmt;

/// Identity of one in-flight request, unique for that request's lifetime.
///
/// Supplied by the engine when the request is created and used as the key
/// for endpoint registration. Two requests never share a handle while both
/// are alive; a handle may be reused after its request is torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestHandle(u64);

impl RequestHandle {
    /// Wraps the engine-supplied raw identity.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identity value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }

    /// Reference to the request object itself, for use as a payload argument.
    pub const fn as_engine_ref(&self) -> EngineRef {
        EngineRef(self.0)
    }
}

impl fmt::Display for RequestHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

/// Opaque address of any other engine-owned object crossing the bridge:
/// response info, read buffer, upload sink, or the engine instance itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EngineRef(u64);

impl EngineRef {
    /// Wraps the engine-supplied raw address.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw address value.
    pub const fn as_raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EngineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#018x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_handle_round_trips_raw_value() {
        let handle = RequestHandle::new(0xDEAD_BEEF);
        assert_eq!(handle.as_raw(), 0xDEAD_BEEF);
        assert_eq!(handle.as_engine_ref(), EngineRef::new(0xDEAD_BEEF));
    }

    #[test]
    fn test_handles_are_distinct_map_keys() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(RequestHandle::new(1), "first");
        map.insert(RequestHandle::new(2), "second");
        assert_eq!(map.get(&RequestHandle::new(1)), Some(&"first"));
        assert_eq!(map.get(&RequestHandle::new(3)), None);
    }

    #[test]
    fn test_display_is_fixed_width_hex() {
        assert_eq!(RequestHandle::new(0x2A).to_string(), "0x000000000000002a");
        assert_eq!(EngineRef::new(0x2A).to_string(), "0x000000000000002a");
    }
}
