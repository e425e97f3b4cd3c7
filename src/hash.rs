//! Hash map used for every keyed store in the pool.
//!
//! Exactly one backend is active. `rustc-hash` wins when enabled on its own,
//! `ahash` likewise; any other combination falls back to the std hasher.

#[cfg(all(
    feature = "rustc-hash",
    not(any(feature = "ahash", feature = "std-hash"))
))]
pub type FastMap<K, V> = rustc_hash::FxHashMap<K, V>;

#[cfg(all(
    feature = "ahash",
    not(any(feature = "rustc-hash", feature = "std-hash"))
))]
pub type FastMap<K, V> = ahash::AHashMap<K, V>;

#[cfg(not(any(
    all(
        feature = "rustc-hash",
        not(any(feature = "ahash", feature = "std-hash"))
    ),
    all(
        feature = "ahash",
        not(any(feature = "rustc-hash", feature = "std-hash"))
    ),
)))]
pub type FastMap<K, V> = std::collections::HashMap<K, V>;
