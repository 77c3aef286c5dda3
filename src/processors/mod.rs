//! Standard processors (§4.H): algebra, projection, slicing, histogramming, accumulation,
//! statistics probes, filtering, control, and the device-frame source — grouped into a
//! handful of parameterized engines per the registry note in SPEC_FULL.md §4.H. Each
//! historical `pp`-number from the distilled specification resolves to exactly one of these
//! engines, differentiated by a configuration-driven enum rather than a dedicated struct per
//! number.

pub mod accumulate;
pub mod algebra;
pub mod control;
pub mod filter;
pub mod histogram;
pub mod projection;
pub mod slice;
pub mod source;
pub mod stats;
