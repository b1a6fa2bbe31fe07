//! Library surface of the `extreg` binary: configuration loading and
//! merging, path resolution, and the bundled base patches.

pub mod config;
pub mod patch;
pub mod paths;
