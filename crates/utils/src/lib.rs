//! Shared utilities for hcache
//!
//! Small filesystem helpers used by the header cache backends: advisory
//! lock files with bounded acquisition, atomic file replacement, XDG
//! directory resolution and tracing initialization.

pub mod atomic_file;
pub mod lock_file;
pub mod logging;
pub mod xdg;

pub use atomic_file::*;
pub use lock_file::*;
pub use xdg::*;
