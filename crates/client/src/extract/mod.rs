//! Markup scanning for loader references.
//!
//! A page opts in with `<script data-request="true">`. Without that marker no
//! references are reported.

pub mod references;

pub use references::{PageScan, scan_page};
