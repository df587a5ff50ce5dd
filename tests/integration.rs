//! Integration tests for imagepack.
//!
//! These tests verify end-to-end functionality including:
//! - Token round-trips through the public codec API
//! - Map composition and tile caching against a counting mock tile server
//! - Read-through artifact caching (freshness, single-flight)
//! - HTTP routes, headers, conditional requests and error mapping

mod integration {
    pub mod test_utils;

    pub mod api_tests;
    pub mod artifact_tests;
    pub mod codec_tests;
    pub mod map_tests;
}
