//! Integration tests for site crawls and dispatch
//!
//! A scripted in-process browser stands in for Chrome and records every
//! render; wiremock answers the content-type probes.

mod crawl_tests;
mod dispatch_tests;
mod support;
