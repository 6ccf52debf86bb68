// jv-test-utils: shared test utilities for the jvlink workspace.
//
// Provides the scripted in-memory backend used by unit and integration
// tests: a JvLinkClient whose reads, opens, and skips are driven from a
// queue the test scripts up front, with call counters for assertions.

pub mod scripted;

pub use scripted::{ScriptedClient, StubHandle};
