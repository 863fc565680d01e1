//! Scenario tests driving `GridPlugin` through the `TestGrid` harness.

mod persistence_tests;
