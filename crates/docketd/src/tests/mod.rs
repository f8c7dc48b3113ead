//! Test suites for the server bootstrap and request handling.

mod registry_behaviour;
pub(crate) mod support;
