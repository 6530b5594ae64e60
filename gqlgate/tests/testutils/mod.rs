//! Test utilities for gqlgate integration tests
//!
//! `GatewayFixture` wraps a coordinator around a compiler that counts its
//! invocations, so tests can assert how often a plan was really built.

#![allow(dead_code)]

pub mod gateway_fixture;
