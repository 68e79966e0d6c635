//! MicroSynth Core Types and Definitions
//!
//! This crate provides the leaf types shared by the MicroSynth diagram
//! engine and its hosts. It includes:
//!
//! - **Geometry**: Points, sizes and bounds with the perpendicular offset used
//!   to bend parallel edges ([`geometry`] module)
//! - **Identifiers**: Node and connection ids ([`identifier::NodeId`],
//!   [`identifier::ConnectionId`])
//! - **Shapes**: Node outlines, their sizes and edge intersection math
//!   ([`shape::Shape`])
//! - **Payloads**: Service and call descriptions carried by nodes and
//!   connections ([`payload`] module)

pub mod geometry;
pub mod identifier;
pub mod payload;
pub mod shape;
