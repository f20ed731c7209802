//! Internal tests module
//!
//! Multi-node propagation scenarios run against an in-process transport
//! that hands messages straight to the receiving engine.
