//! Synchronization primitives between simulation tasks.

pub mod spsc;
