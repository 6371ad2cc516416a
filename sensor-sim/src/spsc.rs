//! Bounded single-producer single-consumer ring shared by [`crate::sync::spsc`].

pub(crate) mod ring;
