//! chat-relay daemon
//!
//! A multi-client TCP chat relay. Clients connect, are assigned an identity,
//! and forward messages to each other by identity. The relay keeps paired
//! conversation history for the process lifetime and shuts itself down once
//! the last client has left or the operator interrupts it.

pub mod daemon;
