//! Golden vector tests for the packet wire format.
//!
//! These tests pin the exact byte layout and the deterministic packet
//! stream so any accidental wire change fails loudly.
