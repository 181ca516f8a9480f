//! Generic test drivers shared by every implementation.
//!
//! Each lock and each set implements the same contract, so the heavy
//! lifting of the unit tests lives here once and the per-type test
//! modules just instantiate it.
