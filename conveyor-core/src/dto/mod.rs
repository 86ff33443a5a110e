//! Data Transfer Objects for the commit status API
//!
//! DTOs are the wire representation of status updates sent to the
//! source forge.

pub mod status;
