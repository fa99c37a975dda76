//! Visibility Guard
//!
//! Classifies each write path as `public`, `sensitive` or `local` and rejects
//! values that would leak across that boundary:
//!
//! ```text
//! ┌──────────────┬──────────────────────────────────────────────┐
//! │ public       │ no identifying keys anywhere in the payload  │
//! │              │ (unless the path is an allow-listed directory)│
//! │ sensitive    │ payload must carry `__encrypted: true`        │
//! │ local        │ unchecked                                     │
//! │ (no match)   │ always rejected                               │
//! └──────────────┴──────────────────────────────────────────────┘
//! ```

pub mod classification;
pub mod guard;

pub use classification::{Classification, PathPattern, PathRule, VisibilityTable};
pub use guard::{
    ENCRYPTED_MARKER, TopologyViolation, find_key, is_encrypted, is_identifying_key,
    validate_write,
};
