//! SDP offer/answer for a WHIP publish session.
//!
//! Scoped to exactly the one offer shape a publisher ever sends and the
//! handful of answer lines it ever needs back — see [`whip`] for both. RFC
//! 4566 is otherwise out of scope: there is no generic session-description
//! model here, because nothing in this crate negotiates anything other than
//! the fixed one-audio/one-video publish offer.

pub mod whip;

pub use whip::{build_offer, parse_answer, AnswerInfo, OfferParams, WhipSdpError, MAX_SDP_SIZE};
