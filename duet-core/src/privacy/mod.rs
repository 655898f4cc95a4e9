//! Privacy scrubber: a mandatory pre-upload and pre-publish pass that
//! redacts credentials, tokens, secrets, and personal data before any text
//! leaves the process.

pub mod rules;
pub mod scrubber;

pub use rules::{Category, Platform, Rule, ALL_RULES};
pub use scrubber::{create_scoped_scrubber, scrub, validate_scrubbed, ScrubMatch, ScrubResult, Scrubber, Span};
