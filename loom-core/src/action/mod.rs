//! Action Router and its operators (§4.2, §4.7).

pub mod envelope;
pub mod matcher;
pub mod router;
pub mod safe_path;
pub mod shell;

pub use envelope::{parse_envelope, Action, ActionEnvelope};
pub use matcher::apply_edit;
pub use router::{route_action, BeadIntent, RouterOutcome};
pub use safe_path::safe_join;
