//! GitHub webhook event dispatch and push-event fan-out.
//!
//! The only crate in the workspace that knows about GitHub's webhook wire
//! format; everything downstream of [`events::parse_event`] deals in the
//! typed payloads and the rest of the workspace's crates.

pub mod commit_status;
pub mod dispatcher;
pub mod errors;
pub mod events;
pub mod metrics;
pub mod minimizer;
pub mod multiplexer;
pub mod signature;

pub use dispatcher::{AppContext, handle_webhook, process_event_for_test};
pub use errors::{DispatchError, DispatchResult};
pub use events::{PullRequestAction, WebhookEvent, parse_event, parse_known_event};
