//! Shared GitHub client plumbing: authentication, per-owner client
//! caching, low-level REST/GraphQL wrappers, and the pull-request
//! context threaded through the rest of the controller.

pub mod client;
pub mod errors;
pub mod metadata;
pub mod metrics;
pub mod pr_context;
pub mod registry;

pub use client::{ClientPair, GraphQlClient, RestClient};
pub use errors::{GhError, GhResult};
pub use metadata::{PreviousPromotion, PrMetadata};
pub use pr_context::PrContext;
pub use registry::{APPROVER_IDENTITY_ENV, ClientRegistry, EnvNames, MAIN_IDENTITY_ENV, github_web_base_url};
