//! # media-route-core
//!
//! Platform-agnostic media output route controller.
//!
//! Tracks which audio outputs exist, decides which one a media session
//! should use, and applies that choice through a host backend without ever
//! leaving the session on a route that has disappeared. Platform backends
//! (Windows WASAPI, mobile audio managers) implement the `OutputHost` trait
//! and plug into the generic `MediaOutputController`.
//!
//! ## Architecture
//!
//! ```text
//! media-route-core (this crate)
//! ├── traits/       ← OutputHost, RouteObserver
//! ├── models/       ← AudioRoute, RouteKind, RouteError, SwitchPhase, ControllerConfiguration
//! ├── catalog/      ← RouteCatalog (hot-plug aware list of outputs)
//! ├── selection/    ← RouteSelector (priority, override, toggle)
//! ├── session/      ← OutputSwitch (serialized, timeout-bounded apply)
//! ├── notify/       ← ChangeNotifier (ordered, non-blocking fan-out)
//! ├── host/         ← MockOutputHost
//! ├── controller    ← MediaOutputController (application surface)
//! └── bridge        ← MediaOutputModule (JSON-facing script entry points)
//! ```

pub mod bridge;
pub mod catalog;
pub mod controller;
pub mod host;
pub mod models;
pub mod notify;
pub mod selection;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use bridge::MediaOutputModule;
pub use catalog::route_catalog::{AttachOutcome, RouteCatalog};
pub use controller::MediaOutputController;
pub use host::mock::{MockOutputHost, MockResponse};
pub use models::config::ControllerConfiguration;
pub use models::error::{HostRejection, RouteError, RouteTarget, SwitchFailed, SwitchFailureReason};
pub use models::event::RouteEvent;
pub use models::request::{SwitchReason, SwitchRequest, SwitchTarget};
pub use models::route::{AudioRoute, HostDeviceDescriptor, HostDeviceEvent, RouteKind};
pub use models::state::{ActiveRouteState, RouteApplied, SwitchPhase};
pub use notify::change_notifier::{ChangeNotifier, SubscriptionHandle};
pub use selection::route_selector::{RouteSelector, DEFAULT_PRIORITY};
pub use session::output_switch::OutputSwitch;
pub use traits::output_host::{ApplyCompletion, OutputHost};
pub use traits::route_observer::RouteObserver;
