//! # media-route-windows
//!
//! Windows MMDevice/WASAPI backend for media-route-core.
//!
//! Provides:
//! - `WasapiOutputHost`: `OutputHost` that opens the chosen render endpoint via WASAPI
//! - `RenderEndpointEnumerator`: Render endpoint enumeration via MMDevice API
//! - `EndpointWatcher`: Hot-plug detection by polling the endpoint list
//! - `endpoint_kind`: Form factor and bus classification into route kinds
//!
//! ## Platform Requirements
//! - Windows 10 or later
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use media_route_core::{ControllerConfiguration, MediaOutputController};
//! use media_route_windows::{watch_render_endpoints, WasapiOutputHost, DEFAULT_POLL_INTERVAL};
//!
//! let controller = Arc::new(MediaOutputController::new(
//!     WasapiOutputHost::new(),
//!     ControllerConfiguration::default(),
//! )?);
//! let events = Arc::clone(&controller);
//! let _watcher = watch_render_endpoints(DEFAULT_POLL_INTERVAL, move |event| {
//!     events.handle_host_event(event)
//! })?;
//! controller.begin_session()?;
//! ```

pub mod endpoint_kind;
pub mod endpoint_watcher;
pub mod error;
#[cfg(target_os = "windows")]
pub mod render_endpoints;
#[cfg(target_os = "windows")]
pub mod wasapi_output_host;

pub use endpoint_watcher::{diff_endpoints, EndpointWatcher, DEFAULT_POLL_INTERVAL};
pub use error::EndpointError;

#[cfg(target_os = "windows")]
pub use endpoint_watcher::watch_render_endpoints;
#[cfg(target_os = "windows")]
pub use render_endpoints::RenderEndpointEnumerator;
#[cfg(target_os = "windows")]
pub use wasapi_output_host::WasapiOutputHost;
