//! Script-facing entry points.
//!
//! A JavaScript or other scripting layer only ever sees plain calls and JSON
//! strings; every typed error is logged here and flattened.

use std::sync::Arc;

use crate::controller::MediaOutputController;
use crate::models::error::RouteError;
use crate::models::route::RouteKind;
use crate::traits::output_host::OutputHost;

pub struct MediaOutputModule<H: OutputHost> {
    controller: Arc<MediaOutputController<H>>,
}

impl<H: OutputHost> MediaOutputModule<H> {
    pub fn new(controller: Arc<MediaOutputController<H>>) -> Self {
        Self { controller }
    }

    pub fn controller(&self) -> &Arc<MediaOutputController<H>> {
        &self.controller
    }

    /// Toggle between speaker and private output. Fire-and-forget: failures
    /// are logged and route observers hear about them.
    pub fn use_media_output(&self) {
        match self.controller.toggle_output() {
            Ok(applied) if applied.changed => {
                log::info!("Media output toggled to {}", applied.route)
            }
            Ok(applied) => log::debug!("Media output already on {}", applied.route),
            Err(e) => log::error!("Media output toggle failed: {}", e),
        }
    }

    /// Select by a loose kind name such as `"speaker"` or `"bluetooth"`.
    pub fn select_output_by_name(&self, name: &str) -> Result<(), RouteError> {
        let kind = RouteKind::from_hint(name);
        self.controller.select_output(kind).map(|applied| {
            log::info!("Media output set to {} from '{}'", applied.route, name);
        })
    }

    /// Current catalog as a JSON array.
    pub fn available_routes_json(&self) -> Result<String, RouteError> {
        let routes = self.controller.list_available_routes();
        serde_json::to_string(&routes).map_err(|e| RouteError::Serialization(e.to_string()))
    }

    /// Active route as a JSON object, or `null` when nothing is engaged.
    pub fn active_route_json(&self) -> Result<String, RouteError> {
        let route = self.controller.active_route();
        serde_json::to_string(&route).map_err(|e| RouteError::Serialization(e.to_string()))
    }
}

impl<H: OutputHost> Clone for MediaOutputModule<H> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::mock::{MockOutputHost, MockResponse};
    use crate::models::config::ControllerConfiguration;
    use crate::models::error::HostRejection;

    fn module() -> (Arc<MockOutputHost>, MediaOutputModule<Arc<MockOutputHost>>) {
        let host = Arc::new(MockOutputHost::with_outputs(&[
            ("ear", "Earpiece", "earpiece"),
            ("spk", "Speaker", "speaker"),
        ]));
        let controller =
            MediaOutputController::new(Arc::clone(&host), ControllerConfiguration::default())
                .unwrap();
        controller.begin_session().unwrap();
        (host, MediaOutputModule::new(Arc::new(controller)))
    }

    #[test]
    fn use_media_output_toggles_speaker() {
        let (host, module) = module();

        module.use_media_output();
        assert_eq!(host.active_device().as_deref(), Some("spk"));

        module.use_media_output();
        assert_eq!(host.active_device().as_deref(), Some("ear"));
    }

    #[test]
    fn use_media_output_swallows_failures() {
        let (host, module) = module();
        host.set_response(MockResponse::Reject(HostRejection::PermissionRevoked));

        module.use_media_output();
        assert_eq!(module.controller().active_route().unwrap().device_id(), "ear");
    }

    #[test]
    fn routes_serialize_as_camel_case_json() {
        let (_, module) = module();
        let listing = module.available_routes_json().unwrap();
        let json: serde_json::Value = serde_json::from_str(&listing).unwrap();

        let routes = json.as_array().unwrap();
        assert_eq!(routes.len(), 2);
        assert_eq!(routes[0]["deviceId"], "ear");
        assert_eq!(routes[0]["kind"], "earpiece");
        assert_eq!(routes[1]["displayName"], "Speaker");
        assert_eq!(routes[1]["isAvailable"], true);
    }

    #[test]
    fn active_route_json_is_null_without_route() {
        let host = MockOutputHost::with_outputs(&[("spk", "Speaker", "speaker")]);
        let controller =
            MediaOutputController::new(host, ControllerConfiguration::default()).unwrap();
        let module = MediaOutputModule::new(Arc::new(controller));

        assert_eq!(module.active_route_json().unwrap(), "null");
    }

    #[test]
    fn select_by_name_accepts_loose_kind_names() {
        let (host, module) = module();

        module.select_output_by_name("Speaker Phone").unwrap();
        assert_eq!(host.active_device().as_deref(), Some("spk"));
        assert!(matches!(
            module.select_output_by_name("bluetooth"),
            Err(RouteError::RouteUnavailable(_))
        ));
    }
}
