pub mod output_host;
pub mod route_observer;
