pub mod route_selector;
