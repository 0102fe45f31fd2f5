pub mod route_catalog;
