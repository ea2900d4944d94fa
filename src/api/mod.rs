//! Local HTTP surface for the browser dashboard

pub mod rest;
pub mod view;

pub use rest::RestApi;
pub use view::DashboardView;
