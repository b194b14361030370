/// Kibana saved-object creation
pub mod dashboard_generator;

pub use dashboard_generator::DashboardGenerator;
