/// Alert creation, delivery and CPU monitoring
pub mod alert_manager;
/// Threshold operators
pub mod threshold;

pub use alert_manager::{AlertDelivery, AlertManager, Delivery};
pub use threshold::Operator;
