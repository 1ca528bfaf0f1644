pub mod dapr_subscribe_route;
pub mod health_route;
pub mod parse_task;
