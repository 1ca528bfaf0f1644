pub mod parse_task_message;
pub mod parse_task_route;
