pub mod dispatch;
pub mod queue;
pub mod rules;
pub mod selection;
