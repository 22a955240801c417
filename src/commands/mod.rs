pub mod control;
pub mod query;
pub mod serve;
