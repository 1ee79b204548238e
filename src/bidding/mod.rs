pub mod auto_bid;
pub mod commands;
pub mod rules;
