pub mod auction;
pub mod bidding;
pub mod broadcast;
pub mod gateway;
pub mod handlers;
pub mod registry;
pub mod scheduler;
