pub mod candidate;
pub mod election;
pub mod position;
pub mod settings;
pub mod vote;
pub mod voter;
