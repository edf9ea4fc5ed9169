pub mod candidate;
pub mod event;
pub mod match_run;
pub mod negotiation;
pub mod offer;
