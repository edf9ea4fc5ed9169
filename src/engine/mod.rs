pub mod booking;
pub mod deadline;
pub mod gate;
pub mod history;
pub mod locks;
pub mod matching;
pub mod providers;
pub mod scoring;

#[cfg(test)]
pub(crate) mod testing;
