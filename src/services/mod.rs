pub mod openf1;
pub mod pipeline;
pub mod provider;
pub mod session;
pub mod trend;
