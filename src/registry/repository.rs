//! Component repository port and adapters.

pub mod contract;
pub mod memory;
pub mod xdg;

pub use contract::{ComponentRepository, LoadedComponents, RejectedRecord, StoredComponent};
pub use memory::InMemoryComponentRepository;
pub use xdg::XdgComponentRepository;
