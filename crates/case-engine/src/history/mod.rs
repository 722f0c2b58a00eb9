mod memory;

pub use memory::InMemoryHistory;
