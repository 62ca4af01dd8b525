/// Local filesystem lister.
pub mod fs;

pub use fs::FileKeyLister;
