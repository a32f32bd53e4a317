pub mod atomic_write;
pub mod copy_dir;

pub use atomic_write::{AtomicWriteOptions, atomic_write};
pub use copy_dir::copy_dir_all;
