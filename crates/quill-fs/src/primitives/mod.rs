pub mod atomic_write;

pub use atomic_write::{
    AtomicWriteOptions, atomic_read, atomic_read_gz, atomic_write, atomic_write_reusing,
    atomic_write_with, write_atomic, write_atomic_gz,
};
