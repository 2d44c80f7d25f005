mod me;
mod students;

pub use me::Me;
pub use students::Students;
