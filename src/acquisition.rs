pub mod acquirer;

pub use acquirer::{Acquirer, CommandAcquirer, StaticAcquirer};
