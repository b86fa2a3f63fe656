pub mod fixtures;
pub mod mapper;
pub mod parser;

pub use mapper::map_nota;
pub use parser::{Elemento, NfeDocument};
