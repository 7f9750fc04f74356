pub mod data_type;
pub mod error;
pub mod key_generator;
pub mod value;

pub use data_type::DataType;
pub use error::{BreezeError, Result};
pub use key_generator::KeyGenerator;
pub use value::Value;
