pub mod container;
pub mod param_value;
pub mod types;

pub use container::{ParameterContainer, ParameterEntry};
pub use param_value::{Errata, ParamValue};
pub use types::{AssocRow, FetchAllResult, FetchStyle, Row, Value};
