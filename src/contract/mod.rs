pub mod repair;
pub mod validate;

pub use validate::{parse_and_validate, ContractError, PlanStep, ResponseContract};
