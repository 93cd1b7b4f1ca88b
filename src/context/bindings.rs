//! Parameter bindings

use crate::executor::{ExecutorError, ExecutorResult};
use crate::row::Value;

/// Positional parameter values of one execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: Vec<Option<Value>>,
}

impl Bindings {
    /// No bindings
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `value` at `position`, replacing any earlier value
    pub fn set(&mut self, position: usize, value: Value) {
        if self.values.len() <= position {
            self.values.resize(position + 1, None);
        }
        self.values[position] = Some(value);
    }

    /// Value bound at `position`
    pub fn get(&self, position: usize) -> ExecutorResult<&Value> {
        self.values
            .get(position)
            .and_then(Option::as_ref)
            .ok_or_else(|| ExecutorError::plan_invalid(format!("No value bound at ${}", position)))
    }

    /// Removes every binding
    pub fn clear(&mut self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let mut bindings = Bindings::new();
        bindings.set(2, Value::Int(7));
        assert_eq!(bindings.get(2).unwrap(), &Value::Int(7));
        assert!(bindings.get(0).is_err());
        assert!(bindings.get(9).is_err());

        bindings.clear();
        assert!(bindings.get(2).is_err());
    }
}
