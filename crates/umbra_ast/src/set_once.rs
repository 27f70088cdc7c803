//! A set-once-then-frozen field.

use std::fmt::{Debug, Formatter};

/// A field that may be assigned exactly once.
///
/// Reassignment is a defect in an earlier stage, never a user-input error, so
/// it aborts rather than being recoverable.
#[derive(Clone, Default)]
pub struct SetOnce<T> {
    value: Option<T>,
}

impl<T> SetOnce<T> {
    pub fn new() -> Self {
        Self { value: None }
    }

    /// Assigns the value. Panics if already set.
    #[track_caller]
    pub fn set(&mut self, value: T) {
        if self.value.is_some() {
            panic!("reference already set");
        }
        self.value = Some(value);
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }

    /// Reads the value. Panics if unset.
    #[track_caller]
    pub fn unwrap_ref(&self) -> &T {
        match &self.value {
            Some(value) => value,
            None => panic!("reference not set"),
        }
    }
}

impl<T: Copy> SetOnce<T> {
    pub fn copied(&self) -> Option<T> {
        self.value
    }
}

impl<T: Debug> Debug for SetOnce<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match &self.value {
            Some(value) => write!(f, "{value:?}"),
            None => write!(f, "<unset>"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_get() {
        let mut field = SetOnce::new();
        assert!(!field.is_set());
        field.set(3);
        assert_eq!(field.copied(), Some(3));
    }

    #[test]
    #[should_panic(expected = "reference already set")]
    fn test_second_set_panics() {
        let mut field = SetOnce::new();
        field.set(1);
        field.set(2);
    }

    #[test]
    #[should_panic(expected = "reference not set")]
    fn test_unwrap_unset_panics() {
        let field: SetOnce<i32> = SetOnce::new();
        field.unwrap_ref();
    }
}
