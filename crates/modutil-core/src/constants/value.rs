use std::fmt;
use std::sync::Arc;

/// A concrete constant that can be injected into source or resources
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    String(String),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Boolean(bool),
}

impl Constant {
    /// Type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Constant::String(_) => "string",
            Constant::Int(_) => "int",
            Constant::Long(_) => "long",
            Constant::Float(_) => "float",
            Constant::Double(_) => "double",
            Constant::Boolean(_) => "boolean",
        }
    }
}

/// Text form of a constant, as recorded in the constant cache and
/// substituted into resources.
impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::String(s) => f.write_str(s),
            Constant::Int(v) => write!(f, "{v}"),
            Constant::Long(v) => write!(f, "{v}"),
            // Debug keeps the fractional part ("1.0" rather than "1")
            Constant::Float(v) => write!(f, "{v:?}"),
            Constant::Double(v) => write!(f, "{v:?}"),
            Constant::Boolean(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for Constant {
    fn from(value: &str) -> Self {
        Constant::String(value.to_string())
    }
}

impl From<String> for Constant {
    fn from(value: String) -> Self {
        Constant::String(value)
    }
}

impl From<i32> for Constant {
    fn from(value: i32) -> Self {
        Constant::Int(value)
    }
}

impl From<i64> for Constant {
    fn from(value: i64) -> Self {
        Constant::Long(value)
    }
}

impl From<f32> for Constant {
    fn from(value: f32) -> Self {
        Constant::Float(value)
    }
}

impl From<f64> for Constant {
    fn from(value: f64) -> Self {
        Constant::Double(value)
    }
}

impl From<bool> for Constant {
    fn from(value: bool) -> Self {
        Constant::Boolean(value)
    }
}

/// Computation producing a constant only when it is consumed
#[derive(Clone)]
pub struct Deferred(Arc<dyn Fn() -> Option<Constant> + Send + Sync>);

impl Deferred {
    pub fn new<F>(compute: F) -> Self
    where
        F: Fn() -> Option<Constant> + Send + Sync + 'static,
    {
        Self(Arc::new(compute))
    }
}

impl fmt::Debug for Deferred {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Deferred(..)")
    }
}

/// Value handed out by a [`ConstantSource`](super::ConstantSource).
///
/// The chain never forces deferred values; whoever substitutes the value
/// calls [`ProvidedValue::force`] at the point of use.
#[derive(Debug, Clone)]
pub enum ProvidedValue {
    Immediate(Constant),
    Deferred(Deferred),
}

impl ProvidedValue {
    pub fn deferred<F>(compute: F) -> Self
    where
        F: Fn() -> Option<Constant> + Send + Sync + 'static,
    {
        ProvidedValue::Deferred(Deferred::new(compute))
    }

    /// Obtain the concrete constant, running a deferred computation.
    pub fn force(self) -> Option<Constant> {
        match self {
            ProvidedValue::Immediate(constant) => Some(constant),
            ProvidedValue::Deferred(Deferred(compute)) => compute(),
        }
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, ProvidedValue::Deferred(_))
    }
}

impl From<Constant> for ProvidedValue {
    fn from(value: Constant) -> Self {
        ProvidedValue::Immediate(value)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[test]
    fn test_display_keeps_fraction() {
        assert_eq!(Constant::Float(1.0).to_string(), "1.0");
        assert_eq!(Constant::Double(2.5).to_string(), "2.5");
        assert_eq!(Constant::Long(-7).to_string(), "-7");
        assert_eq!(Constant::from("hi").to_string(), "hi");
    }

    #[test]
    fn test_deferred_runs_on_each_force() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let value = ProvidedValue::deferred(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Some(Constant::Int(3))
        });

        assert!(value.is_deferred());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(value.clone().force(), Some(Constant::Int(3)));
        assert_eq!(value.force(), Some(Constant::Int(3)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
