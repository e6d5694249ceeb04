//! Per-compilation variable and parameter naming.

use super::plan::{Expr, Param, Var};
use neoql_common::types::Value;
use std::sync::Arc;

/// Name of the claims parameter.
pub const JWT_PARAM: &str = "jwt";

/// Name of the authentication flag parameter.
pub const AUTHENTICATED_PARAM: &str = "isAuthenticated";

/// Hands out unique names for one compilation.
///
/// Variables share one counter whatever their prefix (`this0`, `edge1`,
/// `var2`), parameters have their own (`param0`, `param1`). A fresh namer is
/// created for every translation, so output never depends on what was
/// compiled before.
#[derive(Debug, Default)]
pub struct Namer {
    next_var: u32,
    next_param: u32,
}

impl Namer {
    /// Creates a namer starting at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self, prefix: &str) -> Var {
        let var = Var::new(format!("{prefix}{}", self.next_var));
        self.next_var += 1;
        var
    }

    /// A node variable.
    pub fn node(&mut self) -> Var {
        self.next("this")
    }

    /// A relationship variable.
    pub fn edge(&mut self) -> Var {
        self.next("edge")
    }

    /// Any other variable.
    pub fn var(&mut self) -> Var {
        self.next("var")
    }

    /// Binds a request value to a fresh parameter.
    pub fn param(&mut self, value: Value) -> Expr {
        let name: Arc<str> = format!("param{}", self.next_param).into();
        self.next_param += 1;
        Expr::Param(Param { name, value })
    }

    /// A parameter with a fixed name. Binding it twice is only valid with
    /// the same value.
    #[must_use]
    pub fn named_param(&self, name: &str, value: Value) -> Expr {
        Expr::Param(Param {
            name: name.into(),
            value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shared_variable_counter() {
        let mut namer = Namer::new();
        assert_eq!(namer.node().name(), "this0");
        assert_eq!(namer.edge().name(), "edge1");
        assert_eq!(namer.var().name(), "var2");
        assert_eq!(namer.node().name(), "this3");
    }

    #[test]
    fn test_parameters() {
        let mut namer = Namer::new();
        let Expr::Param(first) = namer.param(Value::from("a")) else {
            panic!("Expected Param");
        };
        let Expr::Param(second) = namer.param(Value::from("a")) else {
            panic!("Expected Param");
        };
        assert_eq!(first.name.as_ref(), "param0");
        assert_eq!(second.name.as_ref(), "param1");
        // Parameters do not consume variable numbers.
        assert_eq!(namer.node().name(), "this0");
    }
}
