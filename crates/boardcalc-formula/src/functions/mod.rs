//! Built-in formula functions
//!
//! Every function is total: malformed arguments coerce or fall back rather
//! than error. Divide and modulus by zero return 0; strings that do not
//! parse contribute 0 in numeric contexts.

pub mod date;
pub mod logical;
pub mod math;
pub mod text;

use std::collections::HashMap;

use boardcalc_core::Scalar;

/// Function implementation signature
pub type FunctionImpl = fn(&[Scalar]) -> Scalar;

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Implementation
    pub implementation: FunctionImpl,
}

/// Function registry
pub struct FunctionRegistry {
    functions: HashMap<String, FunctionDef>,
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: HashMap::new(),
        };

        registry.register_math_functions();
        registry.register_logical_functions();
        registry.register_text_functions();
        registry.register_date_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef {
            name: "SUM",
            min_args: 1,
            max_args: None,
            implementation: math::fn_sum,
        });
        self.register(FunctionDef {
            name: "AVERAGE",
            min_args: 1,
            max_args: None,
            implementation: math::fn_average,
        });
        self.register(FunctionDef {
            name: "COUNT",
            min_args: 1,
            max_args: None,
            implementation: math::fn_count,
        });
        self.register(FunctionDef {
            name: "MAX",
            min_args: 1,
            max_args: None,
            implementation: math::fn_max,
        });
        self.register(FunctionDef {
            name: "MIN",
            min_args: 1,
            max_args: None,
            implementation: math::fn_min,
        });
        self.register(FunctionDef {
            name: "ABS",
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_abs,
        });
        self.register(FunctionDef {
            name: "ROUND",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_round,
        });
        self.register(FunctionDef {
            name: "ROUNDUP",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_roundup,
        });
        self.register(FunctionDef {
            name: "ROUNDDOWN",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_rounddown,
        });
        self.register(FunctionDef {
            name: "MOD",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_mod,
        });
        self.register(FunctionDef {
            name: "POWER",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_power,
        });
        self.register(FunctionDef {
            name: "SQRT",
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_sqrt,
        });
        self.register(FunctionDef {
            name: "LOG",
            min_args: 1,
            max_args: Some(2),
            implementation: math::fn_log,
        });
        self.register(FunctionDef {
            name: "DIVIDE",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_divide,
        });
        self.register(FunctionDef {
            name: "MULTIPLY",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_multiply,
        });
        self.register(FunctionDef {
            name: "MINUS",
            min_args: 2,
            max_args: Some(2),
            implementation: math::fn_minus,
        });
        self.register(FunctionDef {
            name: "SIGN",
            min_args: 1,
            max_args: Some(1),
            implementation: math::fn_sign,
        });
        self.register(FunctionDef {
            name: "PI",
            min_args: 0,
            max_args: Some(0),
            implementation: math::fn_pi,
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "IF",
            min_args: 2,
            max_args: Some(3),
            implementation: logical::fn_if,
        });
        self.register(FunctionDef {
            name: "AND",
            min_args: 1,
            max_args: None,
            implementation: logical::fn_and,
        });
        self.register(FunctionDef {
            name: "OR",
            min_args: 1,
            max_args: None,
            implementation: logical::fn_or,
        });
        self.register(FunctionDef {
            name: "NOT",
            min_args: 1,
            max_args: Some(1),
            implementation: logical::fn_not,
        });
        self.register(FunctionDef {
            name: "XOR",
            min_args: 1,
            max_args: None,
            implementation: logical::fn_xor,
        });
        self.register(FunctionDef {
            name: "SWITCH",
            min_args: 3,
            max_args: None,
            implementation: logical::fn_switch,
        });
        self.register(FunctionDef {
            name: "EXACT",
            min_args: 2,
            max_args: Some(2),
            implementation: logical::fn_exact,
        });
        self.register(FunctionDef {
            name: "TRUE",
            min_args: 0,
            max_args: Some(0),
            implementation: logical::fn_true,
        });
        self.register(FunctionDef {
            name: "FALSE",
            min_args: 0,
            max_args: Some(0),
            implementation: logical::fn_false,
        });
    }

    fn register_text_functions(&mut self) {
        self.register(FunctionDef {
            name: "CONCATENATE",
            min_args: 1,
            max_args: None,
            implementation: text::fn_concatenate,
        });
        self.register(FunctionDef {
            name: "LEFT",
            min_args: 1,
            max_args: Some(2),
            implementation: text::fn_left,
        });
        self.register(FunctionDef {
            name: "RIGHT",
            min_args: 1,
            max_args: Some(2),
            implementation: text::fn_right,
        });
        self.register(FunctionDef {
            name: "MID",
            min_args: 3,
            max_args: Some(3),
            implementation: text::fn_mid,
        });
        self.register(FunctionDef {
            name: "LEN",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_len,
        });
        self.register(FunctionDef {
            name: "LOWER",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_lower,
        });
        self.register(FunctionDef {
            name: "UPPER",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_upper,
        });
        self.register(FunctionDef {
            name: "TRIM",
            min_args: 1,
            max_args: Some(1),
            implementation: text::fn_trim,
        });
        self.register(FunctionDef {
            name: "REPLACE",
            min_args: 4,
            max_args: Some(4),
            implementation: text::fn_replace,
        });
        self.register(FunctionDef {
            name: "REPT",
            min_args: 2,
            max_args: Some(2),
            implementation: text::fn_rept,
        });
        self.register(FunctionDef {
            name: "SEARCH",
            min_args: 2,
            max_args: Some(3),
            implementation: text::fn_search,
        });
        self.register(FunctionDef {
            name: "SUBSTITUTE",
            min_args: 3,
            max_args: Some(4),
            implementation: text::fn_substitute,
        });
        self.register(FunctionDef {
            name: "TEXT",
            min_args: 1,
            max_args: Some(2),
            implementation: text::fn_text,
        });
    }

    fn register_date_functions(&mut self) {
        self.register(FunctionDef {
            name: "TODAY",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_today,
        });
        self.register(FunctionDef {
            name: "NOW",
            min_args: 0,
            max_args: Some(0),
            implementation: date::fn_now,
        });
        self.register(FunctionDef {
            name: "DATE",
            min_args: 3,
            max_args: Some(3),
            implementation: date::fn_date,
        });
        self.register(FunctionDef {
            name: "DATEVALUE",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_datevalue,
        });
        self.register(FunctionDef {
            name: "YEAR",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_year,
        });
        self.register(FunctionDef {
            name: "MONTH",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_month,
        });
        self.register(FunctionDef {
            name: "DAY",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_day,
        });
        self.register(FunctionDef {
            name: "HOUR",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_hour,
        });
        self.register(FunctionDef {
            name: "MINUTE",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_minute,
        });
        self.register(FunctionDef {
            name: "SECOND",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_second,
        });
        self.register(FunctionDef {
            name: "DAYS",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_days,
        });
        self.register(FunctionDef {
            name: "ADD_DAYS",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_add_days,
        });
        self.register(FunctionDef {
            name: "SUBTRACT_DAYS",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_subtract_days,
        });
        self.register(FunctionDef {
            name: "WEEKDAY",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_weekday,
        });
        self.register(FunctionDef {
            name: "WEEKNUM",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_weeknum,
        });
        self.register(FunctionDef {
            name: "ISOWEEKNUM",
            min_args: 1,
            max_args: Some(1),
            implementation: date::fn_isoweeknum,
        });
        self.register(FunctionDef {
            name: "WORKDAY",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_workday,
        });
        self.register(FunctionDef {
            name: "WORKDAYS",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_workdays,
        });
        self.register(FunctionDef {
            name: "FORMAT_DATE",
            min_args: 1,
            max_args: Some(2),
            implementation: date::fn_format_date,
        });
        self.register(FunctionDef {
            name: "HOURS_DIFF",
            min_args: 2,
            max_args: Some(2),
            implementation: date::fn_hours_diff,
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_lookup_case_insensitive() {
        let registry = FunctionRegistry::new();
        assert!(registry.get("SUM").is_some());
        assert!(registry.get("sum").is_some());
        assert!(registry.get("Format_Date").is_some());
        assert!(registry.get("NOPE").is_none());
    }

    #[test]
    fn test_registry_size() {
        let registry = FunctionRegistry::new();
        // Four groups; the closed list has ~60 entries
        assert!(registry.functions.len() >= 55);
    }
}
