/// Cypher to SQL function registry
///
/// Maps Cypher function names to SQL equivalents. Lookups are case-insensitive.
use std::collections::HashMap;

/// Function mapping entry
#[derive(Clone)]
pub struct FunctionMapping {
    /// SQL function name, or the target type for casts
    pub sql_name: &'static str,
    /// Render as `CAST(arg AS sql_name)` instead of a call
    pub is_cast: bool,
}

impl FunctionMapping {
    pub fn render(&self, args: &[String]) -> String {
        if self.is_cast {
            format!("CAST({} AS {})", args.join(", "), self.sql_name)
        } else {
            format!("{}({})", self.sql_name, args.join(", "))
        }
    }
}

/// Get function mapping for a scalar Cypher function
pub fn get_function_mapping(cypher_fn: &str) -> Option<FunctionMapping> {
    let fn_lower = cypher_fn.to_lowercase();
    FUNCTION_MAPPINGS.get(fn_lower.as_str()).cloned()
}

/// SQL name of an aggregate function, `None` when `cypher_fn` is not an aggregate
pub fn get_aggregate_mapping(cypher_fn: &str) -> Option<&'static str> {
    let fn_lower = cypher_fn.to_lowercase();
    AGGREGATE_MAPPINGS.get(fn_lower.as_str()).copied()
}

pub fn is_aggregate_function(cypher_fn: &str) -> bool {
    get_aggregate_mapping(cypher_fn).is_some()
}

// Static function mapping tables
lazy_static::lazy_static! {
    static ref AGGREGATE_MAPPINGS: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("count", "COUNT");
        m.insert("sum", "SUM");
        m.insert("min", "MIN");
        m.insert("max", "MAX");
        m.insert("avg", "AVG");
        m.insert("collect", "ARRAY_AGG");
        m
    };

    static ref FUNCTION_MAPPINGS: HashMap<&'static str, FunctionMapping> = {
        let mut m = HashMap::new();

        // ===== STRING FUNCTIONS =====
        m.insert("toupper", FunctionMapping { sql_name: "UPPER", is_cast: false });
        m.insert("tolower", FunctionMapping { sql_name: "LOWER", is_cast: false });
        m.insert("trim", FunctionMapping { sql_name: "TRIM", is_cast: false });
        m.insert("size", FunctionMapping { sql_name: "LENGTH", is_cast: false });
        m.insert("length", FunctionMapping { sql_name: "LENGTH", is_cast: false });

        // ===== CONVERSION FUNCTIONS =====
        m.insert("tostring", FunctionMapping { sql_name: "TEXT", is_cast: true });
        m.insert("tointeger", FunctionMapping { sql_name: "BIGINT", is_cast: true });
        m.insert("tofloat", FunctionMapping { sql_name: "DOUBLE PRECISION", is_cast: true });

        // ===== NUMERIC FUNCTIONS =====
        m.insert("abs", FunctionMapping { sql_name: "ABS", is_cast: false });
        m.insert("round", FunctionMapping { sql_name: "ROUND", is_cast: false });
        m.insert("ceil", FunctionMapping { sql_name: "CEIL", is_cast: false });
        m.insert("floor", FunctionMapping { sql_name: "FLOOR", is_cast: false });
        m.insert("sqrt", FunctionMapping { sql_name: "SQRT", is_cast: false });

        // ===== NULL HANDLING =====
        m.insert("coalesce", FunctionMapping { sql_name: "COALESCE", is_cast: false });

        m
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(
            get_function_mapping("toUpper").unwrap().render(&["x".to_string()]),
            "UPPER(x)"
        );
        assert_eq!(get_aggregate_mapping("COLLECT"), Some("ARRAY_AGG"));
        assert!(is_aggregate_function("Count"));
        assert!(!is_aggregate_function("toUpper"));
        assert!(get_function_mapping("shortestPath").is_none());
    }

    #[test]
    fn test_cast_functions() {
        let mapping = get_function_mapping("toInteger").unwrap();
        assert_eq!(mapping.render(&["a.age".to_string()]), "CAST(a.age AS BIGINT)");
    }
}
