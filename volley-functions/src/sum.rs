//! `__intSum`

use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

/// `${__intSum(a, b, ...[, var])}`: sum of two or more integers.
///
/// When the last argument is not an integer it names the variable the sum is
/// stored in.
#[derive(Debug)]
pub struct IntSum {
    args: Vec<CompoundVariable>,
}

impl IntSum {
    pub const KEY: &'static str = "__intSum";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Sum of integers", |args| Ok(Box::new(IntSum { args })))
            .params(2, None)
    }
}

impl Function for IntSum {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let values: Vec<String> = self.args.iter().map(|a| a.execute(ctx)).collect();
        let (operands, var) = match values.split_last() {
            Some((last, rest)) if last.trim().parse::<i64>().is_err() && rest.len() >= 2 => {
                (rest, Some(last.trim()))
            }
            _ => (values.as_slice(), None),
        };

        let mut sum: i64 = 0;
        for raw in operands {
            let value: i64 = raw.trim().parse().map_err(|_| {
                FunctionError::failed(Self::KEY, format!("'{raw}' is not an integer"))
            })?;
            sum = sum
                .checked_add(value)
                .ok_or_else(|| FunctionError::failed(Self::KEY, "integer overflow"))?;
        }

        let sum = sum.to_string();
        if let Some(var) = var.filter(|v| !v.is_empty()) {
            ctx.variables.put(var, sum.as_str());
        }
        Ok(sum)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval;
    use volley_core::ThreadContext;

    #[test]
    fn test_sums() {
        let mut ctx = ThreadContext::default();
        assert_eq!(eval("${__intSum(1,2)}", &mut ctx), "3");
        assert_eq!(eval("${__intSum(1,2,-5, 10)}", &mut ctx), "8");
    }

    #[test]
    fn test_trailing_name_stores_result() {
        let mut ctx = ThreadContext::default();
        ctx.variables.put("a", "40");
        assert_eq!(eval("${__intSum(${a},2,total)}", &mut ctx), "42");
        assert_eq!(ctx.variables.get("total"), Some("42"));
    }

    #[test]
    fn test_bad_operand_yields_empty() {
        let mut ctx = ThreadContext::default();
        // Two operands are required before a variable name
        assert_eq!(eval("${__intSum(1,x)}", &mut ctx), "");
        assert_eq!(eval("${__intSum(1,x,2)}", &mut ctx), "");
    }

    #[test]
    fn test_wrong_arity_is_compile_error() {
        let compiler =
            volley_core::ExpressionCompiler::new(std::sync::Arc::new(crate::default_registry()));
        assert!(compiler.compile("${__intSum(1)}").is_err());
    }
}
