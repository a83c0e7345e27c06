//! `__counter` and `__threadNum`

use crate::{arg, store};
use std::sync::atomic::{AtomicI64, Ordering};
use volley_core::expr::next_function_id;
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

/// `${__counter(TRUE|FALSE[, var])}`: per-thread counter when the first
/// argument is `TRUE`, one counter shared by every thread otherwise.
/// Both start at 1.
#[derive(Debug)]
pub struct Counter {
    args: Vec<CompoundVariable>,
    id: u64,
    global: AtomicI64,
}

impl Counter {
    pub const KEY: &'static str = "__counter";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Counter, per thread (TRUE) or global (FALSE)", |args| {
            Ok(Box::new(Counter {
                args,
                id: next_function_id(),
                global: AtomicI64::new(0),
            }))
        })
        .params(1, Some(2))
    }
}

impl Function for Counter {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let per_thread = arg(&self.args, 0, ctx).trim().eq_ignore_ascii_case("true");
        let value = if per_thread {
            let state = ctx.function_state(self.id);
            *state += 1;
            *state
        } else {
            self.global.fetch_add(1, Ordering::SeqCst) + 1
        };
        let value = value.to_string();
        store(&self.args, 1, &value, ctx);
        Ok(value)
    }
}

/// `${__threadNum}`: 1-based number of the calling thread in its group
#[derive(Debug)]
pub struct ThreadNum;

impl ThreadNum {
    pub const KEY: &'static str = "__threadNum";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Number of the current thread", |_| {
            Ok(Box::new(ThreadNum) as Box<dyn Function>)
        })
    }
}

impl Function for ThreadNum {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        Ok(ctx.thread_num().to_string())
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval;
    use std::sync::Arc;
    use volley_core::{ExpressionCompiler, ThreadContext, ThreadIdentity};

    #[test]
    fn test_per_thread_counter() {
        let compiler = ExpressionCompiler::new(Arc::new(crate::default_registry()));
        let counter = compiler.compile("${__counter(TRUE,c)}").unwrap();

        let mut first = ThreadContext::default();
        let mut second = ThreadContext::default();
        assert_eq!(counter.execute(&mut first), "1");
        assert_eq!(counter.execute(&mut first), "2");
        assert_eq!(counter.execute(&mut second), "1");
        assert_eq!(first.variables.get("c"), Some("2"));
    }

    #[test]
    fn test_global_counter() {
        let compiler = ExpressionCompiler::new(Arc::new(crate::default_registry()));
        let counter = compiler.compile("${__counter(FALSE)}").unwrap();

        let mut first = ThreadContext::default();
        let mut second = ThreadContext::default();
        assert_eq!(counter.execute(&mut first), "1");
        assert_eq!(counter.execute(&mut second), "2");
    }

    #[test]
    fn test_thread_num() {
        let mut ctx = ThreadContext::new(ThreadIdentity {
            thread_num: 3,
            thread_name: "users 1-3".into(),
            group_name: "users".into(),
        });
        assert_eq!(eval("t${__threadNum}", &mut ctx), "t3");
    }
}
