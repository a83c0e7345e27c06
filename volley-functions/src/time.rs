//! `__time`

use crate::{arg, store};
use chrono::format::{Item, StrftimeItems};
use chrono::Local;
use volley_core::{CompoundVariable, Function, FunctionDescriptor, FunctionError, ThreadContext};

/// Named shorthands accepted in place of a format string
fn alias(format: &str) -> &str {
    match format {
        "YMD" => "%Y%m%d",
        "HMS" => "%H%M%S",
        "YMDHMS" => "%Y%m%d-%H%M%S",
        other => other,
    }
}

/// `${__time([format[, var]])}`: current time.
///
/// A blank format gives epoch milliseconds and `/1000` epoch seconds; any
/// other value is a strftime pattern rendered in local time.
#[derive(Debug)]
pub struct Time {
    args: Vec<CompoundVariable>,
}

impl Time {
    pub const KEY: &'static str = "__time";

    pub fn descriptor() -> FunctionDescriptor {
        FunctionDescriptor::new(Self::KEY, "Current time in a chosen format", |args| {
            Ok(Box::new(Time { args }))
        })
        .params(0, Some(2))
    }
}

impl Function for Time {
    fn execute(&self, ctx: &mut ThreadContext) -> Result<String, FunctionError> {
        let format = arg(&self.args, 0, ctx);
        let now = Local::now();
        let value = match alias(format.trim()) {
            "" => now.timestamp_millis().to_string(),
            "/1000" => now.timestamp().to_string(),
            pattern => {
                let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
                if items.iter().any(|i| matches!(i, Item::Error)) {
                    return Err(FunctionError::failed(
                        Self::KEY,
                        format!("invalid time format '{pattern}'"),
                    ));
                }
                now.format_with_items(items.into_iter()).to_string()
            }
        };
        store(&self.args, 1, &value, ctx);
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use crate::test_support::eval;
    use volley_core::ThreadContext;

    #[test]
    fn test_epoch_forms() {
        let mut ctx = ThreadContext::default();
        let before = chrono::Utc::now().timestamp_millis();
        let millis: i64 = eval("${__time()}", &mut ctx).parse().unwrap();
        let after = chrono::Utc::now().timestamp_millis();
        assert!(before <= millis && millis <= after);

        let secs: i64 = eval("${__time(/1000,t)}", &mut ctx).parse().unwrap();
        assert!((secs - millis / 1000).abs() <= 1);
        assert_eq!(ctx.variables.get("t"), Some(secs.to_string().as_str()));
    }

    #[test]
    fn test_formats_and_aliases() {
        let mut ctx = ThreadContext::default();
        let ymd = eval("${__time(YMD)}", &mut ctx);
        assert_eq!(ymd.len(), 8);
        assert!(ymd.chars().all(|c| c.is_ascii_digit()));

        let stamp = eval("${__time(YMDHMS)}", &mut ctx);
        assert_eq!(stamp.len(), 15);
        assert_eq!(&stamp[8..9], "-");

        let year = eval("${__time(%Y)}", &mut ctx);
        assert_eq!(year, chrono::Local::now().format("%Y").to_string());
    }

    #[test]
    fn test_invalid_format_yields_empty() {
        let mut ctx = ThreadContext::default();
        assert_eq!(eval("${__time(x%)}", &mut ctx), "");
    }
}
