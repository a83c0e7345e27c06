//! Controller kinds and their property schemas

use std::fmt;
use std::str::FromStr;
use volley_core::{ElementSpec, PropertySpec};

/// The controller variants a tree node can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControllerKind {
    Generic,
    Loop,
    While,
    If,
    Random,
    Weighted,
    Transaction,
    Include,
    Interleave,
    Switch,
    OnceOnly,
    ForEach,
    Runtime,
}

pub const LOOPS: &str = "loops";
pub const CONTINUE_FOREVER: &str = "continue_forever";
pub const CONDITION: &str = "condition";
pub const USE_EXPRESSION: &str = "use_expression";
pub const EVALUATE_ALL: &str = "evaluate_all";
pub const GENERATE_PARENT_SAMPLE: &str = "generate_parent_sample";
pub const INCLUDE_TIMERS: &str = "include_timers";
pub const INCLUDE_PATH: &str = "include_path";
pub const SELECTION: &str = "selection";
pub const INPUT_PREFIX: &str = "input_prefix";
pub const OUTPUT_VAR: &str = "output_var";
pub const START_INDEX: &str = "start_index";
pub const END_INDEX: &str = "end_index";
pub const USE_SEPARATOR: &str = "use_separator";
pub const SECONDS: &str = "seconds";
pub const WEIGHTS: &str = "weights";
pub const SEED: &str = "seed";

/// Suffix of the variable holding a loop's 0-based iteration index
pub const INDEX_SUFFIX: &str = "__idx";

const GENERIC_SPEC: ElementSpec = ElementSpec {
    kind: "simple_controller",
    clonable: true,
    properties: &[],
};

const LOOP_SPEC: ElementSpec = ElementSpec {
    kind: "loop_controller",
    clonable: true,
    properties: &[
        PropertySpec::text(LOOPS, "1"),
        PropertySpec::bool(CONTINUE_FOREVER, true),
    ],
};

const WHILE_SPEC: ElementSpec = ElementSpec {
    kind: "while_controller",
    clonable: true,
    properties: &[PropertySpec::text(CONDITION, "")],
};

const IF_SPEC: ElementSpec = ElementSpec {
    kind: "if_controller",
    clonable: true,
    properties: &[
        PropertySpec::text(CONDITION, ""),
        PropertySpec::bool(USE_EXPRESSION, true),
        PropertySpec::bool(EVALUATE_ALL, false),
    ],
};

const RANDOM_SPEC: ElementSpec = ElementSpec {
    kind: "random_controller",
    clonable: true,
    properties: &[],
};

/// `weights` lists one weight per child in plan order; missing or
/// non-positive weights leave the child out. `seed` 0 draws from entropy.
const WEIGHTED_SPEC: ElementSpec = ElementSpec {
    kind: "weighted_controller",
    clonable: true,
    properties: &[PropertySpec::text(WEIGHTS, ""), PropertySpec::int(SEED, 0)],
};

const TRANSACTION_SPEC: ElementSpec = ElementSpec {
    kind: "transaction_controller",
    clonable: true,
    properties: &[
        PropertySpec::bool(GENERATE_PARENT_SAMPLE, false),
        PropertySpec::bool(INCLUDE_TIMERS, true),
    ],
};

const INCLUDE_SPEC: ElementSpec = ElementSpec {
    kind: "include_controller",
    clonable: true,
    properties: &[PropertySpec::text(INCLUDE_PATH, "")],
};

const INTERLEAVE_SPEC: ElementSpec = ElementSpec {
    kind: "interleave_controller",
    clonable: true,
    properties: &[],
};

const SWITCH_SPEC: ElementSpec = ElementSpec {
    kind: "switch_controller",
    clonable: true,
    properties: &[PropertySpec::text(SELECTION, "")],
};

const ONCE_ONLY_SPEC: ElementSpec = ElementSpec {
    kind: "once_only_controller",
    clonable: true,
    properties: &[],
};

const FOREACH_SPEC: ElementSpec = ElementSpec {
    kind: "foreach_controller",
    clonable: true,
    properties: &[
        PropertySpec::text(INPUT_PREFIX, ""),
        PropertySpec::text(OUTPUT_VAR, ""),
        PropertySpec::int(START_INDEX, 0),
        PropertySpec::int(END_INDEX, -1),
        PropertySpec::bool(USE_SEPARATOR, true),
    ],
};

const RUNTIME_SPEC: ElementSpec = ElementSpec {
    kind: "runtime_controller",
    clonable: true,
    properties: &[PropertySpec::text(SECONDS, "1")],
};

impl ControllerKind {
    pub const ALL: [ControllerKind; 13] = [
        ControllerKind::Generic,
        ControllerKind::Loop,
        ControllerKind::While,
        ControllerKind::If,
        ControllerKind::Random,
        ControllerKind::Weighted,
        ControllerKind::Transaction,
        ControllerKind::Include,
        ControllerKind::Interleave,
        ControllerKind::Switch,
        ControllerKind::OnceOnly,
        ControllerKind::ForEach,
        ControllerKind::Runtime,
    ];

    pub fn spec(&self) -> &'static ElementSpec {
        match self {
            ControllerKind::Generic => &GENERIC_SPEC,
            ControllerKind::Loop => &LOOP_SPEC,
            ControllerKind::While => &WHILE_SPEC,
            ControllerKind::If => &IF_SPEC,
            ControllerKind::Random => &RANDOM_SPEC,
            ControllerKind::Weighted => &WEIGHTED_SPEC,
            ControllerKind::Transaction => &TRANSACTION_SPEC,
            ControllerKind::Include => &INCLUDE_SPEC,
            ControllerKind::Interleave => &INTERLEAVE_SPEC,
            ControllerKind::Switch => &SWITCH_SPEC,
            ControllerKind::OnceOnly => &ONCE_ONLY_SPEC,
            ControllerKind::ForEach => &FOREACH_SPEC,
            ControllerKind::Runtime => &RUNTIME_SPEC,
        }
    }

    /// Plan-file type name
    pub fn as_str(&self) -> &'static str {
        self.spec().kind
    }

    /// Whether a pass can repeat without bound
    pub fn is_iterating(&self) -> bool {
        matches!(
            self,
            ControllerKind::Loop | ControllerKind::While | ControllerKind::ForEach
        )
    }
}

impl fmt::Display for ControllerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ControllerKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ControllerKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("Unknown controller kind: {s}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_names_round_trip() {
        for kind in ControllerKind::ALL {
            assert_eq!(kind.as_str().parse::<ControllerKind>(), Ok(kind));
        }
        assert!("nope".parse::<ControllerKind>().is_err());
    }

    #[test]
    fn test_specs_carry_defaults() {
        let el = ControllerKind::Loop.spec().instantiate("l");
        assert_eq!(el.property(LOOPS).map(|v| v.raw()), Some("1".to_string()));
        assert!(ControllerKind::Transaction.spec().property(INCLUDE_TIMERS).is_some());
        assert!(ControllerKind::Loop.is_iterating());
        assert!(!ControllerKind::If.is_iterating());
    }
}
