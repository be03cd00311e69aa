//! Property-based tests for the constraint algebra and the checker.
//!
//! Both scales must be total orders, and compiled evaluation must agree with
//! raw evaluation for every context.

use proptest::prelude::*;
use serde_json::Value;

use keri_governance::{
    evaluate_expression, operator_satisfies, strength_satisfies, Attributes, ConstraintChecker,
    ConstraintCompiler, ConstraintRule, EdgeContext, EdgeOperator, RuleEnforcement,
    StrengthLevel, compile_field_expression,
};

fn any_operator() -> impl Strategy<Value = EdgeOperator> {
    prop::sample::select(EdgeOperator::ALL.to_vec())
}

fn any_strength() -> impl Strategy<Value = StrengthLevel> {
    prop::sample::select(StrengthLevel::ALL.to_vec())
}

// =============================================================================
// Operator Scale
// =============================================================================

proptest! {
    /// Every operator satisfies itself.
    #[test]
    fn prop_operator_reflexive(op in any_operator()) {
        prop_assert!(operator_satisfies(op, op));
    }

    /// a ⊒ b and b ⊒ c imply a ⊒ c.
    #[test]
    fn prop_operator_transitive(a in any_operator(), b in any_operator(), c in any_operator()) {
        if operator_satisfies(a, b) && operator_satisfies(b, c) {
            prop_assert!(operator_satisfies(a, c));
        }
    }

    /// Mutual satisfaction only between equal operators.
    #[test]
    fn prop_operator_antisymmetric(a in any_operator(), b in any_operator()) {
        if operator_satisfies(a, b) && operator_satisfies(b, a) {
            prop_assert_eq!(a, b);
        }
    }

    /// Any two operators are comparable.
    #[test]
    fn prop_operator_total(a in any_operator(), b in any_operator()) {
        prop_assert!(operator_satisfies(a, b) || operator_satisfies(b, a));
    }

    /// I2I satisfies everything; ANY is satisfied by everything.
    #[test]
    fn prop_operator_bounds(op in any_operator()) {
        prop_assert!(operator_satisfies(EdgeOperator::I2i, op));
        prop_assert!(operator_satisfies(op, EdgeOperator::Any));
    }

    /// Satisfaction agrees with `Ord`.
    #[test]
    fn prop_operator_matches_ord(a in any_operator(), b in any_operator()) {
        prop_assert_eq!(operator_satisfies(a, b), a >= b);
    }
}

// =============================================================================
// Strength Scale
// =============================================================================

proptest! {
    /// Every level satisfies itself.
    #[test]
    fn prop_strength_reflexive(level in any_strength()) {
        prop_assert!(strength_satisfies(level, level));
    }

    /// a ⊒ b and b ⊒ c imply a ⊒ c.
    #[test]
    fn prop_strength_transitive(a in any_strength(), b in any_strength(), c in any_strength()) {
        if strength_satisfies(a, b) && strength_satisfies(b, c) {
            prop_assert!(strength_satisfies(a, c));
        }
    }

    /// Mutual satisfaction only between equal levels.
    #[test]
    fn prop_strength_antisymmetric(a in any_strength(), b in any_strength()) {
        if strength_satisfies(a, b) && strength_satisfies(b, a) {
            prop_assert_eq!(a, b);
        }
    }

    /// TEL_ANCHORED satisfies everything; ANY is satisfied by everything.
    #[test]
    fn prop_strength_bounds(level in any_strength()) {
        prop_assert!(strength_satisfies(StrengthLevel::TelAnchored, level));
        prop_assert!(strength_satisfies(level, StrengthLevel::Any));
    }

    /// Codes parse back to the same level.
    #[test]
    fn prop_strength_code_parses(level in any_strength()) {
        prop_assert_eq!(level.code().parse::<StrengthLevel>().ok(), Some(level));
    }
}

// =============================================================================
// Compiled vs Raw Evaluation
// =============================================================================

fn attribute_value() -> impl Strategy<Value = Option<Value>> {
    prop_oneof![
        Just(None),
        prop::sample::select(vec!["US", "FR", "", "us"]).prop_map(|s| Some(Value::from(s))),
        (-5i64..5).prop_map(|n| Some(Value::from(n))),
        any::<bool>().prop_map(|b| Some(Value::from(b))),
        Just(Some(Value::from("2025-01-01"))),
    ]
}

fn attributes() -> impl Strategy<Value = Attributes> {
    (attribute_value(), attribute_value(), attribute_value()).prop_map(|(a, b, c)| {
        let mut attrs = Attributes::new();
        for (key, value) in [("jurisdiction", a), ("level", b), ("flag", c)] {
            if let Some(value) = value {
                attrs.insert(key, value);
            }
        }
        attrs
    })
}

fn context() -> impl Strategy<Value = EdgeContext> {
    (
        prop::sample::select(vec!["iss", "delegate", "other"]),
        any_operator(),
        attributes(),
        attributes(),
        prop::option::of(0u32..6),
    )
        .prop_map(|(edge_type, op, issuer, subject, depth)| {
            let ctx = EdgeContext::new(edge_type, op)
                .with_issuer(issuer)
                .with_subject(subject);
            match depth {
                Some(depth) => ctx.with_delegation_depth(depth),
                None => ctx,
            }
        })
}

fn mixed_rules() -> Vec<ConstraintRule> {
    vec![
        ConstraintRule::new("match", "iss", EdgeOperator::Di2i)
            .with_field_constraint("jurisdiction", "$issuer.jurisdiction == $subject.jurisdiction")
            .with_field_constraint("level", "$subject.level >= 1"),
        ConstraintRule::new("ordering", "iss", EdgeOperator::Any)
            .with_field_constraint("lt", "$issuer.level < $subject.level")
            .with_field_constraint("flag", "$subject.flag == true")
            .with_enforcement(RuleEnforcement::Advisory),
        ConstraintRule::new("depth", "delegate", EdgeOperator::Ni2i).with_max_delegation_depth(3),
        ConstraintRule::new("broken", "delegate", EdgeOperator::Any)
            .with_field_constraint("bad", "$holder.level == 1")
            .with_enforcement(RuleEnforcement::Advisory),
    ]
}

proptest! {
    /// The checker's verdict and violations do not depend on precompilation.
    #[test]
    fn prop_compiled_matches_raw(ctx in context()) {
        let rules = mixed_rules();
        let compiled = ConstraintCompiler::compile_rules("Eprop", &rules);
        let checker = ConstraintChecker::new();
        prop_assert_eq!(checker.check(&ctx, &compiled), checker.check(&ctx, &rules));
    }

    /// Allowed exactly when no strict violation was recorded.
    #[test]
    fn prop_allowed_iff_no_strict(ctx in context()) {
        let rules = mixed_rules();
        let result = ConstraintChecker::new().check(&ctx, &rules);
        prop_assert_eq!(result.allowed, result.strict_violations().count() == 0);
    }

    /// One-shot evaluation equals evaluation of the compiled form.
    #[test]
    fn prop_expression_compile_once(ctx in context()) {
        for expression in [
            "$issuer.jurisdiction == $subject.jurisdiction",
            "$issuer.jurisdiction != $subject.jurisdiction",
            "$subject.level > $issuer.level",
            "$subject.level <= 0",
            "$subject.flag == false",
        ] {
            let compiled = compile_field_expression("p", expression).unwrap();
            let once = evaluate_expression(expression, &ctx).unwrap();
            prop_assert_eq!(compiled.evaluate(&ctx), once);
        }
    }
}
